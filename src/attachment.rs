// src/attachment.rs
//! Attachment helpers — one-call split encryption for files
//!
//! Attachments travel as a [`SplitMessage`]: the key packets are stored
//! next to the message, the data packet with the file body.

use tracing::info;

use crate::aliases::Passphrase;
use crate::armor::armor;
use crate::decryption::ExplicitVerifyMessage;
use crate::encryption::LiteralMetadata;
use crate::enums::ArmorKind;
use crate::error::{CoreError, Result};
use crate::handle::PgpHandle;
use crate::keyring::KeyRing;
use crate::split::SplitMessage;

/// Armored ciphertext plus its armored, encrypted detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmoredDetached {
    pub ciphertext: String,
    pub encrypted_signature: String,
}

/// Binary ciphertext plus its armored, encrypted detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryDetached {
    pub ciphertext: Vec<u8>,
    pub encrypted_signature: String,
}

impl PgpHandle {
    /// Encrypts `plain` for `recipients`, recording `filename` and the
    /// current time in the literal packet.
    pub fn encrypt_attachment(
        &self,
        plain: &[u8],
        filename: &str,
        recipients: &KeyRing,
    ) -> Result<SplitMessage> {
        let meta = LiteralMetadata::new(filename, false, self.clock().unix());
        let split = self
            .encryption()
            .recipients(recipients)
            .build()?
            .encrypt_split(plain, &meta)?;
        info!(
            key_packets = split.key_packets.len(),
            data_packet = split.data_packet.len(),
            "encrypted attachment"
        );
        Ok(split)
    }

    pub fn decrypt_attachment(
        &self,
        key_packets: &[u8],
        data_packet: &[u8],
        keys: &KeyRing,
    ) -> Result<ExplicitVerifyMessage> {
        let split = SplitMessage::new(key_packets.to_vec(), data_packet.to_vec());
        self.decryption()
            .decryption_keys(keys)
            .build()?
            .decrypt_split(&split)
    }

    /// Encrypts to `recipients` and signs with `signer` (unlocked with
    /// `passphrase` if needed), both outputs armored.
    pub fn encrypt_sign_armored_detached(
        &self,
        recipients: &KeyRing,
        signer: &KeyRing,
        passphrase: &Passphrase,
        plain: &[u8],
    ) -> Result<ArmoredDetached> {
        let (split, signature) = self.encrypt_sign_detached(recipients, signer, passphrase, plain)?;
        Ok(ArmoredDetached {
            ciphertext: armor(&split.to_message(), ArmorKind::Message)?,
            encrypted_signature: armor(&signature, ArmorKind::Message)?,
        })
    }

    /// As [`Self::encrypt_sign_armored_detached`] with a binary ciphertext.
    pub fn encrypt_sign_binary_detached(
        &self,
        recipients: &KeyRing,
        signer: &KeyRing,
        passphrase: &Passphrase,
        plain: &[u8],
    ) -> Result<BinaryDetached> {
        let (split, signature) = self.encrypt_sign_detached(recipients, signer, passphrase, plain)?;
        Ok(BinaryDetached {
            ciphertext: split.to_message(),
            encrypted_signature: armor(&signature, ArmorKind::Message)?,
        })
    }

    fn encrypt_sign_detached(
        &self,
        recipients: &KeyRing,
        signer: &KeyRing,
        passphrase: &Passphrase,
        plain: &[u8],
    ) -> Result<(SplitMessage, Vec<u8>)> {
        let unlocked;
        let signer = if signer.is_unlocked() {
            signer
        } else {
            unlocked = signer.unlock(passphrase)?;
            &unlocked
        };
        let split = self
            .encryption()
            .recipients(recipients)
            .signing_keys(signer)
            .detached_signature(true)
            .build()?
            .encrypt_split(plain, &LiteralMetadata::default())?;
        let signature = split.signature_message().ok_or_else(|| {
            CoreError::Configuration("detached signing produced no signature".into())
        })?;
        Ok((split, signature))
    }
}
