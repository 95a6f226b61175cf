// src/encryption/mod.rs
//! Encryption handle — builder-configured, streaming encrypt (+ sign)
//!
//! [`EncryptionHandleBuilder::build`] resolves everything that can fail
//! before a stream exists: recipient keys, the signing key (which must be
//! unlocked) and the [`PipelineKind`]. The handle is immutable afterwards;
//! each call derives what it needs without touching it.

mod pipeline;

pub use pipeline::{PipelineKind, PlaintextWriter};

use std::io::Write;

use sequoia_openpgp::crypto::KeyPair;
use tracing::{debug, info};

use crate::aliases::Passphrase;
use crate::clock::Clock;
use crate::context::SigningContext;
use crate::error::{CoreError, Result};
use crate::keyring::{KeyRing, PublicKey};
use crate::packets;
use crate::profile::Profile;
use crate::session_key::SessionKey;
use crate::split::{SplitMessage, SplitWriter};

use pipeline::{SignerParams, StackParams};

/// Literal data packet hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteralMetadata {
    pub filename: String,
    pub utf8: bool,
    /// Unix seconds; 0 leaves the date unset.
    pub mod_time: i64,
}

impl LiteralMetadata {
    pub fn new(filename: impl Into<String>, utf8: bool, mod_time: i64) -> Self {
        Self {
            filename: filename.into(),
            utf8,
            mod_time,
        }
    }
}

#[derive(Debug, Default)]
pub struct EncryptionHandleBuilder<'k> {
    profile: Profile,
    recipients: Option<&'k KeyRing>,
    hidden_recipients: Option<&'k KeyRing>,
    signing_keys: Option<&'k KeyRing>,
    password: Option<Passphrase>,
    session_key: Option<&'k SessionKey>,
    compress: bool,
    utf8: bool,
    signing_context: Option<SigningContext>,
    detached_signature: bool,
    clock: Clock,
}

impl<'k> EncryptionHandleBuilder<'k> {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn recipients(mut self, keys: &'k KeyRing) -> Self {
        self.recipients = Some(keys);
        self
    }

    /// Recipients whose key ids are replaced by wildcards.
    pub fn hidden_recipients(mut self, keys: &'k KeyRing) -> Self {
        self.hidden_recipients = Some(keys);
        self
    }

    pub fn signing_keys(mut self, keys: &'k KeyRing) -> Self {
        self.signing_keys = Some(keys);
        self
    }

    pub fn password(mut self, password: Passphrase) -> Self {
        self.password = Some(password);
        self
    }

    /// Encrypt with this key instead of a fresh one.
    pub fn session_key(mut self, key: &'k SessionKey) -> Self {
        self.session_key = Some(key);
        self
    }

    pub fn compress(mut self, on: bool) -> Self {
        self.compress = on;
        self
    }

    /// Text signatures and UTF-8 literal data by default.
    pub fn utf8(mut self, on: bool) -> Self {
        self.utf8 = on;
        self
    }

    pub fn signing_context(mut self, value: impl Into<String>, critical: bool) -> Self {
        self.signing_context = Some(SigningContext::new(value, critical));
        self
    }

    /// Produce an encrypted detached signature in [`EncryptionHandle::encrypt_split`].
    pub fn detached_signature(mut self, on: bool) -> Self {
        self.detached_signature = on;
        self
    }

    /// Fixes signature and key-selection time to a Unix timestamp.
    pub fn utc_time(mut self, unix: i64) -> Self {
        self.clock = Clock::at_unix(unix);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<EncryptionHandle<'k>> {
        let now = self.clock.now();

        let mut recipient_keys = Vec::new();
        if let Some(ring) = self.recipients {
            recipient_keys.extend(ring.encryption_keys(now)?.into_iter().map(|k| (k, false)));
        }
        if let Some(ring) = self.hidden_recipients {
            recipient_keys.extend(ring.encryption_keys(now)?.into_iter().map(|k| (k, true)));
        }

        let signer = match self.signing_keys {
            Some(ring) => Some(ring.signing_keypair(now)?),
            None => None,
        };

        if self.detached_signature && signer.is_none() {
            return Err(CoreError::Configuration(
                "detached signature requested without signing keys".into(),
            ));
        }

        if recipient_keys.is_empty() && self.password.is_none() && self.session_key.is_none() {
            return Err(no_key_material());
        }
        let kind = match (&signer, self.detached_signature) {
            (Some(_), true) => PipelineKind::EncryptAndSignDetached,
            (Some(_), false) => PipelineKind::EncryptAndSignInline,
            (None, _) if !recipient_keys.is_empty() => PipelineKind::PlainEncrypt,
            (None, _) if self.password.is_some() => PipelineKind::PasswordEncrypt,
            (None, _) => PipelineKind::SessionKeyEncrypt,
        };

        debug!(
            ?kind,
            recipients = recipient_keys.len(),
            password = self.password.is_some(),
            preset_session_key = self.session_key.is_some(),
            "built encryption handle"
        );

        Ok(EncryptionHandle {
            profile: self.profile,
            recipient_keys,
            signer,
            password: self.password,
            session_key: self.session_key,
            compress: self.compress,
            utf8: self.utf8,
            signing_context: self.signing_context,
            detached_signature: self.detached_signature,
            clock: self.clock,
            kind,
        })
    }
}

fn no_key_material() -> CoreError {
    CoreError::Configuration("no key material to encrypt".into())
}

/// Borrowed or freshly generated session key for one call. A generated key
/// is dropped, and thereby zeroed, when the call returns.
enum CallKey<'s> {
    Preset(&'s SessionKey),
    Ephemeral(SessionKey),
}

impl CallKey<'_> {
    fn get(&self) -> &SessionKey {
        match self {
            CallKey::Preset(sk) => sk,
            CallKey::Ephemeral(sk) => sk,
        }
    }
}

pub struct EncryptionHandle<'k> {
    profile: Profile,
    recipient_keys: Vec<(PublicKey, bool)>,
    signer: Option<KeyPair>,
    password: Option<Passphrase>,
    session_key: Option<&'k SessionKey>,
    compress: bool,
    utf8: bool,
    signing_context: Option<SigningContext>,
    detached_signature: bool,
    clock: Clock,
    kind: PipelineKind,
}

impl<'k> EncryptionHandle<'k> {
    pub fn builder() -> EncryptionHandleBuilder<'k> {
        EncryptionHandleBuilder::default()
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Opens a streaming pipeline into `out`.
    ///
    /// A signature goes to the signature sink when `out` has one and is
    /// embedded inline otherwise. Key packets go to the key sink when
    /// `out` has one; otherwise they prefix the ciphertext and the
    /// encrypted signature.
    pub fn encrypt_stream<'a>(
        &'a self,
        out: SplitWriter<'a>,
        meta: &LiteralMetadata,
    ) -> Result<PlaintextWriter<'a>> {
        let SplitWriter {
            keys,
            mut data,
            signature,
        } = out;

        let signature = match (self.signer.is_some(), signature) {
            (true, sig) => sig,
            (false, Some(_)) => {
                return Err(CoreError::Configuration(
                    "signature sink given without signing keys".into(),
                ))
            }
            (false, None) => None,
        };
        let kind = match (self.kind, signature.is_some()) {
            (PipelineKind::EncryptAndSignDetached, false) => PipelineKind::EncryptAndSignInline,
            (PipelineKind::EncryptAndSignInline, true) => PipelineKind::EncryptAndSignDetached,
            (kind, _) => kind,
        };

        let key = self.call_key()?;
        let mut signature = signature;
        if self.has_key_material() {
            match keys {
                Some(mut sink) => {
                    self.write_key_packets(&mut sink, key.get())?;
                    sink.flush()?;
                }
                None => {
                    self.write_key_packets(&mut data, key.get())?;
                    if let Some(sig) = signature.as_mut() {
                        self.write_key_packets(sig, key.get())?;
                    }
                }
            }
        }

        let params = self.stack_params(key.get())?;
        PlaintextWriter::open(kind, params, data, signature, meta)
    }

    /// Whole-message convenience: key packets, data and any inline
    /// signature in one buffer.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let meta = self.default_metadata();
        let mut writer = self.encrypt_stream(SplitWriter::from_writer(&mut out), &meta)?;
        writer.write_all(plaintext)?;
        writer.close()?;
        Ok(out)
    }

    /// Encrypts into separate key packets, data packet and, when the
    /// handle was built for it, an encrypted detached signature.
    pub fn encrypt_split(&self, plaintext: &[u8], meta: &LiteralMetadata) -> Result<SplitMessage> {
        let mut keys = Vec::new();
        let mut data = Vec::new();
        let mut signature = Vec::new();
        let detached = self.detached_signature && self.signer.is_some();
        {
            let out = if detached {
                SplitWriter::new(&mut keys, &mut data, &mut signature)
            } else {
                SplitWriter::key_and_data(&mut keys, &mut data)
            };
            let mut writer = self.encrypt_stream(out, meta)?;
            writer.write_all(plaintext)?;
            writer.close()?;
        }
        Ok(SplitMessage {
            key_packets: keys,
            data_packet: data,
            encrypted_signature: detached.then_some(signature),
        })
    }

    /// Key packets protecting `sk` for the handle's recipients or password.
    pub fn encrypt_session_key(&self, sk: &SessionKey) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_key_packets(&mut out, sk)?;
        Ok(out)
    }

    fn has_key_material(&self) -> bool {
        !self.recipient_keys.is_empty() || self.password.is_some()
    }

    fn write_key_packets(&self, out: &mut dyn Write, sk: &SessionKey) -> Result<()> {
        if !self.recipient_keys.is_empty() {
            let (shown, hidden): (Vec<_>, Vec<_>) =
                self.recipient_keys.iter().partition(|(_, hidden)| !hidden);
            let shown: Vec<PublicKey> = shown.into_iter().map(|(k, _)| k.clone()).collect();
            let hidden: Vec<PublicKey> = hidden.into_iter().map(|(k, _)| k.clone()).collect();
            if !shown.is_empty() {
                packets::write_pkesks(out, sk, &shown, false)?;
            }
            if !hidden.is_empty() {
                packets::write_pkesks(out, sk, &hidden, true)?;
            }
            info!(count = self.recipient_keys.len(), "wrote public-key key packets");
            Ok(())
        } else if let Some(password) = &self.password {
            packets::write_skesk(out, sk, password, &self.profile.encryption_config())?;
            info!("wrote password key packet");
            Ok(())
        } else {
            Err(no_key_material())
        }
    }

    fn call_key(&self) -> Result<CallKey<'k>> {
        match self.session_key {
            Some(sk) => Ok(CallKey::Preset(sk)),
            None => {
                let config = self.profile.encryption_config();
                SessionKey::generate_for(config.cipher, config.aead.is_some())
                    .map(CallKey::Ephemeral)
            }
        }
    }

    fn stack_params(&self, sk: &SessionKey) -> Result<StackParams<'_>> {
        let cipher = sk.cipher()?;
        let aead = sk.is_v6().then(|| {
            self.profile
                .encryption_config()
                .aead
                .map(|a| a.algorithm)
                .unwrap_or_default()
        });
        let compression = self.compress.then(|| self.profile.compression_config());
        let signer = self.signer.as_ref().map(|keypair| SignerParams {
            keypair: keypair.clone(),
            hash: self.profile.sign_config().hash,
            text: self.utf8,
            context: self.signing_context.as_ref(),
            time: self.clock.now(),
        });
        Ok(StackParams {
            cipher,
            aead,
            session_key: sk.engine_key()?,
            compression,
            signer,
        })
    }

    fn default_metadata(&self) -> LiteralMetadata {
        LiteralMetadata {
            utf8: self.utf8,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for EncryptionHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionHandle")
            .field("kind", &self.kind)
            .field("profile", &self.profile.name)
            .field("recipients", &self.recipient_keys.len())
            .field("compress", &self.compress)
            .field("utf8", &self.utf8)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_key_material_is_configuration_error() {
        let err = EncryptionHandle::builder().build().unwrap_err();
        assert!(matches!(err, CoreError::Configuration(ref m) if m.contains("no key material")));
    }

    #[test]
    fn test_password_only_selects_password_pipeline() {
        let handle = EncryptionHandle::builder()
            .password(Passphrase::new(b"pw".to_vec()))
            .build()
            .unwrap();
        assert_eq!(handle.kind(), PipelineKind::PasswordEncrypt);
    }

    #[test]
    fn test_preset_session_key_without_recipients_writes_no_key_packets() {
        let sk = SessionKey::generate(&Profile::default()).unwrap();
        let handle = EncryptionHandle::builder().session_key(&sk).build().unwrap();
        assert_eq!(handle.kind(), PipelineKind::SessionKeyEncrypt);
        let split = handle
            .encrypt_split(b"payload", &LiteralMetadata::default())
            .unwrap();
        assert!(split.key_packets.is_empty());
        assert_eq!(sk.decrypt(&split.data_packet).unwrap(), b"payload");
    }

    #[test]
    fn test_detached_without_signer_is_rejected() {
        let err = EncryptionHandle::builder()
            .password(Passphrase::new(b"pw".to_vec()))
            .detached_signature(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }
}
