// src/session_key.rs
//! Session keys — owned, move-only, zeroed on drop
//!
//! A [`SessionKey`] is consumed by exactly one encrypt-or-decrypt operation.
//! [`SessionKey::clear`] zeroes the buffer early and invalidates the key;
//! every later use fails with [`CoreError::SessionKeyCleared`].

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sequoia_openpgp as openpgp;

use openpgp::types::SymmetricAlgorithm;

use crate::aliases::{Passphrase, SecureConversionsExt, SessionKeyBytes, Zeroize};
use crate::clock::Clock;
use crate::decryption::{self, ExplicitVerifyMessage, KeySources, Verification};
use crate::error::{CoreError, Result};
use crate::keyring::KeyRing;
use crate::packets;
use crate::profile::Profile;

pub struct SessionKey {
    key: Option<SessionKeyBytes>,
    /// `None` only for v6 keys recovered from key packets; the data
    /// packet names the cipher in that case.
    algo: Option<SymmetricAlgorithm>,
    v6: bool,
}

impl SessionKey {
    /// Random key sized for the profile's message cipher. The key is v6
    /// (SEIPDv2) when the profile encrypts with AEAD.
    pub fn generate(profile: &Profile) -> Result<Self> {
        let config = profile.encryption_config();
        Self::generate_for(config.cipher, config.aead.is_some())
    }

    pub(crate) fn generate_for(algo: SymmetricAlgorithm, v6: bool) -> Result<Self> {
        let size = key_size(algo)?;
        let mut bytes = vec![0u8; size];
        rand::rng().fill_bytes(&mut bytes);
        Ok(Self {
            key: Some(SessionKeyBytes::new(bytes)),
            algo: Some(algo),
            v6,
        })
    }

    /// Legacy (SEIPDv1) key for `algo`.
    pub fn from_bytes(bytes: Vec<u8>, algo: SymmetricAlgorithm) -> Result<Self> {
        Self::checked(bytes, Some(algo), false)
    }

    /// v6 (SEIPDv2) key. The cipher is inferred from the key length when
    /// `algo` is not given.
    pub fn from_bytes_v6(bytes: Vec<u8>, algo: Option<SymmetricAlgorithm>) -> Result<Self> {
        Self::checked(bytes, algo, true)
    }

    pub fn from_base64(encoded: &str, algo: SymmetricAlgorithm) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CoreError::Configuration(format!("invalid base64 session key: {e}")))?;
        Self::from_bytes(bytes, algo)
    }

    fn checked(bytes: Vec<u8>, algo: Option<SymmetricAlgorithm>, v6: bool) -> Result<Self> {
        let key = Self {
            key: Some(SessionKeyBytes::new(bytes)),
            algo,
            v6,
        };
        let expected = key_size(key.cipher()?)?;
        let actual = key.bytes()?.len();
        if expected != actual {
            return Err(CoreError::Configuration(format!(
                "session key has {actual} bytes, cipher needs {expected}"
            )));
        }
        Ok(key)
    }

    pub(crate) fn from_engine(
        key: openpgp::crypto::SessionKey,
        algo: Option<SymmetricAlgorithm>,
        v6: bool,
    ) -> Self {
        Self {
            key: Some(SessionKeyBytes::new(key.to_vec())),
            algo,
            v6,
        }
    }

    /// Raw key material; fails once the key has been cleared.
    pub fn bytes(&self) -> Result<&[u8]> {
        self.key
            .as_ref()
            .map(|k| k.expose_secret().as_slice())
            .ok_or(CoreError::SessionKeyCleared)
    }

    pub fn algorithm(&self) -> Option<SymmetricAlgorithm> {
        self.algo
    }

    pub fn is_v6(&self) -> bool {
        self.v6
    }

    pub fn is_cleared(&self) -> bool {
        self.key.is_none()
    }

    /// Cipher this key is used with: its own tag, or for untagged v6 keys
    /// the AES variant matching the key length.
    pub fn cipher(&self) -> Result<SymmetricAlgorithm> {
        if let Some(algo) = self.algo {
            return Ok(algo);
        }
        match self.bytes()?.len() {
            16 => Ok(SymmetricAlgorithm::AES128),
            24 => Ok(SymmetricAlgorithm::AES192),
            32 => Ok(SymmetricAlgorithm::AES256),
            n => Err(CoreError::UnsupportedAlgorithm(format!(
                "no cipher for a {n}-byte session key"
            ))),
        }
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.bytes()?))
    }

    /// Zeroes the key material and invalidates the key. Idempotent.
    pub fn clear(&mut self) {
        if let Some(mut key) = self.key.take() {
            key.expose_secret_mut().zeroize();
        }
    }

    pub(crate) fn engine_key(&self) -> Result<openpgp::crypto::SessionKey> {
        Ok(self.bytes()?.into())
    }

    /// PKESK packets carrying this key to every certificate of `recipients`.
    /// Recipient keys are selected at the wall clock; see
    /// [`encrypt_to_at`](Self::encrypt_to_at) for a pinned time.
    pub fn encrypt_to(&self, recipients: &KeyRing) -> Result<Vec<u8>> {
        self.encrypt_to_at(recipients, Clock::System)
    }

    /// Like [`encrypt_to`](Self::encrypt_to) with wildcard recipient ids.
    pub fn encrypt_to_hidden(&self, recipients: &KeyRing) -> Result<Vec<u8>> {
        self.pkesks(recipients, Clock::System, true)
    }

    /// PKESK packets with recipient keys selected at `clock`.
    pub fn encrypt_to_at(&self, recipients: &KeyRing, clock: Clock) -> Result<Vec<u8>> {
        self.pkesks(recipients, clock, false)
    }

    pub fn encrypt_to_hidden_at(&self, recipients: &KeyRing, clock: Clock) -> Result<Vec<u8>> {
        self.pkesks(recipients, clock, true)
    }

    fn pkesks(&self, recipients: &KeyRing, clock: Clock, hidden: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let keys = recipients.encryption_keys(clock.now())?;
        packets::write_pkesks(&mut out, self, &keys, hidden)?;
        Ok(out)
    }

    /// SKESK packet protecting this key with `password`.
    pub fn encrypt_with_password(&self, password: &Passphrase, profile: &Profile) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        packets::write_skesk(&mut out, self, password, &profile.encryption_config())?;
        Ok(out)
    }

    /// Recovers a session key from SKESK packets.
    pub fn decrypt_with_password(key_packets: &[u8], password: &Passphrase) -> Result<Self> {
        packets::read_session_key(key_packets, None, std::slice::from_ref(password))
    }

    /// Decrypts a bare data packet with this key and verifies an embedded
    /// signature against `verify_keys` at `verify_time` (0 disables expiry).
    pub fn decrypt_and_verify(
        &self,
        data_packet: &[u8],
        verify_keys: Option<&KeyRing>,
        verify_time: i64,
    ) -> Result<ExplicitVerifyMessage> {
        let sources = KeySources {
            session_keys: vec![self],
            ..Default::default()
        };
        let verification = verify_keys.map(|keys| Verification {
            keys,
            time: verify_time,
            context: None,
        });
        decryption::decrypt_message(data_packet, &sources, verification)
    }

    /// Decrypts a bare data packet without verification.
    pub fn decrypt(&self, data_packet: &[u8]) -> Result<Vec<u8>> {
        let sources = KeySources {
            session_keys: vec![self],
            ..Default::default()
        };
        let message = decryption::decrypt_message(data_packet, &sources, None)?;
        Ok(message.into_plaintext())
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.clear();
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.bytes(), other.bytes()) {
            (Ok(a), Ok(b)) => a.ct_eq(b) && self.algo == other.algo && self.v6 == other.v6,
            _ => false,
        }
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("algo", &self.algo)
            .field("v6", &self.v6)
            .finish()
    }
}

fn key_size(algo: SymmetricAlgorithm) -> Result<usize> {
    if !algo.is_supported() {
        return Err(CoreError::UnsupportedAlgorithm(algo.to_string()));
    }
    algo.key_size()
        .map_err(|_| CoreError::UnsupportedAlgorithm(algo.to_string()))
}
