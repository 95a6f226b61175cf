// src/handle.rs
//! Entry point — a profile plus the handle factories built from it
//!
//! ```no_run
//! use pgp_compose::{PgpHandle, SecurityLevel};
//!
//! let pgp = PgpHandle::new();
//! let alice = pgp.generate_key("Alice", "alice@example.org", SecurityLevel::Standard)?;
//! let ciphertext = pgp.encryption().recipients(&alice).build()?.encrypt(b"hi")?;
//! let message = pgp.decryption().decryption_keys(&alice).build()?.decrypt(&ciphertext)?;
//! assert_eq!(message.plaintext(), b"hi");
//! # Ok::<(), pgp_compose::CoreError>(())
//! ```

use tracing::debug;

use crate::aliases::Passphrase;
use crate::clock::Clock;
use crate::config::Config;
use crate::consts::{CREATION_TIME_OFFSET_SECS, CRYPTO_REFRESH_PROFILE_NAME};
use crate::decryption::DecryptionHandleBuilder;
use crate::encryption::EncryptionHandleBuilder;
use crate::enums::SecurityLevel;
use crate::error::Result;
use crate::keyring::KeyRing;
use crate::profile::{Profile, ProfileRegistry};
use crate::session_key::SessionKey;
use crate::sign::SignHandleBuilder;
use crate::verify::VerifyHandleBuilder;

#[derive(Debug, Clone)]
pub struct PgpHandle {
    profile: Profile,
    compress: bool,
    utf8: bool,
    creation_time_offset: i64,
    clock: Clock,
}

impl PgpHandle {
    /// Handle on the `default` profile.
    pub fn new() -> Self {
        Self::with_profile(Profile::default())
    }

    /// Handle on the RFC 9580 profile: v6 keys, AEAD data packets.
    pub fn crypto_refresh() -> Result<Self> {
        ProfileRegistry::builtin()
            .get(CRYPTO_REFRESH_PROFILE_NAME)
            .map(Self::with_profile)
    }

    pub fn with_profile(profile: Profile) -> Self {
        Self {
            profile,
            compress: false,
            utf8: false,
            creation_time_offset: CREATION_TIME_OFFSET_SECS,
            clock: Clock::System,
        }
    }

    /// Resolves the configured profile name against the builtin registry.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with(config, &ProfileRegistry::builtin())
    }

    pub fn from_config_with(config: &Config, registry: &ProfileRegistry) -> Result<Self> {
        let profile = registry.get(&config.profile.name)?;
        debug!(profile = %profile.name, "handle from config");
        Ok(Self {
            compress: config.encryption.compress,
            utf8: config.encryption.utf8,
            creation_time_offset: config.verify.creation_time_offset_secs,
            ..Self::with_profile(profile)
        })
    }

    /// Pins every handle built from here to a fixed clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn encryption<'k>(&self) -> EncryptionHandleBuilder<'k> {
        EncryptionHandleBuilder::new(self.profile.clone())
            .compress(self.compress)
            .utf8(self.utf8)
            .clock(self.clock)
    }

    pub fn decryption<'k>(&self) -> DecryptionHandleBuilder<'k> {
        DecryptionHandleBuilder::default().clock(self.clock)
    }

    pub fn sign<'k>(&self) -> SignHandleBuilder<'k> {
        SignHandleBuilder::new(self.profile.clone()).clock(self.clock)
    }

    pub fn verify<'k>(&self) -> VerifyHandleBuilder<'k> {
        VerifyHandleBuilder::default()
            .creation_time_offset(self.creation_time_offset)
            .clock(self.clock)
    }

    pub fn generate_key(&self, name: &str, email: &str, level: SecurityLevel) -> Result<KeyRing> {
        KeyRing::generate(name, email, &self.profile, level, self.clock.now())
    }

    /// Locks every secret key in `keys` with the profile's key-encryption
    /// parameters.
    pub fn lock_key(&self, keys: &KeyRing, passphrase: &Passphrase) -> Result<KeyRing> {
        keys.lock(passphrase, &self.profile)
    }

    pub fn unlock_key(&self, keys: &KeyRing, passphrase: &Passphrase) -> Result<KeyRing> {
        keys.unlock(passphrase)
    }

    pub fn generate_session_key(&self) -> Result<SessionKey> {
        SessionKey::generate(&self.profile)
    }
}

impl Default for PgpHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_crypto_refresh_uses_v6_profile() {
        let pgp = PgpHandle::crypto_refresh().unwrap();
        assert!(pgp.profile().v6);
        assert_eq!(pgp.profile().name(), CRYPTO_REFRESH_PROFILE_NAME);
        assert!(pgp.generate_session_key().unwrap().is_v6());
    }

    #[test]
    fn test_from_config_rejects_unknown_profile() {
        let mut config = Config::default();
        config.profile.name = "nope".into();
        assert!(matches!(
            PgpHandle::from_config(&config),
            Err(CoreError::UnknownProfile(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_from_config_carries_encryption_defaults() {
        let mut config = Config::default();
        config.encryption.compress = true;
        config.verify.creation_time_offset_secs = 10;
        let pgp = PgpHandle::from_config(&config).unwrap();
        assert!(pgp.compress);
        assert_eq!(pgp.creation_time_offset, 10);
    }
}
