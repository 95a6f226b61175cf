// src/profile/presets.rs
//! Built-in profiles and the explicit name → profile map

use std::collections::BTreeMap;

use sequoia_openpgp::types::{
    AEADAlgorithm, CompressionAlgorithm, HashAlgorithm, SymmetricAlgorithm,
};

use super::{AeadConfig, Profile, S2kConfig};
use crate::consts::{
    ARGON2_MEMORY_EXPONENT, ARGON2_PARALLELISM, ARGON2_PASSES, CRYPTO_REFRESH_PROFILE_NAME,
    DEFAULT_PROFILE_NAME, LEGACY_PROFILE_NAME, S2K_ITERATED_COUNT,
};
use crate::enums::KeyAlgorithm;
use crate::error::{CoreError, Result};

fn iterated_sha256() -> S2kConfig {
    S2kConfig::Iterated {
        hash: HashAlgorithm::SHA256,
        count: S2K_ITERATED_COUNT,
    }
}

/// v4 keys, elliptic curves, AES-256, no AEAD.
pub(crate) fn default_profile() -> Profile {
    Profile {
        name: DEFAULT_PROFILE_NAME.into(),
        key_algorithm: KeyAlgorithm::Elliptic,
        hash: HashAlgorithm::SHA256,
        cipher_key_encryption: SymmetricAlgorithm::AES256,
        aead_key_encryption: None,
        s2k_key_encryption: Some(iterated_sha256()),
        cipher_encryption: SymmetricAlgorithm::AES256,
        aead_encryption: None,
        s2k_encryption: Some(iterated_sha256()),
        compression_algorithm: CompressionAlgorithm::Zlib,
        compression_level: 6,
        hash_sign: HashAlgorithm::SHA512,
        v6: false,
    }
}

/// v4 RSA keys for peers that only speak RFC 4880.
pub(crate) fn rfc4880() -> Profile {
    Profile {
        name: LEGACY_PROFILE_NAME.into(),
        key_algorithm: KeyAlgorithm::Rsa,
        hash_sign: HashAlgorithm::SHA256,
        ..default_profile()
    }
}

/// v6 keys, SEIPDv2 with OCB, Argon2 for passwords.
pub(crate) fn rfc9580() -> Profile {
    let aead = Some(AeadConfig {
        algorithm: AEADAlgorithm::OCB,
    });
    let argon2 = Some(S2kConfig::Argon2 {
        passes: ARGON2_PASSES,
        parallelism: ARGON2_PARALLELISM,
        memory_exponent: ARGON2_MEMORY_EXPONENT,
    });
    Profile {
        name: CRYPTO_REFRESH_PROFILE_NAME.into(),
        key_algorithm: KeyAlgorithm::Elliptic,
        hash: HashAlgorithm::SHA512,
        cipher_key_encryption: SymmetricAlgorithm::AES256,
        aead_key_encryption: aead,
        s2k_key_encryption: argon2,
        cipher_encryption: SymmetricAlgorithm::AES256,
        aead_encryption: aead,
        s2k_encryption: argon2,
        compression_algorithm: CompressionAlgorithm::Zlib,
        compression_level: 6,
        hash_sign: HashAlgorithm::SHA512,
        v6: true,
    }
}

/// Constructor stored in a [`ProfileRegistry`]
pub type ProfileCtor = fn() -> Profile;

/// Explicit name → profile mapping, handed to whatever needs lookup by name.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    entries: BTreeMap<String, ProfileCtor>,
}

impl ProfileRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// `default`, `rfc4880` and `rfc9580`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_PROFILE_NAME, default_profile);
        registry.register(LEGACY_PROFILE_NAME, rfc4880);
        registry.register(CRYPTO_REFRESH_PROFILE_NAME, rfc9580);
        registry
    }

    /// Adds or replaces a named profile.
    pub fn register(&mut self, name: impl Into<String>, ctor: ProfileCtor) -> &mut Self {
        self.entries.insert(name.into(), ctor);
        self
    }

    pub fn get(&self, name: &str) -> Result<Profile> {
        self.entries
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| CoreError::UnknownProfile(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_resolves_all_names() {
        let registry = ProfileRegistry::builtin();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["default", "rfc4880", "rfc9580"]);
        for name in names {
            assert_eq!(registry.get(name).unwrap().name(), name);
        }
    }

    #[test]
    fn test_unknown_profile_is_an_error() {
        let err = ProfileRegistry::builtin().get("nope").unwrap_err();
        assert!(matches!(err, CoreError::UnknownProfile(ref n) if n == "nope"));
    }

    #[test]
    fn test_registered_profile_shadows_builtin() {
        fn fast() -> Profile {
            Profile {
                name: "default".into(),
                compression_level: 1,
                ..default_profile()
            }
        }
        let mut registry = ProfileRegistry::builtin();
        registry.register("default", fast);
        assert_eq!(registry.get("default").unwrap().compression_level, 1);
    }

    #[test]
    fn test_crypto_refresh_profile_is_v6_with_aead() {
        let p = rfc9580();
        assert!(p.v6);
        assert_eq!(
            p.encryption_config().aead,
            Some(AeadConfig {
                algorithm: AEADAlgorithm::OCB
            })
        );
    }
}
