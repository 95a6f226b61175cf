// src/profile/mod.rs
//! Algorithm profiles
//!
//! A [`Profile`] is an immutable bundle of algorithm choices. Every config
//! handed to the engine is a projection of exactly one profile; producing
//! one never touches the profile itself.

use sequoia_openpgp as openpgp;

use openpgp::cert::CipherSuite;
use openpgp::crypto::S2K;
use openpgp::types::{AEADAlgorithm, CompressionAlgorithm, HashAlgorithm, SymmetricAlgorithm};

use crate::enums::{KeyAlgorithm, SecurityLevel};
use crate::error::{EngineResultExt, Operation, Result};

mod presets;

pub use presets::ProfileRegistry;

/// AEAD mode used for SEIPDv2 data packets and v6 key packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AeadConfig {
    pub algorithm: AEADAlgorithm,
}

/// Password-to-key derivation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S2kConfig {
    Iterated { hash: HashAlgorithm, count: u32 },
    Argon2 { passes: u8, parallelism: u8, memory_exponent: u8 },
}

impl S2kConfig {
    /// Instantiates the S2K specifier with a fresh random salt.
    pub fn to_s2k(&self) -> Result<S2K> {
        match *self {
            S2kConfig::Iterated { hash, count } => {
                S2K::new_iterated(hash, count).op(Operation::EncryptSessionKey)
            }
            S2kConfig::Argon2 {
                passes,
                parallelism,
                memory_exponent,
            } => {
                let mut salt = [0u8; 16];
                openpgp::crypto::random(&mut salt).op(Operation::EncryptSessionKey)?;
                Ok(S2K::Argon2 {
                    salt,
                    t: passes,
                    p: parallelism,
                    m: memory_exponent,
                })
            }
        }
    }
}

/// Public-key algorithm family chosen for key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenAlgorithm {
    Rsa { bits: u32 },
    /// Legacy EdDSA/ECDH (v4 keys); Curve448 when `curve448` is set.
    EdDsaLegacy { curve448: bool },
    Ed25519,
    Ed448,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGenerationConfig {
    pub algorithm: KeyGenAlgorithm,
    pub hash: HashAlgorithm,
    pub cipher: SymmetricAlgorithm,
    pub aead: Option<AeadConfig>,
    pub compression: CompressionAlgorithm,
    pub v6: bool,
}

impl KeyGenerationConfig {
    pub(crate) fn cipher_suite(&self) -> CipherSuite {
        match self.algorithm {
            KeyGenAlgorithm::Rsa { bits } if bits >= 4096 => CipherSuite::RSA4k,
            KeyGenAlgorithm::Rsa { bits } if bits >= 3072 => CipherSuite::RSA3k,
            KeyGenAlgorithm::Rsa { .. } => CipherSuite::RSA2k,
            KeyGenAlgorithm::EdDsaLegacy { curve448: true } | KeyGenAlgorithm::Ed448 => {
                CipherSuite::Cv448
            }
            KeyGenAlgorithm::EdDsaLegacy { curve448: false } | KeyGenAlgorithm::Ed25519 => {
                CipherSuite::Cv25519
            }
        }
    }

    pub(crate) fn packet_profile(&self) -> openpgp::Profile {
        if self.v6 {
            openpgp::Profile::RFC9580
        } else {
            openpgp::Profile::RFC4880
        }
    }
}

/// Symmetric parameters for message encryption or for locking key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionConfig {
    pub hash: HashAlgorithm,
    pub cipher: SymmetricAlgorithm,
    pub aead: Option<AeadConfig>,
    pub s2k: Option<S2kConfig>,
}

impl EncryptionConfig {
    pub(crate) fn s2k(&self) -> Result<S2K> {
        match self.s2k {
            Some(config) => config.to_s2k(),
            None => Ok(S2K::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignConfig {
    pub hash: HashAlgorithm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    pub algorithm: CompressionAlgorithm,
    /// zlib-style level, 0..=9
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub key_algorithm: KeyAlgorithm,

    pub hash: HashAlgorithm,

    pub cipher_key_encryption: SymmetricAlgorithm,
    pub aead_key_encryption: Option<AeadConfig>,
    pub s2k_key_encryption: Option<S2kConfig>,

    pub cipher_encryption: SymmetricAlgorithm,
    pub aead_encryption: Option<AeadConfig>,
    pub s2k_encryption: Option<S2kConfig>,
    pub compression_algorithm: CompressionAlgorithm,
    pub compression_level: u8,

    pub hash_sign: HashAlgorithm,
    pub v6: bool,
}

impl Profile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_generation_config(&self, level: SecurityLevel) -> KeyGenerationConfig {
        let algorithm = match (self.key_algorithm, level) {
            (KeyAlgorithm::Rsa, SecurityLevel::High) => KeyGenAlgorithm::Rsa { bits: 4096 },
            (KeyAlgorithm::Rsa, _) => KeyGenAlgorithm::Rsa { bits: 3072 },
            (KeyAlgorithm::Elliptic, SecurityLevel::High) if self.v6 => KeyGenAlgorithm::Ed448,
            (KeyAlgorithm::Elliptic, SecurityLevel::High) => {
                KeyGenAlgorithm::EdDsaLegacy { curve448: true }
            }
            (KeyAlgorithm::Elliptic, _) if self.v6 => KeyGenAlgorithm::Ed25519,
            (KeyAlgorithm::Elliptic, _) => KeyGenAlgorithm::EdDsaLegacy { curve448: false },
        };
        KeyGenerationConfig {
            algorithm,
            hash: self.hash,
            cipher: self.cipher_encryption,
            aead: self.aead_encryption,
            compression: self.compression_algorithm,
            v6: self.v6,
        }
    }

    pub fn encryption_config(&self) -> EncryptionConfig {
        EncryptionConfig {
            hash: self.hash,
            cipher: self.cipher_encryption,
            aead: self.aead_encryption,
            s2k: self.s2k_encryption,
        }
    }

    pub fn key_encryption_config(&self) -> EncryptionConfig {
        EncryptionConfig {
            hash: self.hash,
            cipher: self.cipher_key_encryption,
            aead: self.aead_key_encryption,
            s2k: self.s2k_key_encryption,
        }
    }

    pub fn sign_config(&self) -> SignConfig {
        SignConfig {
            hash: self.hash_sign,
        }
    }

    pub fn compression_config(&self) -> CompressionConfig {
        CompressionConfig {
            algorithm: self.compression_algorithm,
            level: self.compression_level,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        presets::default_profile()
    }
}
