// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for all #[derive(...)] enums that represent
//! user-visible choices: security levels, key algorithms, verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strength of generated keys. Only consumed by key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub enum SecurityLevel {
    #[default]
    Standard,
    High,
}

/// Key family a profile generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub enum KeyAlgorithm {
    Rsa,
    #[default]
    Elliptic,
}

/// Why a signature did not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum VerificationStatus {
    /// The message carries no signature.
    NotSigned,
    /// No key in the verification keyring matches the signer.
    NoVerifier,
    /// A matching key was found but the signature is invalid.
    Failed,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationStatus::NotSigned => "not signed",
            VerificationStatus::NoVerifier => "no verifier",
            VerificationStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Armor block types understood by [`crate::armor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub enum ArmorKind {
    #[default]
    Message,
    Signature,
    PublicKey,
    SecretKey,
}
