// src/error.rs
//! Public error type for the entire crate

use std::fmt;

use thiserror::Error;

use crate::enums::VerificationStatus;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Engine operation that failed. The `Display` text is the stable prefix
/// callers can rely on for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Operation {
    EncryptAsymmetric,
    EncryptSessionKey,
    Encrypt,
    Compress,
    Sign,
    Serialize,
    Decrypt,
    DecryptSessionKey,
    Verify,
    GenerateKey,
    LockKey,
    UnlockKey,
    Parse,
    Armor,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self {
            Operation::EncryptAsymmetric => "error in encrypting asymmetrically",
            Operation::EncryptSessionKey => "unable to encrypt with session key",
            Operation::Encrypt => "unable to encrypt",
            Operation::Compress => "error in compression",
            Operation::Sign => "unable to sign",
            Operation::Serialize => "unable to serialize",
            Operation::Decrypt => "unable to decrypt message",
            Operation::DecryptSessionKey => "unable to decrypt session key",
            Operation::Verify => "unable to verify signature",
            Operation::GenerateKey => "unable to generate key",
            Operation::LockKey => "unable to lock key",
            Operation::UnlockKey => "unable to unlock key",
            Operation::Parse => "unable to parse",
            Operation::Armor => "unable to armor",
        };
        f.write_str(prefix)
    }
}

/// Decryption succeeded but the signature did not verify.
///
/// Returned as data by the explicit-verify paths, and as
/// [`CoreError::SignatureVerification`] by the plain verify paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("signature verification failed ({status}): {message}")]
pub struct SignatureVerificationError {
    pub status: VerificationStatus,
    pub message: String,
}

impl SignatureVerificationError {
    pub fn new(status: VerificationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("key is locked: {0}")]
    LockedKey(String),

    #[error("{op}: {source}")]
    Engine {
        op: Operation,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    SignatureVerification(#[from] SignatureVerificationError),

    #[error("signature expired: {0}")]
    SignatureExpired(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("session key has been cleared")]
    SessionKeyCleared,

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn engine(op: Operation, source: impl Into<anyhow::Error>) -> Self {
        CoreError::Engine {
            op,
            source: source.into(),
        }
    }

    /// The operation prefix, if this is an engine failure.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            CoreError::Engine { op, .. } => Some(*op),
            _ => None,
        }
    }
}

/// Tags engine results with the operation they belong to.
pub(crate) trait EngineResultExt<T> {
    fn op(self, op: Operation) -> Result<T>;
}

impl<T> EngineResultExt<T> for anyhow::Result<T> {
    fn op(self, op: Operation) -> Result<T> {
        self.map_err(|source| CoreError::Engine { op, source })
    }
}

impl<T> EngineResultExt<T> for std::io::Result<T> {
    fn op(self, op: Operation) -> Result<T> {
        self.map_err(|source| CoreError::engine(op, source))
    }
}
