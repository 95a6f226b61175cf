// src/lib.rs
//! pgp-compose — streaming OpenPGP composition over sequoia-openpgp
//!
//! Features:
//! - Named algorithm profiles (`default`, `rfc4880`, `rfc9580`)
//! - Encrypt / encrypt+sign pipelines with split key, data and signature sinks
//! - Explicit-verify decryption: plaintext and signature verdict side by side
//! - Detached signing and verification with a clock-skew retry
//! - Session keys held in secure-gate containers, zeroed on drop

pub mod aliases;
pub mod armor;
pub mod attachment;
pub mod clock;
pub mod config;
pub mod consts;
pub mod context;
pub mod decryption;
pub mod encryption;
pub mod enums;
pub mod error;
pub mod handle;
pub mod keyring;
pub mod profile;
pub mod session_key;
pub mod sign;
pub mod split;
pub mod verify;

mod packets;

// Re-export everything users need at the crate root
pub use aliases::{Passphrase, PlainText, SessionKeyBytes};
pub use attachment::{ArmoredDetached, BinaryDetached};
pub use clock::Clock;
pub use config::{load as load_config, Config};
pub use decryption::{DecryptionHandle, DecryptionHandleBuilder, ExplicitVerifyMessage};
pub use encryption::{
    EncryptionHandle, EncryptionHandleBuilder, LiteralMetadata, PipelineKind, PlaintextWriter,
};
pub use enums::{ArmorKind, KeyAlgorithm, SecurityLevel, VerificationStatus};
pub use error::{CoreError, Operation, Result, SignatureVerificationError};
pub use handle::PgpHandle;
pub use keyring::KeyRing;
pub use profile::{Profile, ProfileRegistry};
pub use session_key::SessionKey;
pub use sign::{SignHandle, SignHandleBuilder};
pub use split::{SplitMessage, SplitWriter};
pub use verify::{VerifiedData, VerifyHandle, VerifyHandleBuilder};

/// The packet engine, for callers that need its types (fingerprints,
/// algorithm identifiers).
pub use sequoia_openpgp as openpgp;
