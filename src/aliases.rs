// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret containers used throughout pgp-compose.

pub use secure_gate::{dynamic_alias, SecureConversionsExt, Zeroize};

// Dynamic secrets
dynamic_alias!(SessionKeyBytes, Vec<u8>); // symmetric key protecting a data packet
dynamic_alias!(Passphrase, Vec<u8>); // message password or key-lock passphrase
dynamic_alias!(PlainText, Vec<u8>); // recovered plaintext

/// Converts a passphrase into the engine's in-memory-encrypted form.
pub(crate) fn engine_password(pw: &Passphrase) -> sequoia_openpgp::crypto::Password {
    pw.expose_secret().as_slice().into()
}
