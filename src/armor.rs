// src/armor.rs
//! ASCII armor for messages, signatures and keys

use std::io::{Read, Write};

use sequoia_openpgp as openpgp;

use openpgp::armor::{Kind, Reader, ReaderMode, Writer};

use crate::enums::ArmorKind;
use crate::error::{CoreError, EngineResultExt, Operation, Result};

impl From<ArmorKind> for Kind {
    fn from(kind: ArmorKind) -> Self {
        match kind {
            ArmorKind::Message => Kind::Message,
            ArmorKind::Signature => Kind::Signature,
            ArmorKind::PublicKey => Kind::PublicKey,
            ArmorKind::SecretKey => Kind::SecretKey,
        }
    }
}

pub fn armor(bytes: &[u8], kind: ArmorKind) -> Result<String> {
    let mut writer = Writer::new(Vec::new(), kind.into()).op(Operation::Armor)?;
    writer.write_all(bytes).op(Operation::Armor)?;
    let out = writer.finalize().op(Operation::Armor)?;
    String::from_utf8(out).map_err(|e| CoreError::engine(Operation::Armor, e))
}

/// Strips armor of any kind; binary input is passed through unchanged.
pub fn unarmor(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_bytes(data, ReaderMode::Tolerant(None));
    let mut out = Vec::new();
    reader.read_to_end(&mut out).op(Operation::Armor)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armor_header_follows_kind() {
        let text = armor(b"\xc3\x00", ArmorKind::Signature).unwrap();
        assert!(text.starts_with("-----BEGIN PGP SIGNATURE-----"));
        let text = armor(b"\xc3\x00", ArmorKind::Message).unwrap();
        assert!(text.starts_with("-----BEGIN PGP MESSAGE-----"));
    }

    #[test]
    fn test_unarmor_recovers_bytes() {
        let payload = b"\xc1\x02\x03\x04 arbitrary".to_vec();
        let text = armor(&payload, ArmorKind::Message).unwrap();
        assert_eq!(unarmor(text.as_bytes()).unwrap(), payload);
    }
}
