// src/packets.rs
//! Key packets — PKESK / SKESK creation and session-key recovery
//!
//! The handles always own the session key, so the key packets are produced
//! here and written wherever the caller wants them: a dedicated key sink,
//! or as a prefix of the data sink.

use std::io::Write;

use sequoia_openpgp as openpgp;

use openpgp::packet::prelude::*;
use openpgp::parse::Parse;
use openpgp::serialize::Serialize;
use openpgp::types::SymmetricAlgorithm;
use openpgp::{Packet, PacketPile};
use tracing::{debug, trace};

use crate::aliases::{engine_password, Passphrase};
use crate::error::{CoreError, EngineResultExt, Operation, Result};
use crate::keyring::{KeyRing, PublicKey};
use crate::profile::EncryptionConfig;
use crate::session_key::SessionKey;

/// One PKESK per key. Hidden recipients get a wildcard key id.
pub(crate) fn write_pkesks(
    out: &mut dyn Write,
    sk: &SessionKey,
    keys: &[PublicKey],
    hidden: bool,
) -> Result<()> {
    if keys.is_empty() {
        return Err(CoreError::engine(
            Operation::EncryptAsymmetric,
            anyhow::anyhow!("no recipient keys"),
        ));
    }
    let engine_key = sk.engine_key()?;
    for key in keys {
        let packet = if sk.is_v6() {
            let mut pkesk =
                PKESK6::for_recipient(&engine_key, key).op(Operation::EncryptAsymmetric)?;
            pkesk.set_recipient(if hidden { None } else { Some(key.fingerprint()) });
            Packet::from(pkesk)
        } else {
            let mut pkesk = PKESK3::for_recipient(sk.cipher()?, &engine_key, key)
                .op(Operation::EncryptAsymmetric)?;
            pkesk.set_recipient(if hidden { None } else { Some(key.keyid()) });
            Packet::from(pkesk)
        };
        packet.serialize(out).op(Operation::Serialize)?;
        trace!(recipient = %key.fingerprint(), hidden, "wrote PKESK");
    }
    Ok(())
}

/// One SKESK protecting `sk` with `password`.
pub(crate) fn write_skesk(
    out: &mut dyn Write,
    sk: &SessionKey,
    password: &Passphrase,
    config: &EncryptionConfig,
) -> Result<()> {
    let engine_key = sk.engine_key()?;
    let password = engine_password(password);
    let cipher = sk.cipher()?;
    let s2k = config.s2k()?;
    let packet = if sk.is_v6() {
        let aead = config.aead.map(|a| a.algorithm).unwrap_or_default();
        let skesk = SKESK6::with_password(cipher, cipher, aead, s2k, &engine_key, &password)
            .op(Operation::EncryptSessionKey)?;
        Packet::from(skesk)
    } else {
        let skesk = SKESK4::with_password(cipher, cipher, s2k, &engine_key, &password)
            .op(Operation::EncryptSessionKey)?;
        Packet::from(skesk)
    };
    packet.serialize(out).op(Operation::Serialize)?;
    Ok(())
}

/// Recovers the session key from a run of PKESK / SKESK packets.
///
/// PKESKs are tried against the matching secret keys of `keys` (every key
/// for wildcard recipients), SKESKs against each password in turn.
pub(crate) fn read_session_key(
    key_packets: &[u8],
    keys: Option<&KeyRing>,
    passwords: &[Passphrase],
) -> Result<SessionKey> {
    let pile = PacketPile::from_bytes(key_packets).op(Operation::Parse)?;
    let mut saw_locked = false;
    for packet in pile.into_children() {
        match packet {
            Packet::PKESK(pkesk) => {
                let Some(ring) = keys else { continue };
                let v6 = pkesk.version() == 6;
                for key in ring.decryption_candidates(pkesk.recipient().as_ref()) {
                    if key.secret().is_encrypted() {
                        saw_locked = true;
                        continue;
                    }
                    let mut keypair = match key.into_keypair() {
                        Ok(kp) => kp,
                        Err(_) => continue,
                    };
                    if let Some((algo, engine_key)) = pkesk.decrypt(&mut keypair, None) {
                        debug!(version = pkesk.version(), "session key from PKESK");
                        return Ok(SessionKey::from_engine(engine_key, algo, v6));
                    }
                }
            }
            Packet::SKESK(skesk) => {
                let v6 = skesk.version() == 6;
                for password in passwords {
                    let Ok((algo, engine_key)) = skesk.decrypt(&engine_password(password)) else {
                        continue;
                    };
                    if !plausible_key(algo, &engine_key) {
                        trace!(version = skesk.version(), "SKESK opened to an unusable key");
                        continue;
                    }
                    debug!(version = skesk.version(), "session key from SKESK");
                    return Ok(SessionKey::from_engine(engine_key, algo, v6));
                }
            }
            other => trace!(tag = %other.tag(), "skipping non key packet"),
        }
    }
    if saw_locked {
        Err(CoreError::LockedKey(
            "cannot decrypt session key, private key is not unlocked".into(),
        ))
    } else {
        Err(CoreError::engine(
            Operation::DecryptSessionKey,
            anyhow::anyhow!("no key packet could be decrypted"),
        ))
    }
}

/// A v4 SKESK carries no integrity check, so a wrong password still yields
/// an algorithm byte and key bytes. Reject keys whose algorithm is unknown
/// or whose length does not match it. SKESK6 is AEAD protected and reports
/// no algorithm.
fn plausible_key(algo: Option<SymmetricAlgorithm>, key: &[u8]) -> bool {
    match algo {
        None => !key.is_empty(),
        Some(algo) => {
            algo.is_supported()
                && algo.key_size().map(|size| size == key.len()).unwrap_or(false)
        }
    }
}

/// Splits a complete binary message into its leading key packets and the
/// remaining encrypted data packet(s).
pub(crate) fn split_message(message: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let pile = PacketPile::from_bytes(message).op(Operation::Parse)?;
    let mut key_packets = Vec::new();
    let mut data_packets = Vec::new();
    for packet in pile.into_children() {
        let out = match packet {
            Packet::PKESK(_) | Packet::SKESK(_) if data_packets.is_empty() => &mut key_packets,
            _ => &mut data_packets,
        };
        packet.serialize(out).op(Operation::Serialize)?;
    }
    if data_packets.is_empty() {
        return Err(CoreError::engine(
            Operation::Parse,
            anyhow::anyhow!("message carries no encrypted data packet"),
        ));
    }
    Ok((key_packets, data_packets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Profile, ProfileRegistry};

    #[test]
    fn test_skesk_roundtrip_with_password() {
        let profile = Profile::default();
        let sk = SessionKey::generate(&profile).unwrap();
        let pw = Passphrase::new(b"hunter2".to_vec());
        let mut out = Vec::new();
        write_skesk(&mut out, &sk, &pw, &profile.encryption_config()).unwrap();
        let back = read_session_key(&out, None, &[pw]).unwrap();
        assert_eq!(back, sk);
    }

    #[test]
    fn test_wrong_password_is_session_key_error() {
        let profile = ProfileRegistry::builtin().get("rfc9580").unwrap();
        let sk = SessionKey::generate(&profile).unwrap();
        let mut out = Vec::new();
        write_skesk(
            &mut out,
            &sk,
            &Passphrase::new(b"right".to_vec()),
            &profile.encryption_config(),
        )
        .unwrap();
        let err = read_session_key(&out, None, &[Passphrase::new(b"wrong".to_vec())]).unwrap_err();
        assert_eq!(err.operation(), Some(Operation::DecryptSessionKey));
    }

    #[test]
    fn test_wrong_password_does_not_shadow_right_one() {
        let profile = ProfileRegistry::builtin().get("rfc9580").unwrap();
        let sk = SessionKey::generate(&profile).unwrap();
        let right = Passphrase::new(b"right".to_vec());
        let mut out = Vec::new();
        write_skesk(&mut out, &sk, &right, &profile.encryption_config()).unwrap();
        let passwords = [Passphrase::new(b"wrong".to_vec()), right];
        assert_eq!(read_session_key(&out, None, &passwords).unwrap(), sk);
    }

    #[test]
    fn test_plausible_key_checks_algorithm_and_length() {
        assert!(plausible_key(Some(SymmetricAlgorithm::AES256), &[0u8; 32]));
        assert!(!plausible_key(Some(SymmetricAlgorithm::AES256), &[0u8; 16]));
        assert!(!plausible_key(Some(SymmetricAlgorithm::Unknown(200)), &[0u8; 32]));
        assert!(!plausible_key(Some(SymmetricAlgorithm::Private(101)), &[0u8; 16]));
        assert!(plausible_key(None, &[0u8; 16]));
    }

    #[test]
    fn test_no_recipient_keys_is_rejected() {
        let sk = SessionKey::generate(&Profile::default()).unwrap();
        let err = write_pkesks(&mut Vec::new(), &sk, &[], false).unwrap_err();
        assert_eq!(err.operation(), Some(Operation::EncryptAsymmetric));
    }
}
