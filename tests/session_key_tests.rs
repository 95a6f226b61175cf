// tests/session_key_tests.rs
use pgp_compose::openpgp::types::SymmetricAlgorithm;
use pgp_compose::{Clock, CoreError, LiteralMetadata, Operation, Passphrase, PipelineKind, SessionKey};

mod common;
mod support;
use support::{alice, bob, pgp, pgp_v6, NOW};

#[test]
fn test_clear_twice_leaves_key_unusable() {
    let mut sk = pgp().generate_session_key().unwrap();
    assert!(sk.bytes().is_ok());

    sk.clear();
    assert!(sk.is_cleared());
    assert!(matches!(sk.bytes(), Err(CoreError::SessionKeyCleared)));

    sk.clear();
    assert!(sk.is_cleared());
    assert!(matches!(sk.to_base64(), Err(CoreError::SessionKeyCleared)));
    assert!(matches!(sk.encrypt_to(bob()), Err(CoreError::SessionKeyCleared)));
}

#[test]
fn test_cleared_key_cannot_encrypt() {
    let pgp = pgp();
    let mut sk = pgp.generate_session_key().unwrap();
    sk.clear();
    let handle = pgp.encryption().session_key(&sk).build().unwrap();
    assert_eq!(handle.kind(), PipelineKind::SessionKeyEncrypt);
    assert!(matches!(
        handle.encrypt(b"never"),
        Err(CoreError::SessionKeyCleared)
    ));
}

#[test]
fn test_generated_size_follows_profile_cipher() {
    let sk = pgp().generate_session_key().unwrap();
    assert_eq!(sk.bytes().unwrap().len(), 32);
    assert_eq!(sk.cipher().unwrap(), SymmetricAlgorithm::AES256);
    assert!(!sk.is_v6());

    let v6 = pgp_v6().generate_session_key().unwrap();
    assert!(v6.is_v6());
}

#[test]
fn test_from_bytes_checks_length() {
    assert!(matches!(
        SessionKey::from_bytes(vec![0u8; 10], SymmetricAlgorithm::AES128),
        Err(CoreError::Configuration(_))
    ));
    let sk = SessionKey::from_bytes_v6(vec![7u8; 16], None).unwrap();
    assert_eq!(sk.cipher().unwrap(), SymmetricAlgorithm::AES128);
}

#[test]
fn test_base64_roundtrip_preserves_key() {
    let sk = pgp().generate_session_key().unwrap();
    let encoded = sk.to_base64().unwrap();
    let back = SessionKey::from_base64(&encoded, SymmetricAlgorithm::AES256).unwrap();
    assert_eq!(back, sk);
}

#[test]
fn test_session_key_only_data_packet() {
    common::setup();
    let pgp = pgp();
    let sk = pgp.generate_session_key().unwrap();
    let data_packet = pgp
        .encryption()
        .session_key(&sk)
        .build()
        .unwrap()
        .encrypt(b"bare data packet")
        .unwrap();
    assert_eq!(sk.decrypt(&data_packet).unwrap(), b"bare data packet");

    let message = pgp
        .decryption()
        .session_key(&sk)
        .build()
        .unwrap()
        .decrypt(&data_packet)
        .unwrap();
    assert_eq!(message.plaintext(), b"bare data packet");
}

#[test]
fn test_decrypt_and_verify_with_session_key() {
    let pgp = pgp();
    let sk = pgp.generate_session_key().unwrap();
    let split = pgp
        .encryption()
        .recipients(bob())
        .signing_keys(alice())
        .session_key(&sk)
        .build()
        .unwrap()
        .encrypt_split(b"signed by alice", &LiteralMetadata::default())
        .unwrap();

    let good = sk
        .decrypt_and_verify(&split.data_packet, Some(alice()), NOW)
        .unwrap();
    assert!(good.is_verified());

    let unknown = sk
        .decrypt_and_verify(&split.data_packet, Some(bob()), NOW)
        .unwrap();
    assert_eq!(unknown.plaintext(), b"signed by alice");
    assert!(unknown.signature_error().is_some());
}

#[test]
fn test_password_key_packets() {
    let pgp = pgp();
    let sk = pgp.generate_session_key().unwrap();
    let password = Passphrase::new(b"open sesame".to_vec());
    let key_packets = sk.encrypt_with_password(&password, pgp.profile()).unwrap();

    let back = SessionKey::decrypt_with_password(&key_packets, &password).unwrap();
    assert_eq!(back, sk);

}

#[test]
fn test_wrong_password_is_hard_failure() {
    let pgp = pgp_v6();
    let sk = pgp.generate_session_key().unwrap();
    let key_packets = sk
        .encrypt_with_password(&Passphrase::new(b"open sesame".to_vec()), pgp.profile())
        .unwrap();
    let wrong = SessionKey::decrypt_with_password(&key_packets, &Passphrase::new(b"nope".to_vec()));
    assert!(matches!(wrong, Err(CoreError::Engine { .. })));
}

#[test]
fn test_hidden_key_packets_open_with_matching_key() {
    let sk = pgp().generate_session_key().unwrap();
    let key_packets = sk.encrypt_to_hidden(bob()).unwrap();
    assert_eq!(bob().decrypt_session_key(&key_packets).unwrap(), sk);
    assert!(alice().decrypt_session_key(&key_packets).is_err());
}

#[test]
fn test_recipient_keys_selected_at_given_clock() {
    let sk = pgp().generate_session_key().unwrap();
    let key_packets = sk.encrypt_to_at(bob(), Clock::at_unix(NOW)).unwrap();
    assert_eq!(bob().decrypt_session_key(&key_packets).unwrap(), sk);

    // Before the key existed there is nothing to encrypt to
    let before = Clock::at_unix(NOW - 365 * 24 * 3600);
    let err = sk.encrypt_to_hidden_at(bob(), before).unwrap_err();
    assert_eq!(err.operation(), Some(Operation::EncryptAsymmetric));
}
