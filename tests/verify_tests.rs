// tests/verify_tests.rs
use std::time::Duration;

use pgp_compose::{CoreError, KeyRing, Passphrase, VerificationStatus};

mod common;
mod support;
use support::{alice, expiring_signature, mallory, pgp, NOW};

const HOUR: i64 = 3600;

#[test]
fn test_detached_sign_and_verify() {
    common::setup();
    let pgp = pgp();
    let signer = pgp.sign().signing_keys(alice()).build().unwrap();
    let signature = signer.sign_detached(b"contract").unwrap();

    let public = alice().to_public();
    let verifier = pgp.verify().verification_keys(&public).build().unwrap();
    let fingerprint = verifier.verify_detached(b"contract", &signature, NOW).unwrap();
    assert!(alice()
        .certs()
        .iter()
        .any(|c| c.keys().any(|k| k.key().fingerprint() == fingerprint)));
    assert!(verifier.verify_detached_now(b"contract", &signature).is_ok());
}

#[test]
fn test_unknown_signer_is_signer_empty() {
    let pgp = pgp();
    let signature = pgp
        .sign()
        .signing_keys(mallory())
        .build()
        .unwrap()
        .sign_detached(b"data")
        .unwrap();
    let result = pgp
        .verify()
        .verification_keys(alice())
        .build()
        .unwrap()
        .verify_detached(b"data", &signature, NOW);
    match result {
        Err(CoreError::SignatureVerification(e)) => {
            assert_eq!(e.status, VerificationStatus::NoVerifier);
            assert_eq!(e.message, "signer is empty");
        }
        other => panic!("expected verification error, got {other:?}"),
    }
}

#[test]
fn test_text_signature_ignores_trailing_whitespace() {
    let pgp = pgp();
    let signature = pgp
        .sign()
        .signing_keys(alice())
        .build()
        .unwrap()
        .sign_text_detached("Dear Bob,  \nsee you\t\n", true)
        .unwrap();
    let verifier = pgp.verify().verification_keys(alice()).build().unwrap();
    assert!(verifier
        .verify_text_detached("Dear Bob,\nsee you   \n", &signature, NOW)
        .is_ok());
    assert!(verifier
        .verify_text_detached("Dear Rob,\nsee you\n", &signature, NOW)
        .is_err());
}

#[test]
fn test_inline_signed_message() {
    let pgp = pgp();
    let message = pgp
        .sign()
        .signing_keys(alice())
        .build()
        .unwrap()
        .sign_inline(b"public notice")
        .unwrap();
    let verified = pgp
        .verify()
        .verification_keys(alice())
        .build()
        .unwrap()
        .verify_inline(&message, NOW)
        .unwrap();
    assert_eq!(verified.data, b"public notice");
}

#[test]
fn test_locked_signer_is_locked_error() {
    let pgp = pgp();
    let locked = pgp
        .lock_key(alice(), &Passphrase::new(b"secret".to_vec()))
        .unwrap();
    match pgp.sign().signing_keys(&locked).build() {
        Err(CoreError::LockedKey(msg)) => {
            assert_eq!(msg, "cannot sign message, signer key is not unlocked")
        }
        other => panic!("expected locked key, got {other:?}"),
    }
}

#[test]
fn test_expired_at_offset_time_retries_at_verify_time() {
    common::setup();
    let data = b"short-lived";
    let signature = expiring_signature(alice(), data, NOW, Duration::from_secs(HOUR as u64));
    let verifier = pgp().verify().verification_keys(alice()).build().unwrap();

    // The first attempt at NOW + 30min + offset sees an expired signature;
    // the retry at NOW + 30min succeeds.
    assert!(verifier.verify_detached(data, &signature, NOW + HOUR / 2).is_ok());
}

#[test]
fn test_expired_at_both_times_is_signature_expired() {
    let data = b"short-lived";
    let signature = expiring_signature(alice(), data, NOW, Duration::from_secs(HOUR as u64));
    let verifier = pgp().verify().verification_keys(alice()).build().unwrap();
    assert!(matches!(
        verifier.verify_detached(data, &signature, NOW + 2 * HOUR),
        Err(CoreError::SignatureExpired(_))
    ));
}

#[test]
fn test_zero_verify_time_never_fails_on_expiry() {
    let data = b"long expired";
    let signature = expiring_signature(alice(), data, NOW, Duration::from_secs(60));
    let verifier = pgp().verify().verification_keys(alice()).build().unwrap();
    assert!(verifier.verify_detached(data, &signature, 0).is_ok());

    // Time checks are off, the cryptographic check is not
    assert!(matches!(
        verifier.verify_detached(b"long expirer", &signature, 0),
        Err(CoreError::SignatureVerification(_))
    ));
}

#[test]
fn test_offset_tolerates_signer_clock_ahead() {
    let data = b"from the future";
    let signature = expiring_signature(alice(), data, NOW + HOUR, Duration::from_secs(10 * 24 * 3600));
    let verifier = pgp().verify().verification_keys(alice()).build().unwrap();
    assert!(verifier.verify_detached(data, &signature, NOW).is_ok());

    let strict = pgp()
        .verify()
        .verification_keys(alice())
        .creation_time_offset(0)
        .build()
        .unwrap();
    assert!(strict.verify_detached(data, &signature, NOW).is_err());
}

#[test]
fn test_verify_requires_keys() {
    assert!(matches!(
        pgp().verify().build(),
        Err(CoreError::Configuration(_))
    ));
    let empty = KeyRing::new();
    let verifier = pgp().verify().verification_keys(&empty).build().unwrap();
    let signature = pgp()
        .sign()
        .signing_keys(alice())
        .build()
        .unwrap()
        .sign_detached(b"x")
        .unwrap();
    assert!(verifier.verify_detached(b"x", &signature, NOW).is_err());
}
