// tests/support.rs
//! Key fixtures — generated once per test binary
#![allow(dead_code)]

use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

use pgp_compose::openpgp;
use pgp_compose::{Clock, KeyRing, PgpHandle, SecurityLevel};

use openpgp::packet::signature::SignatureBuilder;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Message, Signer};
use openpgp::types::SignatureType;

/// Fixed "now" every fixture and handle runs at.
pub const NOW: i64 = 1_700_000_000;

pub fn pgp() -> PgpHandle {
    PgpHandle::new().with_clock(Clock::at_unix(NOW))
}

pub fn pgp_v6() -> PgpHandle {
    PgpHandle::crypto_refresh()
        .expect("builtin profile")
        .with_clock(Clock::at_unix(NOW))
}

fn generate(pgp: &PgpHandle, name: &str) -> KeyRing {
    pgp.generate_key(name, &format!("{}@example.org", name.to_lowercase()), SecurityLevel::Standard)
        .expect("key generation")
}

pub fn alice() -> &'static KeyRing {
    static KEY: OnceLock<KeyRing> = OnceLock::new();
    KEY.get_or_init(|| generate(&pgp(), "Alice"))
}

pub fn bob() -> &'static KeyRing {
    static KEY: OnceLock<KeyRing> = OnceLock::new();
    KEY.get_or_init(|| generate(&pgp(), "Bob"))
}

pub fn mallory() -> &'static KeyRing {
    static KEY: OnceLock<KeyRing> = OnceLock::new();
    KEY.get_or_init(|| generate(&pgp(), "Mallory"))
}

pub fn carol_v6() -> &'static KeyRing {
    static KEY: OnceLock<KeyRing> = OnceLock::new();
    KEY.get_or_init(|| generate(&pgp_v6(), "Carol"))
}

/// Detached binary signature by the first signing key of `keys`, created
/// at `created` and valid for `validity`.
pub fn expiring_signature(keys: &KeyRing, data: &[u8], created: i64, validity: Duration) -> Vec<u8> {
    let policy = StandardPolicy::new();
    let at = pgp_compose::clock::from_unix(created);
    let keypair = keys.certs()[0]
        .keys()
        .with_policy(&policy, at)
        .for_signing()
        .secret()
        .next()
        .expect("signing key")
        .key()
        .clone()
        .into_keypair()
        .expect("unlocked");
    let template = SignatureBuilder::new(SignatureType::Binary)
        .set_signature_validity_period(validity)
        .expect("validity");

    let mut out = Vec::new();
    let mut signer = Signer::with_template(Message::new(&mut out), keypair, template)
        .expect("signer")
        .creation_time(at)
        .detached()
        .build()
        .expect("build");
    signer.write_all(data).unwrap();
    signer.finalize().unwrap();
    out
}
