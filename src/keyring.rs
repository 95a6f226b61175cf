// src/keyring.rs
//! Ordered keyrings over OpenPGP certificates
//!
//! The engine only ever reads keyrings: locking and unlocking return a new
//! ring, so a `KeyRing` can be shared freely between concurrent calls.

use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use sequoia_openpgp as openpgp;

use openpgp::cert::prelude::*;
use openpgp::crypto::KeyPair;
use openpgp::packet::key::{PublicParts, SecretParts, UnspecifiedRole};
use openpgp::packet::{Key, Packet};
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::{Marshal, Serialize};
use openpgp::KeyHandle;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::aliases::{engine_password, Passphrase};
use crate::consts::SIGNING_CONTEXT_NOTATION;
use crate::armor;
use crate::enums::{ArmorKind, SecurityLevel};
use crate::error::{CoreError, EngineResultExt, Operation, Result};
use crate::packets;
use crate::profile::Profile;
use crate::session_key::SessionKey;

const GOOD_CRITICAL_NOTATIONS: &[&str] = &[SIGNING_CONTEXT_NOTATION];

/// Policy every algorithm and binding check runs against. Signing-context
/// notations may be marked critical.
pub(crate) fn policy() -> &'static StandardPolicy<'static> {
    static POLICY: OnceLock<StandardPolicy<'static>> = OnceLock::new();
    POLICY.get_or_init(|| {
        let mut policy = StandardPolicy::new();
        policy.good_critical_notations(GOOD_CRITICAL_NOTATIONS);
        policy
    })
}

pub(crate) type PublicKey = Key<PublicParts, UnspecifiedRole>;
pub(crate) type SecretKey = Key<SecretParts, UnspecifiedRole>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRing {
    certs: Vec<Cert>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cert(cert: Cert) -> Self {
        Self { certs: vec![cert] }
    }

    pub fn from_certs(certs: impl IntoIterator<Item = Cert>) -> Self {
        Self {
            certs: certs.into_iter().collect(),
        }
    }

    /// Parses one or more certificates, binary or ASCII-armored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let certs = CertParser::from_bytes(bytes)
            .op(Operation::Parse)?
            .collect::<openpgp::Result<Vec<_>>>()
            .op(Operation::Parse)?;
        Ok(Self { certs })
    }

    /// Generates a general-purpose, non-expiring key according to `profile`
    /// and `level`.
    pub fn generate(
        name: &str,
        email: &str,
        profile: &Profile,
        level: SecurityLevel,
        creation_time: SystemTime,
    ) -> Result<Self> {
        let config = profile.key_generation_config(level);
        let userid = if name.is_empty() {
            email.to_owned()
        } else {
            format!("{name} <{email}>")
        };
        let (cert, _revocation) = CertBuilder::general_purpose(Some(userid))
            .set_profile(config.packet_profile())
            .op(Operation::GenerateKey)?
            .set_cipher_suite(config.cipher_suite())
            .set_creation_time(creation_time)
            .set_validity_period(None::<Duration>)
            .generate()
            .op(Operation::GenerateKey)?;
        info!(
            fingerprint = %cert.fingerprint(),
            algorithm = ?config.algorithm,
            "generated key"
        );
        Ok(Self::from_cert(cert))
    }

    pub fn add(&mut self, cert: Cert) {
        self.certs.push(cert);
    }

    pub fn certs(&self) -> &[Cert] {
        &self.certs
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Copy of the ring without any secret key material.
    pub fn to_public(&self) -> KeyRing {
        Self::from_certs(
            self.certs
                .iter()
                .map(|c| c.clone().strip_secret_key_material()),
        )
    }

    /// Binary serialization, secret material included when present.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for cert in &self.certs {
            Serialize::serialize(&cert.as_tsk(), &mut out).op(Operation::Serialize)?;
        }
        Ok(out)
    }

    pub fn armored(&self) -> Result<String> {
        let kind = if self.certs.iter().any(Cert::is_tsk) {
            ArmorKind::SecretKey
        } else {
            ArmorKind::PublicKey
        };
        armor::armor(&self.serialize()?, kind)
    }

    /// Recovers a session key from PKESK packets addressed to this ring.
    pub fn decrypt_session_key(&self, key_packets: &[u8]) -> Result<SessionKey> {
        packets::read_session_key(key_packets, Some(self), &[])
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.certs.iter().map(|c| c.fingerprint().to_hex()).collect()
    }

    /// SHA-256 over every public key packet body, primary first.
    pub fn sha256_fingerprints(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for cert in &self.certs {
            for ka in cert.keys() {
                let mut body = Vec::new();
                Marshal::serialize(ka.key(), &mut body).op(Operation::Serialize)?;
                out.push(hex::encode(Sha256::digest(&body)));
            }
        }
        Ok(out)
    }

    pub fn sha256_fingerprints_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.sha256_fingerprints()?)?)
    }

    /// True when every secret key in the ring is usable without a passphrase.
    pub fn is_unlocked(&self) -> bool {
        self.certs
            .iter()
            .flat_map(|c| c.keys().secret())
            .all(|ka| !ka.key().secret().is_encrypted())
    }

    /// Decrypts all locked secret keys with `passphrase`.
    pub fn unlock(&self, passphrase: &Passphrase) -> Result<KeyRing> {
        let password = engine_password(passphrase);
        let mut certs = Vec::with_capacity(self.certs.len());
        for cert in &self.certs {
            let mut packets: Vec<Packet> = Vec::new();
            for ka in cert.keys().secret() {
                if !ka.key().secret().is_encrypted() {
                    continue;
                }
                let key = ka
                    .key()
                    .clone()
                    .decrypt_secret(&password)
                    .op(Operation::UnlockKey)?;
                packets.push(secret_packet(key, ka.primary()));
            }
            let (cert, _) = cert
                .clone()
                .insert_packets(packets)
                .op(Operation::UnlockKey)?;
            certs.push(cert);
        }
        debug!(count = certs.len(), "unlocked keyring");
        Ok(Self { certs })
    }

    /// Encrypts all secret keys with `passphrase` using the profile's
    /// key-encryption parameters.
    pub fn lock(&self, passphrase: &Passphrase, profile: &Profile) -> Result<KeyRing> {
        let config = profile.key_encryption_config();
        let password = engine_password(passphrase);
        let mut certs = Vec::with_capacity(self.certs.len());
        let mut locked_any = false;
        for cert in &self.certs {
            let mut packets: Vec<Packet> = Vec::new();
            for ka in cert.keys().secret() {
                if ka.key().secret().is_encrypted() {
                    return Err(CoreError::engine(
                        Operation::LockKey,
                        anyhow::anyhow!("key {} is already locked", ka.key().fingerprint()),
                    ));
                }
                let (public, secret) = ka.key().clone().take_secret();
                let secret = secret
                    .encrypt_with(
                        &public,
                        config.s2k()?,
                        config.cipher,
                        config.aead.map(|a| a.algorithm),
                        &password,
                    )
                    .op(Operation::LockKey)?;
                let (key, _) = public.add_secret(secret);
                packets.push(secret_packet(key, ka.primary()));
                locked_any = true;
            }
            let (cert, _) = cert.clone().insert_packets(packets).op(Operation::LockKey)?;
            certs.push(cert);
        }
        if !locked_any {
            return Err(CoreError::engine(
                Operation::LockKey,
                anyhow::anyhow!("keyring holds no secret keys"),
            ));
        }
        Ok(Self { certs })
    }

    /// First usable signing key of the ring.
    ///
    /// Locked keys are a configuration-time failure, reported before any
    /// stream is opened.
    pub(crate) fn signing_keypair(&self, time: SystemTime) -> Result<KeyPair> {
        let mut saw_locked = false;
        for cert in &self.certs {
            let Ok(valid) = cert.with_policy(policy(), time) else {
                continue;
            };
            for ka in valid
                .keys()
                .supported()
                .alive()
                .revoked(false)
                .for_signing()
                .secret()
            {
                if ka.key().secret().is_encrypted() {
                    saw_locked = true;
                    continue;
                }
                return ka.key().clone().into_keypair().op(Operation::Sign);
            }
        }
        if saw_locked {
            Err(CoreError::LockedKey(
                "cannot sign message, signer key is not unlocked".into(),
            ))
        } else {
            Err(CoreError::Configuration(
                "signing keyring has no usable signing key".into(),
            ))
        }
    }

    /// One transport-encryption key per certificate, valid at `time`.
    pub(crate) fn encryption_keys(&self, time: SystemTime) -> Result<Vec<PublicKey>> {
        let mut keys = Vec::new();
        for cert in &self.certs {
            let valid = cert
                .with_policy(policy(), time)
                .op(Operation::EncryptAsymmetric)?;
            let before = keys.len();
            keys.extend(
                valid
                    .keys()
                    .supported()
                    .alive()
                    .revoked(false)
                    .for_transport_encryption()
                    .map(|ka| ka.key().clone()),
            );
            if keys.len() == before {
                return Err(CoreError::engine(
                    Operation::EncryptAsymmetric,
                    anyhow::anyhow!("no valid encryption key in {}", cert.fingerprint()),
                ));
            }
        }
        Ok(keys)
    }

    /// Secret keys that may open a PKESK addressed to `recipient`.
    /// A wildcard recipient (hidden) matches every key.
    pub(crate) fn decryption_candidates(&self, recipient: Option<&KeyHandle>) -> Vec<SecretKey> {
        self.certs
            .iter()
            .flat_map(|c| c.keys().secret())
            .filter(|ka| recipient.map_or(true, |r| r.aliases(ka.key().key_handle())))
            .map(|ka| ka.key().clone())
            .collect()
    }

    /// Certificate holding a key that matches `handle`.
    pub(crate) fn find_cert(&self, handle: &KeyHandle) -> Option<&Cert> {
        self.certs
            .iter()
            .find(|c| c.keys().any(|ka| handle.aliases(ka.key().key_handle())))
    }
}

fn secret_packet(key: SecretKey, primary: bool) -> Packet {
    if primary {
        key.role_into_primary().into()
    } else {
        key.role_into_subordinate().into()
    }
}
