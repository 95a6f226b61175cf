// src/decryption.rs
//! Decryption with explicit verification
//!
//! Decrypting and verifying fail independently. A message that decrypts
//! always yields its plaintext; a signature problem is reported next to it
//! as [`SignatureVerificationError`] data. Only decryption problems (no
//! usable key, wrong password, corrupt packets) are hard errors.

use std::io::Read;

use sequoia_openpgp as openpgp;

use openpgp::crypto::SessionKey as EngineSessionKey;
use openpgp::packet::{Literal, PKESK, SKESK};
use openpgp::parse::stream::{
    DecryptionHelper, DecryptorBuilder, MessageStructure, VerificationHelper,
};
use openpgp::parse::{PacketParser, Parse};
use openpgp::types::{DataFormat, SymmetricAlgorithm};
use openpgp::{Cert, Fingerprint, KeyHandle, Packet};
use tracing::{debug, trace};

use crate::aliases::{engine_password, Passphrase, PlainText};
use crate::clock::{self, Clock};
use crate::context::VerificationContext;
use crate::encryption::LiteralMetadata;
use crate::enums::VerificationStatus;
use crate::error::{CoreError, Operation, Result, SignatureVerificationError};
use crate::keyring::{policy, KeyRing};
use crate::packets;
use crate::session_key::SessionKey;
use crate::split::SplitMessage;
use crate::verify::{detached_attempt, SignatureCheck, Verdict};

/// Plaintext plus the outcome of signature verification.
///
/// `signature_error` is `None` when the signature verified, or when no
/// verification keys were configured.
#[derive(Debug)]
pub struct ExplicitVerifyMessage {
    pub plaintext: PlainText,
    pub metadata: LiteralMetadata,
    pub signature_error: Option<SignatureVerificationError>,
    pub signer: Option<Fingerprint>,
}

impl ExplicitVerifyMessage {
    pub fn plaintext(&self) -> &[u8] {
        self.plaintext.expose_secret()
    }

    pub fn into_plaintext(self) -> Vec<u8> {
        *self.plaintext.into_inner()
    }

    pub fn signature_error(&self) -> Option<&SignatureVerificationError> {
        self.signature_error.as_ref()
    }

    /// True when a signer was identified and its signature verified.
    pub fn is_verified(&self) -> bool {
        self.signer.is_some() && self.signature_error.is_none()
    }

    /// Plaintext, or the verification error as a hard failure.
    pub fn into_verified(self) -> Result<Vec<u8>> {
        match self.signature_error {
            Some(err) => Err(err.into()),
            None => Ok(*self.plaintext.into_inner()),
        }
    }
}

/// Everything a data packet may be opened with.
#[derive(Default)]
pub(crate) struct KeySources<'s> {
    pub keyring: Option<&'s KeyRing>,
    pub passwords: Vec<&'s Passphrase>,
    pub session_keys: Vec<&'s SessionKey>,
}

/// Keys and time for verifying an embedded signature.
pub(crate) struct Verification<'v> {
    pub keys: &'v KeyRing,
    /// Unix seconds, 0 disables time checks.
    pub time: i64,
    pub context: Option<&'v VerificationContext>,
}

struct Helper<'s, 'v> {
    sources: &'s KeySources<'s>,
    check: SignatureCheck<'v>,
    saw_locked: bool,
    metadata: LiteralMetadata,
}

impl VerificationHelper for Helper<'_, '_> {
    fn inspect(&mut self, pp: &PacketParser) -> openpgp::Result<()> {
        if let Packet::Literal(literal) = &pp.packet {
            self.metadata = literal_metadata(literal);
        }
        Ok(())
    }

    fn get_certs(&mut self, _ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(self.check.certs())
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        self.check.record(structure);
        Ok(())
    }
}

impl DecryptionHelper for Helper<'_, '_> {
    fn decrypt(
        &mut self,
        pkesks: &[PKESK],
        skesks: &[SKESK],
        sym_algo: Option<SymmetricAlgorithm>,
        decrypt: &mut dyn FnMut(Option<SymmetricAlgorithm>, &EngineSessionKey) -> bool,
    ) -> openpgp::Result<Option<Cert>> {
        for sk in &self.sources.session_keys {
            let algo = if sk.is_v6() {
                sk.algorithm().or(sym_algo)
            } else {
                Some(sk.cipher()?)
            };
            if decrypt(algo, &sk.engine_key()?) {
                trace!("opened data packet with a session key");
                return Ok(None);
            }
        }

        if let Some(ring) = self.sources.keyring {
            for pkesk in pkesks {
                for key in ring.decryption_candidates(pkesk.recipient().as_ref()) {
                    if key.secret().is_encrypted() {
                        self.saw_locked = true;
                        continue;
                    }
                    let handle = key.key_handle();
                    let Ok(mut keypair) = key.into_keypair() else {
                        continue;
                    };
                    if let Some((algo, engine_key)) = pkesk.decrypt(&mut keypair, sym_algo) {
                        if decrypt(algo, &engine_key) {
                            trace!(%handle, "opened data packet with a private key");
                            return Ok(ring.find_cert(&handle).cloned());
                        }
                    }
                }
            }
        }

        for skesk in skesks {
            for password in &self.sources.passwords {
                if let Ok((algo, engine_key)) = skesk.decrypt(&engine_password(password)) {
                    if decrypt(algo, &engine_key) {
                        trace!("opened data packet with a password");
                        return Ok(None);
                    }
                }
            }
        }

        if self.saw_locked {
            return Err(CoreError::LockedKey(
                "cannot decrypt message, private key is not unlocked".into(),
            )
            .into());
        }
        Ok(None)
    }
}

#[allow(deprecated)]
fn literal_metadata(literal: &Literal) -> LiteralMetadata {
    LiteralMetadata {
        filename: literal
            .filename()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .unwrap_or_default(),
        utf8: matches!(literal.format(), DataFormat::Unicode | DataFormat::Text),
        mod_time: literal.date().map(clock::to_unix).unwrap_or(0),
    }
}

/// Hard decryption failures keep our own error kinds (a locked key), the
/// rest become engine errors.
fn decrypt_failure(err: anyhow::Error) -> CoreError {
    match err.downcast::<CoreError>() {
        Ok(core) => core,
        Err(err) => CoreError::engine(Operation::Decrypt, err),
    }
}

/// Decrypts one complete message (or a bare data packet when a session key
/// is among the sources) and optionally verifies its embedded signature.
pub(crate) fn decrypt_message(
    input: &[u8],
    sources: &KeySources<'_>,
    verification: Option<Verification<'_>>,
) -> Result<ExplicitVerifyMessage> {
    let (keys, time, context) = match &verification {
        Some(v) => (Some(v.keys), v.time, v.context),
        None => (None, 0, None),
    };
    let helper = Helper {
        sources,
        check: SignatureCheck::new(keys, context, time == 0),
        saw_locked: false,
        metadata: LiteralMetadata::default(),
    };
    let at = (time != 0).then(|| clock::from_unix(time));

    let mut decryptor = DecryptorBuilder::from_bytes(input)
        .map_err(decrypt_failure)?
        .with_policy(policy(), at, helper)
        .map_err(decrypt_failure)?;
    let mut plaintext = Vec::new();
    decryptor
        .read_to_end(&mut plaintext)
        .map_err(|e| CoreError::engine(Operation::Decrypt, e))?;
    let helper = decryptor.into_helper();

    let (signer, signature_error) = if verification.is_some() {
        helper.check.into_verdict().into_explicit()
    } else {
        (None, None)
    };
    debug!(
        len = plaintext.len(),
        verified = signature_error.is_none() && signer.is_some(),
        "decrypted message"
    );
    Ok(ExplicitVerifyMessage {
        plaintext: PlainText::new(plaintext),
        metadata: helper.metadata,
        signature_error,
        signer,
    })
}

#[derive(Debug, Default)]
pub struct DecryptionHandleBuilder<'k> {
    decryption_keys: Option<&'k KeyRing>,
    passwords: Vec<Passphrase>,
    session_keys: Vec<&'k SessionKey>,
    verification_keys: Option<&'k KeyRing>,
    verify_time: Option<i64>,
    context: Option<VerificationContext>,
    clock: Clock,
}

impl<'k> DecryptionHandleBuilder<'k> {
    pub fn decryption_keys(mut self, keys: &'k KeyRing) -> Self {
        self.decryption_keys = Some(keys);
        self
    }

    /// May be called repeatedly; each password is tried in turn.
    pub fn password(mut self, password: Passphrase) -> Self {
        self.passwords.push(password);
        self
    }

    pub fn session_key(mut self, key: &'k SessionKey) -> Self {
        self.session_keys.push(key);
        self
    }

    pub fn verification_keys(mut self, keys: &'k KeyRing) -> Self {
        self.verification_keys = Some(keys);
        self
    }

    /// Unix seconds; 0 disables time checks. Defaults to the clock's time.
    pub fn verify_time(mut self, unix: i64) -> Self {
        self.verify_time = Some(unix);
        self
    }

    pub fn verification_context(mut self, value: impl Into<String>, required: bool) -> Self {
        self.context = Some(VerificationContext::new(value, required));
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<DecryptionHandle<'k>> {
        if self.decryption_keys.is_none() && self.passwords.is_empty() && self.session_keys.is_empty() {
            return Err(CoreError::Configuration(
                "no key material to decrypt with".into(),
            ));
        }
        let verify_time = self.verify_time.unwrap_or_else(|| self.clock.unix());
        Ok(DecryptionHandle {
            decryption_keys: self.decryption_keys,
            passwords: self.passwords,
            session_keys: self.session_keys,
            verification_keys: self.verification_keys,
            verify_time,
            context: self.context,
        })
    }
}

#[derive(Debug)]
pub struct DecryptionHandle<'k> {
    decryption_keys: Option<&'k KeyRing>,
    passwords: Vec<Passphrase>,
    session_keys: Vec<&'k SessionKey>,
    verification_keys: Option<&'k KeyRing>,
    verify_time: i64,
    context: Option<VerificationContext>,
}

impl<'k> DecryptionHandle<'k> {
    pub fn builder() -> DecryptionHandleBuilder<'k> {
        DecryptionHandleBuilder::default()
    }

    fn sources(&self) -> KeySources<'_> {
        KeySources {
            keyring: self.decryption_keys,
            passwords: self.passwords.iter().collect(),
            session_keys: self.session_keys.clone(),
        }
    }

    fn verification(&self) -> Option<Verification<'_>> {
        self.verification_keys.map(|keys| Verification {
            keys,
            time: self.verify_time,
            context: self.context.as_ref(),
        })
    }

    /// Decrypts a complete message and verifies any embedded signature.
    pub fn decrypt(&self, message: &[u8]) -> Result<ExplicitVerifyMessage> {
        decrypt_message(message, &self.sources(), self.verification())
    }

    /// Decrypts a split message; a detached signature, when present, is
    /// decrypted and verified against the recovered plaintext.
    pub fn decrypt_split(&self, split: &SplitMessage) -> Result<ExplicitVerifyMessage> {
        match split.signature_message() {
            Some(signature) => self.decrypt_detached(&split.to_message(), &signature),
            None => self.decrypt(&split.to_message()),
        }
    }

    /// Decrypts `message` and `encrypted_signature` (both complete
    /// messages) and verifies the signature over the plaintext.
    pub fn decrypt_detached(
        &self,
        message: &[u8],
        encrypted_signature: &[u8],
    ) -> Result<ExplicitVerifyMessage> {
        let sources = self.sources();
        let mut out = decrypt_message(message, &sources, None)?;
        let Some(verification) = self.verification() else {
            return Ok(out);
        };
        let signature = decrypt_message(encrypted_signature, &sources, None)?;
        let at = (verification.time != 0).then(|| clock::from_unix(verification.time));
        let verdict = match detached_attempt(
            out.plaintext(),
            signature.plaintext(),
            verification.keys,
            verification.context,
            at,
            verification.time == 0,
        ) {
            Ok((verdict, ())) => verdict,
            Err(err) => Verdict::Rejected(SignatureVerificationError::new(
                VerificationStatus::Failed,
                err.to_string(),
            )),
        };
        let (signer, signature_error) = verdict.into_explicit();
        out.signer = signer;
        out.signature_error = signature_error;
        Ok(out)
    }

    /// Recovers the session key from key packets.
    pub fn decrypt_session_key(&self, key_packets: &[u8]) -> Result<SessionKey> {
        packets::read_session_key(key_packets, self.decryption_keys, &self.passwords)
    }

    /// Decrypts and requires a good signature.
    pub fn decrypt_verified(&self, message: &[u8]) -> Result<Vec<u8>> {
        if self.verification_keys.is_none() {
            return Err(CoreError::Configuration(
                "verified decryption requires verification keys".into(),
            ));
        }
        self.decrypt(message)?.into_verified()
    }
}
