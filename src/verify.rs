// src/verify.rs
//! Signature verification — detached and inline
//!
//! Verification time semantics:
//! - `verify_time > 0`: the first attempt runs at `verify_time` plus the
//!   creation-time offset, tolerating signers whose clock runs ahead. If
//!   that attempt finds the signer but reports the signature expired, one
//!   retry runs at exactly `verify_time`.
//! - `verify_time == 0`: time checks are off. Verification runs at the
//!   current time and a signature that is only rejected for being out of
//!   its validity window is accepted once its cryptographic check against
//!   the identified key passes.

use std::io::Read;
use std::time::SystemTime;

use sequoia_openpgp as openpgp;

use openpgp::parse::stream::{
    DetachedVerifierBuilder, GoodChecksum, MessageLayer, MessageStructure, VerificationError,
    VerificationHelper, VerifierBuilder,
};
use openpgp::parse::Parse;
use openpgp::policy::Policy;
use openpgp::{Cert, Fingerprint, KeyHandle};
use tracing::{debug, info, warn};

use crate::clock::{self, Clock};
use crate::consts::CREATION_TIME_OFFSET_SECS;
use crate::context::VerificationContext;
use crate::enums::VerificationStatus;
use crate::error::{CoreError, EngineResultExt, Operation, Result, SignatureVerificationError};
use crate::keyring::{policy, KeyRing};

/// Outcome of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Good { signer: Fingerprint },
    /// Signer identified, signature outside its validity window.
    Expired { signer: Fingerprint, message: String },
    Rejected(SignatureVerificationError),
}

impl Verdict {
    /// Explicit-verify view: expired signatures are plain failures.
    pub(crate) fn into_explicit(self) -> (Option<Fingerprint>, Option<SignatureVerificationError>) {
        match self {
            Verdict::Good { signer } => (Some(signer), None),
            Verdict::Expired { signer, message } => (
                Some(signer),
                Some(SignatureVerificationError::new(
                    VerificationStatus::Failed,
                    message,
                )),
            ),
            Verdict::Rejected(err) => (None, Some(err)),
        }
    }
}

/// Collects the signature results of one message, for any of the engine's
/// streaming readers.
pub(crate) struct SignatureCheck<'v> {
    keys: Option<&'v KeyRing>,
    context: Option<&'v VerificationContext>,
    lenient: bool,
    verdict: Option<Verdict>,
}

impl<'v> SignatureCheck<'v> {
    pub(crate) fn new(
        keys: Option<&'v KeyRing>,
        context: Option<&'v VerificationContext>,
        lenient: bool,
    ) -> Self {
        Self {
            keys,
            context,
            lenient,
            verdict: None,
        }
    }

    pub(crate) fn certs(&self) -> Vec<Cert> {
        self.keys.map(|k| k.certs().to_vec()).unwrap_or_default()
    }

    /// Verdict of the last checked message; unsigned when no signature
    /// group was seen.
    pub(crate) fn into_verdict(self) -> Verdict {
        self.verdict.unwrap_or_else(|| {
            Verdict::Rejected(SignatureVerificationError::new(
                VerificationStatus::NotSigned,
                "message is not signed",
            ))
        })
    }

    fn check_context(&self, sig: &openpgp::packet::Signature) -> std::result::Result<(), String> {
        match self.context {
            Some(ctx) => ctx.check(sig).map_err(|e| e.message),
            None => Ok(()),
        }
    }

    pub(crate) fn record(&mut self, structure: MessageStructure<'_>) {
        let mut good = None;
        let mut expired = None;
        let mut failed = None;
        let mut seen = false;

        for layer in structure {
            let MessageLayer::SignatureGroup { results } = layer else {
                continue;
            };
            for result in results {
                seen = true;
                match result {
                    Ok(GoodChecksum { sig, ka }) => match self.check_context(sig) {
                        Ok(()) => good = Some(ka.key().fingerprint()),
                        Err(msg) => failed = Some(msg),
                    },
                    Err(VerificationError::MissingKey { .. }) => {}
                    Err(VerificationError::BadSignature { sig, ka, error }) => {
                        let out_of_window = matches!(
                            error.downcast_ref::<openpgp::Error>(),
                            Some(openpgp::Error::Expired(_)) | Some(openpgp::Error::NotYetLive(_))
                        );
                        let is_expired = matches!(
                            error.downcast_ref::<openpgp::Error>(),
                            Some(openpgp::Error::Expired(_))
                        );
                        if self.lenient && out_of_window {
                            let checked = sig
                                .verify_document(ka.key())
                                .and_then(|()| policy().signature(sig, Default::default()));
                            match checked.map_err(|e| e.to_string()).and_then(|()| self.check_context(sig)) {
                                Ok(()) => {
                                    debug!(signer = %ka.key().fingerprint(), "accepted signature outside its window");
                                    good = Some(ka.key().fingerprint());
                                }
                                Err(msg) => failed = Some(msg),
                            }
                        } else if is_expired {
                            expired = Some((ka.key().fingerprint(), error.to_string()));
                        } else {
                            failed = Some(error.to_string());
                        }
                    }
                    Err(e) => failed = Some(e.to_string()),
                }
            }
        }

        let verdict = if let Some(signer) = good {
            Verdict::Good { signer }
        } else if !seen {
            Verdict::Rejected(SignatureVerificationError::new(
                VerificationStatus::NotSigned,
                "message is not signed",
            ))
        } else if let Some((signer, message)) = expired {
            Verdict::Expired { signer, message }
        } else if let Some(message) = failed {
            Verdict::Rejected(SignatureVerificationError::new(
                VerificationStatus::Failed,
                message,
            ))
        } else {
            Verdict::Rejected(SignatureVerificationError::new(
                VerificationStatus::NoVerifier,
                "signer is empty",
            ))
        };
        debug!(?verdict, "signature verdict");
        self.verdict = Some(verdict);
    }
}

impl VerificationHelper for SignatureCheck<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(self.certs())
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        self.record(structure);
        Ok(())
    }
}

/// Runs `attempt` under the two-attempt protocol described at the top of
/// this module. `attempt` receives the verification time (`None` for the
/// current time) and whether out-of-window signatures are acceptable.
pub(crate) fn with_expiry_retry<T>(
    verify_time: i64,
    offset: i64,
    mut attempt: impl FnMut(Option<SystemTime>, bool) -> Result<(Verdict, T)>,
) -> Result<(Verdict, T)> {
    if verify_time == 0 {
        return attempt(None, true);
    }
    let first = attempt(Some(clock::from_unix(verify_time.saturating_add(offset))), false)?;
    match first.0 {
        Verdict::Expired { ref signer, .. } => {
            info!(%signer, verify_time, "signature expired at offset time, retrying");
            attempt(Some(clock::from_unix(verify_time)), false)
        }
        _ => Ok(first),
    }
}

/// Hard-failure view of a verdict, used by the plain verify paths.
pub(crate) fn require_good(verdict: Verdict) -> Result<Fingerprint> {
    match verdict {
        Verdict::Good { signer } => Ok(signer),
        Verdict::Expired { signer, message } => {
            warn!(%signer, "signature expired");
            Err(CoreError::SignatureExpired(message))
        }
        Verdict::Rejected(err) => Err(err.into()),
    }
}

pub(crate) fn detached_attempt(
    data: &[u8],
    signature: &[u8],
    keys: &KeyRing,
    context: Option<&VerificationContext>,
    time: Option<SystemTime>,
    lenient: bool,
) -> Result<(Verdict, ())> {
    let check = SignatureCheck::new(Some(keys), context, lenient);
    let mut verifier = DetachedVerifierBuilder::from_bytes(signature)
        .op(Operation::Verify)?
        .with_policy(policy(), time, check)
        .op(Operation::Verify)?;
    verifier.verify_bytes(data).op(Operation::Verify)?;
    Ok((verifier.into_helper().into_verdict(), ()))
}

fn inline_attempt(
    message: &[u8],
    keys: &KeyRing,
    context: Option<&VerificationContext>,
    time: Option<SystemTime>,
    lenient: bool,
) -> Result<(Verdict, Vec<u8>)> {
    let check = SignatureCheck::new(Some(keys), context, lenient);
    let mut verifier = VerifierBuilder::from_bytes(message)
        .op(Operation::Verify)?
        .with_policy(policy(), time, check)
        .op(Operation::Verify)?;
    let mut data = Vec::new();
    verifier.read_to_end(&mut data).op(Operation::Verify)?;
    Ok((verifier.into_helper().into_verdict(), data))
}

/// Removes trailing spaces and tabs from every line.
pub fn trim_trailing_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let (body, cr) = match line.strip_suffix('\r') {
            Some(body) => (body, "\r"),
            None => (line, ""),
        };
        out.push_str(body.trim_end_matches([' ', '\t']));
        out.push_str(cr);
    }
    out
}

/// Data plus the key that signed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedData {
    pub data: Vec<u8>,
    pub signer: Fingerprint,
}

#[derive(Debug, Default)]
pub struct VerifyHandleBuilder<'k> {
    keys: Option<&'k KeyRing>,
    context: Option<VerificationContext>,
    offset: Option<i64>,
    clock: Clock,
}

impl<'k> VerifyHandleBuilder<'k> {
    pub fn verification_keys(mut self, keys: &'k KeyRing) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn verification_context(mut self, value: impl Into<String>, required: bool) -> Self {
        self.context = Some(VerificationContext::new(value, required));
        self
    }

    /// Seconds added to the verification time on the first attempt.
    pub fn creation_time_offset(mut self, secs: i64) -> Self {
        self.offset = Some(secs);
        self
    }

    /// Clock used by [`VerifyHandle::verify_detached_now`].
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<VerifyHandle<'k>> {
        let keys = self.keys.ok_or_else(|| {
            CoreError::Configuration("verification requires verification keys".into())
        })?;
        Ok(VerifyHandle {
            keys,
            context: self.context,
            offset: self.offset.unwrap_or(CREATION_TIME_OFFSET_SECS),
            clock: self.clock,
        })
    }
}

#[derive(Debug)]
pub struct VerifyHandle<'k> {
    keys: &'k KeyRing,
    context: Option<VerificationContext>,
    offset: i64,
    clock: Clock,
}

impl<'k> VerifyHandle<'k> {
    pub fn builder() -> VerifyHandleBuilder<'k> {
        VerifyHandleBuilder::default()
    }

    /// Verifies a detached signature (binary or armored) over `data` at
    /// `verify_time` (Unix seconds, 0 disables expiry checks).
    pub fn verify_detached(&self, data: &[u8], signature: &[u8], verify_time: i64) -> Result<Fingerprint> {
        let (verdict, ()) = with_expiry_retry(verify_time, self.offset, |time, lenient| {
            detached_attempt(data, signature, self.keys, self.context.as_ref(), time, lenient)
        })?;
        require_good(verdict)
    }

    /// [`verify_detached`](Self::verify_detached) at the handle's clock.
    pub fn verify_detached_now(&self, data: &[u8], signature: &[u8]) -> Result<Fingerprint> {
        self.verify_detached(data, signature, self.clock.unix())
    }

    /// Like [`verify_detached`](Self::verify_detached) for text signatures;
    /// trailing whitespace is trimmed before verifying.
    pub fn verify_text_detached(&self, text: &str, signature: &[u8], verify_time: i64) -> Result<Fingerprint> {
        let text = trim_trailing_whitespace(text);
        self.verify_detached(text.as_bytes(), signature, verify_time)
    }

    /// Verifies a signed (not encrypted) message and returns its content.
    pub fn verify_inline(&self, message: &[u8], verify_time: i64) -> Result<VerifiedData> {
        let (verdict, data) = with_expiry_retry(verify_time, self.offset, |time, lenient| {
            inline_attempt(message, self.keys, self.context.as_ref(), time, lenient)
        })?;
        let signer = require_good(verdict)?;
        Ok(VerifiedData { data, signer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> Fingerprint {
        Fingerprint::from_bytes(4, &[0xAB; 20]).unwrap()
    }

    #[test]
    fn test_trim_trailing_whitespace_per_line() {
        assert_eq!(trim_trailing_whitespace("a  \nb\t\n c "), "a\nb\n c");
        assert_eq!(trim_trailing_whitespace("x \r\ny"), "x\r\ny");
    }

    #[test]
    fn test_zero_time_runs_single_lenient_attempt() {
        let mut calls = Vec::new();
        let (verdict, ()) = with_expiry_retry(0, 100, |time, lenient| {
            calls.push((time, lenient));
            Ok((Verdict::Good { signer: fp() }, ()))
        })
        .unwrap();
        assert_eq!(calls, vec![(None, true)]);
        assert!(matches!(verdict, Verdict::Good { .. }));
    }

    #[test]
    fn test_expired_with_signer_retries_without_offset() {
        let mut calls = Vec::new();
        let (verdict, ()) = with_expiry_retry(1_000, 50, |time, _| {
            calls.push(time);
            if calls.len() == 1 {
                Ok((
                    Verdict::Expired {
                        signer: fp(),
                        message: "expired".into(),
                    },
                    (),
                ))
            } else {
                Ok((Verdict::Good { signer: fp() }, ()))
            }
        })
        .unwrap();
        assert_eq!(
            calls,
            vec![Some(clock::from_unix(1_050)), Some(clock::from_unix(1_000))]
        );
        assert!(matches!(verdict, Verdict::Good { .. }));
    }

    #[test]
    fn test_rejection_is_not_retried() {
        let mut calls = 0;
        let (verdict, ()) = with_expiry_retry(1_000, 50, |_, _| {
            calls += 1;
            Ok((
                Verdict::Rejected(SignatureVerificationError::new(
                    VerificationStatus::NoVerifier,
                    "signer is empty",
                )),
                (),
            ))
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert!(matches!(require_good(verdict), Err(CoreError::SignatureVerification(_))));
    }

    #[test]
    fn test_persistent_expiry_is_signature_expired() {
        let verdict = Verdict::Expired {
            signer: fp(),
            message: "gone".into(),
        };
        assert!(matches!(require_good(verdict), Err(CoreError::SignatureExpired(_))));
    }
}
