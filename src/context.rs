// src/context.rs
//! Signing contexts carried as signature notations
//!
//! A signer may bind a signature to an application context; a verifier may
//! insist on one. Both sides use the same notation name.

use sequoia_openpgp as openpgp;

use openpgp::packet::signature::SignatureBuilder;
use openpgp::packet::Signature;
use openpgp::types::SignatureType;

use crate::consts::SIGNING_CONTEXT_NOTATION;
use crate::enums::VerificationStatus;
use crate::error::{EngineResultExt, Operation, Result, SignatureVerificationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub value: String,
    /// Marks the notation critical, so verifiers unaware of contexts reject it.
    pub critical: bool,
}

impl SigningContext {
    pub fn new(value: impl Into<String>, critical: bool) -> Self {
        Self {
            value: value.into(),
            critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationContext {
    pub value: String,
    /// Reject signatures carrying no context at all.
    pub required: bool,
}

impl VerificationContext {
    pub fn new(value: impl Into<String>, required: bool) -> Self {
        Self {
            value: value.into(),
            required,
        }
    }

    pub(crate) fn check(&self, sig: &Signature) -> std::result::Result<(), SignatureVerificationError> {
        let mut values = sig.notation(SIGNING_CONTEXT_NOTATION).peekable();
        if values.peek().is_none() {
            return if self.required {
                Err(SignatureVerificationError::new(
                    VerificationStatus::Failed,
                    "signature has no signing context",
                ))
            } else {
                Ok(())
            };
        }
        if values.any(|v| v == self.value.as_bytes()) {
            Ok(())
        } else {
            Err(SignatureVerificationError::new(
                VerificationStatus::Failed,
                format!("signature context does not match '{}'", self.value),
            ))
        }
    }
}

/// Template for new signatures: text or binary, plus an optional context.
pub(crate) fn signature_template(
    text: bool,
    context: Option<&SigningContext>,
) -> Result<SignatureBuilder> {
    let typ = if text {
        SignatureType::Text
    } else {
        SignatureType::Binary
    };
    let builder = SignatureBuilder::new(typ);
    match context {
        Some(ctx) => builder
            .add_notation(SIGNING_CONTEXT_NOTATION, ctx.value.as_bytes(), None, ctx.critical)
            .op(Operation::Sign),
        None => Ok(builder),
    }
}
