// src/sign.rs
//! Signing without encryption — detached, text-detached and inline

use std::io::Write;

use sequoia_openpgp as openpgp;

use openpgp::crypto::KeyPair;
use openpgp::serialize::stream::{LiteralWriter, Message, Signer};
use openpgp::types::DataFormat;
use tracing::debug;

use crate::clock::Clock;
use crate::context::{signature_template, SigningContext};
use crate::error::{CoreError, EngineResultExt, Operation, Result};
use crate::keyring::KeyRing;
use crate::profile::Profile;
use crate::verify::trim_trailing_whitespace;

#[derive(Debug, Default)]
pub struct SignHandleBuilder<'k> {
    profile: Profile,
    keys: Option<&'k KeyRing>,
    context: Option<SigningContext>,
    clock: Clock,
}

impl<'k> SignHandleBuilder<'k> {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    pub fn signing_keys(mut self, keys: &'k KeyRing) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn signing_context(mut self, value: impl Into<String>, critical: bool) -> Self {
        self.context = Some(SigningContext::new(value, critical));
        self
    }

    pub fn utc_time(mut self, unix: i64) -> Self {
        self.clock = Clock::at_unix(unix);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Resolves the signing key; a locked key fails here.
    pub fn build(self) -> Result<SignHandle> {
        let keys = self
            .keys
            .ok_or_else(|| CoreError::Configuration("signing requires signing keys".into()))?;
        let keypair = keys.signing_keypair(self.clock.now())?;
        Ok(SignHandle {
            profile: self.profile,
            keypair,
            context: self.context,
            clock: self.clock,
        })
    }
}

pub struct SignHandle {
    profile: Profile,
    keypair: KeyPair,
    context: Option<SigningContext>,
    clock: Clock,
}

impl SignHandle {
    pub fn builder<'k>() -> SignHandleBuilder<'k> {
        SignHandleBuilder::default()
    }

    /// Binary detached signature over `data`.
    pub fn sign_detached(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.sign(data, false, true)
    }

    /// Text detached signature; with `trim`, trailing whitespace is removed
    /// from every line first.
    pub fn sign_text_detached(&self, text: &str, trim: bool) -> Result<Vec<u8>> {
        if trim {
            self.sign(trim_trailing_whitespace(text).as_bytes(), true, true)
        } else {
            self.sign(text.as_bytes(), true, true)
        }
    }

    /// Signed message with the data embedded in a literal packet.
    pub fn sign_inline(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.sign(data, false, false)
    }

    fn sign(&self, data: &[u8], text: bool, detached: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let template = signature_template(text, self.context.as_ref())?;
            let signer = Signer::with_template(Message::new(&mut out), self.keypair.clone(), template)
                .op(Operation::Sign)?
                .hash_algo(self.profile.sign_config().hash)
                .op(Operation::Sign)?
                .creation_time(self.clock.now());
            let mut message = if detached {
                signer.detached().build().op(Operation::Sign)?
            } else {
                let format = if text {
                    DataFormat::Unicode
                } else {
                    DataFormat::Binary
                };
                let message = signer.build().op(Operation::Sign)?;
                LiteralWriter::new(message)
                    .format(format)
                    .build()
                    .op(Operation::Serialize)?
            };
            message.write_all(data).op(Operation::Sign)?;
            message.finalize().op(Operation::Sign)?;
        }
        debug!(detached, text, len = out.len(), "signed");
        Ok(out)
    }
}

impl std::fmt::Debug for SignHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignHandle")
            .field("profile", &self.profile.name)
            .field("signer", &self.keypair.public().fingerprint())
            .finish_non_exhaustive()
    }
}
