// src/encryption/pipeline.rs
//! Writer stacks behind [`PlaintextWriter`]
//!
//! Each [`PipelineKind`] maps to one of three fixed stacks (top first):
//!
//! - plain: literal → [compression] → encryption
//! - inline: literal → signer → [compression] → encryption
//! - detached: the plain stack on the data sink, plus
//!   detached signer → literal → [compression] → encryption on the
//!   signature sink; every write goes to both
//!
//! Finalizing a stack closes its layers top-down, so an inline signature is
//! emitted before the compression trailer, which precedes the encryption
//! trailer.

use std::fmt;
use std::io::{self, Write};
use std::time::SystemTime;

use sequoia_openpgp as openpgp;

use openpgp::crypto::KeyPair;
use openpgp::serialize::stream::{Compressor, Encryptor, LiteralWriter, Message, Signer};
use openpgp::types::{AEADAlgorithm, CompressionLevel, DataFormat, HashAlgorithm, SymmetricAlgorithm};
use tracing::debug;

use crate::clock;
use crate::context::{signature_template, SigningContext};
use crate::error::{EngineResultExt, Operation, Result};
use crate::profile::CompressionConfig;
use crate::split::Sink;

use super::LiteralMetadata;

/// How the message is put together, fixed when the handle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Session key to public keys, no signature.
    PlainEncrypt,
    /// Session key protected by a password, no signature.
    PasswordEncrypt,
    /// Caller-supplied session key, no key packets, no signature.
    SessionKeyEncrypt,
    EncryptAndSignInline,
    EncryptAndSignDetached,
}

impl PipelineKind {
    pub fn signs(self) -> bool {
        matches!(
            self,
            PipelineKind::EncryptAndSignInline | PipelineKind::EncryptAndSignDetached
        )
    }
}

/// Everything one stack needs; borrowed from the handle for a single call.
pub(crate) struct StackParams<'p> {
    pub cipher: SymmetricAlgorithm,
    pub aead: Option<AEADAlgorithm>,
    pub session_key: openpgp::crypto::SessionKey,
    pub compression: Option<CompressionConfig>,
    pub signer: Option<SignerParams<'p>>,
}

pub(crate) struct SignerParams<'p> {
    pub keypair: KeyPair,
    pub hash: HashAlgorithm,
    pub text: bool,
    pub context: Option<&'p SigningContext>,
    pub time: SystemTime,
}

enum Stack<'a> {
    Single(Message<'a>),
    Detached {
        data: Message<'a>,
        signature: Message<'a>,
    },
}

/// Plaintext side of an encryption pipeline.
///
/// Must be closed with [`close`](Self::close); dropping it unclosed leaves
/// the output truncated.
pub struct PlaintextWriter<'a> {
    kind: PipelineKind,
    stack: Stack<'a>,
}

impl<'a> PlaintextWriter<'a> {
    pub(crate) fn open(
        kind: PipelineKind,
        params: StackParams<'_>,
        data: Sink<'a>,
        signature: Option<Sink<'a>>,
        meta: &LiteralMetadata,
    ) -> Result<Self> {
        let stack = match (params.signer.as_ref(), signature) {
            (Some(signer), Some(signature)) => {
                let data_stack = {
                    let m = encrypted(data, &params)?;
                    let m = compressed(m, params.compression)?;
                    literal(m, meta)?
                };
                let sig_stack = {
                    let m = encrypted(signature, &params)?;
                    let m = compressed(m, params.compression)?;
                    let m = literal(m, &LiteralMetadata::default())?;
                    signing(m, signer, true)?
                };
                Stack::Detached {
                    data: data_stack,
                    signature: sig_stack,
                }
            }
            (Some(signer), None) => {
                let m = encrypted(data, &params)?;
                let m = compressed(m, params.compression)?;
                let m = signing(m, signer, false)?;
                Stack::Single(literal(m, meta)?)
            }
            (None, _) => {
                let m = encrypted(data, &params)?;
                let m = compressed(m, params.compression)?;
                Stack::Single(literal(m, meta)?)
            }
        };
        debug!(?kind, "opened encryption pipeline");
        Ok(Self { kind, stack })
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Finalizes every layer. For detached pipelines the ciphertext is
    /// finished first, then the signature is emitted and encrypted.
    pub fn close(self) -> Result<()> {
        match self.stack {
            Stack::Single(message) => message.finalize().op(Operation::Serialize)?,
            Stack::Detached { data, signature } => {
                data.finalize().op(Operation::Serialize)?;
                signature.finalize().op(Operation::Sign)?;
            }
        }
        debug!(kind = ?self.kind, "closed encryption pipeline");
        Ok(())
    }
}

impl Write for PlaintextWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stack {
            Stack::Single(message) => message.write(buf),
            Stack::Detached { data, signature } => {
                data.write_all(buf)?;
                signature.write_all(buf)?;
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stack {
            Stack::Single(message) => message.flush(),
            Stack::Detached { data, signature } => {
                data.flush()?;
                signature.flush()
            }
        }
    }
}

impl fmt::Debug for PlaintextWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaintextWriter")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// SEIPDv2 when an AEAD mode is set, SEIPDv1 otherwise. Key packets are
/// written separately, so this layer only emits the data packet.
fn encrypted<'a>(sink: Sink<'a>, params: &StackParams<'_>) -> Result<Message<'a>> {
    let encryptor =
        Encryptor::with_session_key(Message::new(sink), params.cipher, params.session_key.clone())
            .op(Operation::EncryptSessionKey)?;
    let encryptor = match params.aead {
        Some(aead) => encryptor.aead_algo(aead),
        None => encryptor,
    };
    encryptor.build().op(Operation::Encrypt)
}

fn compressed(inner: Message<'_>, config: Option<CompressionConfig>) -> Result<Message<'_>> {
    let Some(config) = config else {
        return Ok(inner);
    };
    let level = CompressionLevel::new(config.level).op(Operation::Compress)?;
    Compressor::new(inner)
        .algo(config.algorithm)
        .level(level)
        .build()
        .op(Operation::Compress)
}

fn signing<'a>(inner: Message<'a>, params: &SignerParams<'_>, detached: bool) -> Result<Message<'a>> {
    let template = signature_template(params.text, params.context)?;
    let signer = Signer::with_template(inner, params.keypair.clone(), template)
        .op(Operation::Sign)?
        .hash_algo(params.hash)
        .op(Operation::Sign)?
        .creation_time(params.time);
    let signer = if detached { signer.detached() } else { signer };
    signer.build().op(Operation::Sign)
}

fn literal<'a>(inner: Message<'a>, meta: &LiteralMetadata) -> Result<Message<'a>> {
    let format = if meta.utf8 {
        DataFormat::Unicode
    } else {
        DataFormat::Binary
    };
    let mut writer = LiteralWriter::new(inner).format(format);
    if !meta.filename.is_empty() {
        writer = writer.filename(&meta.filename).op(Operation::Serialize)?;
    }
    if meta.mod_time != 0 {
        writer = writer
            .date(clock::from_unix(meta.mod_time))
            .op(Operation::Serialize)?;
    }
    writer.build().op(Operation::Serialize)
}
