// src/split.rs
//! Split messages — key packets, ciphertext and detached signature
//!
//! [`SplitWriter`] is the streaming sink side: up to three independent
//! writers. Without a key sink, key packets are written as a prefix of
//! the ciphertext (and of the encrypted signature, when there is one).
//! [`SplitMessage`] is the owned, in-memory counterpart.

use std::fmt;
use std::io::Write;

use crate::armor;
use crate::enums::ArmorKind;
use crate::error::Result;
use crate::packets;

/// Boxed byte sink handed to the packet writers.
pub type Sink<'a> = Box<dyn Write + Send + Sync + 'a>;

pub struct SplitWriter<'a> {
    pub(crate) keys: Option<Sink<'a>>,
    pub(crate) data: Sink<'a>,
    pub(crate) signature: Option<Sink<'a>>,
}

impl<'a> SplitWriter<'a> {
    /// All three channels.
    pub fn new(
        keys: impl Write + Send + Sync + 'a,
        data: impl Write + Send + Sync + 'a,
        signature: impl Write + Send + Sync + 'a,
    ) -> Self {
        Self {
            keys: Some(Box::new(keys)),
            data: Box::new(data),
            signature: Some(Box::new(signature)),
        }
    }

    /// Separate key packets, signature (if any) inline.
    pub fn key_and_data(
        keys: impl Write + Send + Sync + 'a,
        data: impl Write + Send + Sync + 'a,
    ) -> Self {
        Self {
            keys: Some(Box::new(keys)),
            data: Box::new(data),
            signature: None,
        }
    }

    /// Ciphertext and encrypted detached signature, each prefixed with
    /// the key packets.
    pub fn detached_signature(
        data: impl Write + Send + Sync + 'a,
        signature: impl Write + Send + Sync + 'a,
    ) -> Self {
        Self {
            keys: None,
            data: Box::new(data),
            signature: Some(Box::new(signature)),
        }
    }

    /// A single complete message.
    pub fn from_writer(data: impl Write + Send + Sync + 'a) -> Self {
        Self {
            keys: None,
            data: Box::new(data),
            signature: None,
        }
    }

    pub fn has_key_sink(&self) -> bool {
        self.keys.is_some()
    }

    pub fn has_signature_sink(&self) -> bool {
        self.signature.is_some()
    }
}

impl fmt::Debug for SplitWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitWriter")
            .field("keys", &self.keys.is_some())
            .field("signature", &self.signature.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitMessage {
    pub key_packets: Vec<u8>,
    pub data_packet: Vec<u8>,
    pub encrypted_signature: Option<Vec<u8>>,
}

impl SplitMessage {
    pub fn new(key_packets: Vec<u8>, data_packet: Vec<u8>) -> Self {
        Self {
            key_packets,
            data_packet,
            encrypted_signature: None,
        }
    }

    /// Splits a complete binary message at the end of its key packets.
    pub fn from_message(message: &[u8]) -> Result<Self> {
        let (key_packets, data_packet) = packets::split_message(message)?;
        Ok(Self::new(key_packets, data_packet))
    }

    /// Key packets followed by the data packet.
    pub fn to_message(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.key_packets.len() + self.data_packet.len());
        out.extend_from_slice(&self.key_packets);
        out.extend_from_slice(&self.data_packet);
        out
    }

    /// Key packets followed by the encrypted signature, if there is one.
    pub fn signature_message(&self) -> Option<Vec<u8>> {
        self.encrypted_signature.as_ref().map(|sig| {
            let mut out = self.key_packets.clone();
            out.extend_from_slice(sig);
            out
        })
    }

    pub fn armored(&self) -> Result<String> {
        armor::armor(&self.to_message(), ArmorKind::Message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_message_concatenates_parts() {
        let split = SplitMessage::new(vec![1, 2], vec![3, 4, 5]);
        assert_eq!(split.to_message(), vec![1, 2, 3, 4, 5]);
        assert_eq!(split.signature_message(), None);
    }

    #[test]
    fn test_constructors_pick_channels() {
        let (mut a, mut b, mut c) = (Vec::new(), Vec::new(), Vec::new());
        let w = SplitWriter::new(&mut a, &mut b, &mut c);
        assert!(w.has_key_sink() && w.has_signature_sink());
        drop(w);
        let w = SplitWriter::detached_signature(&mut a, &mut b);
        assert!(!w.has_key_sink() && w.has_signature_sink());
        drop(w);
        let w = SplitWriter::from_writer(&mut a);
        assert!(!w.has_key_sink() && !w.has_signature_sink());
    }
}
