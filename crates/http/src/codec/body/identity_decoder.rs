//! Decoder for bodies delimited by the connection close.
//!
//! Responses without Content-Length or Transfer-Encoding carry everything the peer sends
//! until it shuts down its side of the connection.

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::error;

/// Yields every buffered byte as a chunk and finishes only at end of stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDecoder {
    read: u64,
    /// `0` disables the limit
    max_size: u64,
    eof: bool,
}

impl IdentityDecoder {
    pub fn new(max_size: u64) -> Self {
        Self { read: 0, max_size, eof: false }
    }
}

impl Decoder for IdentityDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.eof {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        self.read += src.len() as u64;
        if self.max_size > 0 && self.read > self.max_size {
            error!(read = self.read, max_size = self.max_size, "identity body too large");
            return Err(ParseError::body_too_large(usize::try_from(self.max_size).unwrap_or(usize::MAX)));
        }

        Ok(Some(PayloadItem::Chunk(src.split().freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        self.eof = true;
        Ok(Some(PayloadItem::Eof))
    }
}
