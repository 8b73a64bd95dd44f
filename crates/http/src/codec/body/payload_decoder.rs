//! Decoder implementation for HTTP message payloads.
//!
//! This module provides a unified decoder for handling different types of HTTP message bodies:
//! - Content-Length based payloads
//! - Chunked transfer encoding
//! - Bodies running until the connection closes
//! - Messages with no body
//!
//! The decoder is chosen from the [`BodyLength`] the header resolved.

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::identity_decoder::IdentityDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{BodyLength, ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A unified decoder for handling HTTP message payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    /// The specific decoding strategy to use
    kind: Kind,
}

/// Enum representing different payload decoding strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// Decode payload until the peer closes the connection
    Identity(IdentityDecoder),

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    /// Creates a PayloadDecoder for messages with no body.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// Creates a PayloadDecoder for chunked transfer encoding.
    pub fn chunked(max_size: u64) -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::with_max_size(max_size)) }
    }

    /// Creates a PayloadDecoder for a fixed-length payload.
    ///
    /// # Arguments
    /// * `size` - The expected content length in bytes
    pub fn fix_length(size: u64) -> Self {
        if size == 0 {
            return Self::empty();
        }
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    /// Creates a PayloadDecoder reading until end of stream.
    pub fn identity(max_size: u64) -> Self {
        Self { kind: Kind::Identity(IdentityDecoder::new(max_size)) }
    }

    /// Picks the decoder for `length`, enforcing `max_size` (`0` for unlimited).
    ///
    /// A declared length above the limit fails before any body byte is read.
    pub fn from_body_length(length: BodyLength, max_size: u64) -> Result<Self, ParseError> {
        match length {
            BodyLength::Fixed(size) if max_size > 0 && size > max_size => {
                Err(ParseError::body_too_large(usize::try_from(max_size).unwrap_or(usize::MAX)))
            }
            BodyLength::Fixed(size) => Ok(Self::fix_length(size)),
            BodyLength::Chunked => Ok(Self::chunked(max_size)),
            BodyLength::Identity => Ok(Self::identity(max_size)),
        }
    }

    /// Returns whether this decoder handles chunked transfer encoding.
    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    /// Returns whether this decoder handles messages with no body.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }
}

/// Delegates to the appropriate decoder based on the payload type.
impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::Identity(identity_decoder) => identity_decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode_eof(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode_eof(src),
            Kind::Identity(identity_decoder) => identity_decoder.decode_eof(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_length() {
        assert!(PayloadDecoder::from_body_length(BodyLength::Fixed(0), 0).unwrap().is_empty());
        assert!(PayloadDecoder::from_body_length(BodyLength::Chunked, 0).unwrap().is_chunked());

        let result = PayloadDecoder::from_body_length(BodyLength::Fixed(11), 10);
        assert!(matches!(result, Err(ParseError::BodyTooLarge { max_size: 10 })));

        let mut decoder = PayloadDecoder::from_body_length(BodyLength::Fixed(10), 10).unwrap();
        let mut buffer = BytesMut::from(&b"0123456789"[..]);
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), 10);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_chunked_eof_too_early() {
        let mut decoder = PayloadDecoder::chunked(0);
        let mut buffer = BytesMut::from(&b"5\r\nab"[..]);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&chunk.as_bytes().unwrap()[..], b"ab");
        assert!(matches!(decoder.decode_eof(&mut buffer), Err(ParseError::UnexpectedEof { .. })));
    }
}
