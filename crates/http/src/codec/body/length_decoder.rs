//! Fixed-length bodies, framed by `Content-Length`.
//!
//! See [RFC 7230 Section 3.3.2](https://tools.ietf.org/html/rfc7230#section-3.3.2).

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Hands out exactly `length` body bytes, as they arrive, then [`PayloadItem::Eof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
    decoded: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length, decoded: 0 }
    }

    /// Bytes still expected from the peer.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(self.remaining).map_or(src.len(), |remaining| remaining.min(src.len()));
        let bytes = src.split_to(len).freeze();

        self.remaining -= len as u64;
        self.decoded += len as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    /// The peer closed the connection: anything short of the declared length is an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::unexpected_eof(usize::try_from(self.decoded).unwrap_or(usize::MAX))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_at_length() {
        let mut buffer = BytesMut::from(&b"0123456789HTTP/1.1 200 OK\r\n"[..]);
        let mut decoder = LengthDecoder::new(10);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&chunk.as_bytes().unwrap()[..], b"0123456789");
        assert_eq!(&buffer[..], b"HTTP/1.1 200 OK\r\n");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_partial_input() {
        let mut decoder = LengthDecoder::new(6);

        let mut buffer = BytesMut::from(&b"abc"[..]);
        assert_eq!(&decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap()[..], b"abc");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"defg");
        assert_eq!(&decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap()[..], b"def");
        assert_eq!(&buffer[..], b"g");
    }

    #[test]
    fn test_short_body() {
        let mut buffer = BytesMut::from(&b"12345"[..]);
        let mut decoder = LengthDecoder::new(10);

        decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(decoder.remaining(), 5);

        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        let result = decoder.decode_eof(&mut buffer);
        assert!(matches!(result, Err(ParseError::UnexpectedEof { read: 5 })));
    }

    #[test]
    fn test_empty_body() {
        let mut buffer = BytesMut::from(&b"next"[..]);
        let mut decoder = LengthDecoder::new(0);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(&buffer[..], b"next");
    }
}
