//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module provides functionality to decode HTTP messages that use chunked transfer encoding
//! as specified in [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).
//!
//! Every chunk size is checked against the configured maximum body size before its data is
//! consumed, so an oversized body fails without being buffered.

use crate::bytesconv::{MAX_HEX_INT_CHARS, hex_value};
use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, Bytes, BytesMut};
use std::task::Poll;
use tokio_util::codec::Decoder;
use tracing::{error, trace};
use ChunkedState::*;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by optional extensions and CRLF
/// - Then the chunk data and CRLF
/// - A zero-sized chunk indicates the end of the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    size: ChunkSize,
    /// Sum of all chunk sizes seen so far
    total_size: u64,
    /// Chunk data handed out so far
    decoded: u64,
    /// `0` disables the limit
    max_size: u64,
}

/// Progress on the current chunk size line and data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ChunkSize {
    remaining: u64,
    digits: usize,
}

impl ChunkedDecoder {
    /// Creates a decoder without a body size limit.
    pub fn new() -> Self {
        Self::with_max_size(0)
    }

    /// Creates a decoder rejecting bodies larger than `max_size` bytes, `0` meaning unlimited.
    pub fn with_max_size(max_size: u64) -> Self {
        Self { state: Size, size: ChunkSize::default(), total_size: 0, decoded: 0, max_size }
    }

    fn check_size(&mut self) -> Result<(), ParseError> {
        self.total_size = self.total_size.saturating_add(self.size.remaining);
        if self.max_size > 0 && self.total_size > self.max_size {
            error!(total_size = self.total_size, max_size = self.max_size, "chunked body too large");
            return Err(ParseError::body_too_large(usize::try_from(self.max_size).unwrap_or(usize::MAX)));
        }
        Ok(())
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Skip trailer fields
    Trailer,
    /// Read LF after trailer
    TrailerLf,
    /// Read final CR
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when chunk data is available
    /// - `Ok(Some(PayloadItem::Eof))` when the final chunk is processed
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` if the chunked encoding is invalid or the body is too large
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!(total_size = self.total_size, "finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                // need more data
                return Ok(None);
            }

            let mut buf = None;

            let new_state = match self.state.step(src, &mut self.size, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if self.state == SizeLf {
                trace!(size = self.size.remaining, "read chunk size");
                self.check_size()?;
            }
            self.state = new_state;

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                self.decoded += bytes.len() as u64;
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }

    /// The peer closed the connection: a body without its terminating chunk is an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::unexpected_eof(usize::try_from(self.decoded).unwrap_or(usize::MAX))),
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.len() > 0 {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

impl ChunkedState {
    /// Processes the next step in the chunked decoding state machine.
    fn step(
        &self,
        src: &mut BytesMut,
        size: &mut ChunkSize,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, ParseError>> {
        match self {
            Size => ChunkedState::read_size(src, size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, size),
            Body => ChunkedState::read_body(src, size, buf),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src, size),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// Reads one hex digit of the chunk size, or the delimiter ending it.
    ///
    /// An empty size, a size longer than 15 hex digits or any other character is an error.
    fn read_size(src: &mut BytesMut, size: &mut ChunkSize) -> Poll<Result<ChunkedState, ParseError>> {
        let b = try_next_byte!(src);

        if let Some(digit) = hex_value(b) {
            if size.digits >= MAX_HEX_INT_CHARS {
                return Poll::Ready(Err(ParseError::invalid_chunk_size("too large chunk size")));
            }
            size.digits += 1;
            size.remaining = (size.remaining << 4) | u64::from(digit);
            return Poll::Ready(Ok(Size));
        }

        if size.digits == 0 {
            return Poll::Ready(Err(ParseError::invalid_chunk_size("empty chunk size")));
        }

        match b {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_size(format!("unexpected char {:?} in chunk size", char::from(b))))),
        }
    }

    /// Linear whitespace may follow the size, but no more digits.
    fn read_size_lws(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_size("invalid chunk size linear white space"))),
        }
    }

    /// Extensions are ignored up to the next CRLF. A bare LF inside them is rejected.
    fn read_extension(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_chunk_size("invalid chunk extension contains newline"))),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut BytesMut, size: &ChunkSize) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' if size.remaining == 0 => Poll::Ready(Ok(EndCr)),
            b'\n' => Poll::Ready(Ok(Body)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_size("missing LF after chunk size"))),
        }
    }

    /// Reads up to the remaining bytes of the current chunk.
    fn read_body(src: &mut BytesMut, size: &mut ChunkSize, buf: &mut Option<Bytes>) -> Poll<Result<ChunkedState, ParseError>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if size.remaining == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = usize::try_from(size.remaining).unwrap_or(usize::MAX);
        let read_size = std::cmp::min(remaining, src.len());

        size.remaining -= read_size as u64;
        *buf = Some(src.split_to(read_size).freeze());

        if size.remaining > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => Poll::Ready(Err(ParseError::invalid_body("cannot find crlf at the end of chunk"))),
        }
    }

    /// Completes a chunk and resets the size for the next one.
    fn read_body_lf(src: &mut BytesMut, size: &mut ChunkSize) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => {
                *size = ChunkSize::default();
                Poll::Ready(Ok(Size))
            }
            _ => Poll::Ready(Err(ParseError::invalid_body("cannot find crlf at the end of chunk"))),
        }
    }

    fn read_trailer(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid trailer end LF"))),
        }
    }

    /// A CR here ends the body, anything else starts a trailer line.
    fn read_end_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid chunk end LF"))),
        }
    }
}
