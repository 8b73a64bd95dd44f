use crate::codec::body::PayloadDecoder;
use crate::config::Limits;
use crate::pool::{BufferPool, Pooled};
use crate::protocol::{BodyLength, ParseError, PayloadItem};
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;
use tracing::trace;

/// A buffered reader that messages are parsed from.
///
/// Bytes read past the end of one message stay buffered for the next, so a single reader
/// serves a whole keep-alive connection, pipelined messages included.
#[derive(Debug)]
pub struct MessageReader<R> {
    reader: R,
    buffer: Pooled<BytesMut>,
    limits: Limits,
    eof: bool,
}

impl<R> MessageReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, Limits::default())
    }

    pub fn with_limits(reader: R, limits: Limits) -> Self {
        let buffer = Pooled::detached(BytesMut::with_capacity(limits.read_buffer_size));
        Self { reader, buffer, limits, eof: false }
    }

    /// Creates a reader whose buffer is borrowed from `pool` and handed back on drop.
    pub fn with_pool(reader: R, limits: Limits, pool: &BufferPool) -> Self {
        let buffer = pool.acquire();
        Self { reader, buffer, limits, eof: false }
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The bytes read but not yet consumed.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops the first `n` buffered bytes.
    #[inline]
    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        let _ = self.buffer.split_to(n);
    }

    /// Returns true once the underlying reader reported end of stream.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads once from the underlying reader, returning the number of bytes added.
    ///
    /// `0` means end of stream.
    pub async fn fill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        self.buffer.reserve(self.limits.read_buffer_size);
        let n = self.reader.read_buf(&mut *self.buffer).await?;
        if n == 0 {
            trace!(buffered = self.buffer.len(), "reader reached end of stream");
            self.eof = true;
        }
        Ok(n)
    }

    /// Reads a body framed by `length` and appends it to `dst`.
    ///
    /// `max_size` bounds the decoded size, `0` means unlimited. A stream ending before the
    /// body does fails with [`ParseError::UnexpectedEof`], except for an identity body which
    /// ends exactly there.
    pub async fn read_body(&mut self, length: BodyLength, max_size: u64, dst: &mut BytesMut) -> Result<(), ParseError> {
        let mut decoder = PayloadDecoder::from_body_length(length, max_size)?;
        // a declared length is only a claim, the buffer grows as the bytes arrive
        if let Some(size) = length.fixed() {
            let hint = size.min(self.limits.read_buffer_size.max(self.buffer.len()) as u64);
            dst.reserve(usize::try_from(hint).unwrap_or(0));
        }

        let start = dst.len();
        loop {
            let item = if self.eof {
                decoder.decode_eof(&mut self.buffer)?
            } else {
                decoder.decode(&mut self.buffer)?
            };

            match item {
                Some(PayloadItem::Chunk(bytes)) => dst.extend_from_slice(&bytes),
                Some(PayloadItem::Eof) => {
                    trace!(body_size = dst.len() - start, "read body");
                    return Ok(());
                }
                None if self.eof => return Err(ParseError::unexpected_eof(dst.len() - start)),
                None => {
                    self.fill().await?;
                }
            }
        }
    }
}
