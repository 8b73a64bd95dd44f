use crate::codec::body::PayloadEncoder;
use crate::config::Limits;
use crate::pool::{BufferPool, Pooled};
use crate::protocol::{BodyStream, PayloadItem, SendError};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::{error, trace};

/// A buffered writer that messages are serialized into.
///
/// Headers and small bodies are gathered in the buffer and reach the transport in one write
/// on [`flush`](Self::flush). Bodies larger than the buffer bypass it.
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
    buffer: Pooled<BytesMut>,
    limits: Limits,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self::with_limits(writer, Limits::default())
    }

    pub fn with_limits(writer: W, limits: Limits) -> Self {
        let buffer = Pooled::detached(BytesMut::with_capacity(limits.write_buffer_size));
        Self { writer, buffer, limits }
    }

    /// Creates a writer whose buffer is borrowed from `pool` and handed back on drop.
    pub fn with_pool(writer: W, limits: Limits, pool: &BufferPool) -> Self {
        Self { writer, buffer: pool.acquire(), limits }
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Bytes written but not yet flushed.
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn clear_buf(&mut self) {
        self.buffer.clear();
    }

    /// Appends `bytes`, writing them straight through when they would not fit the buffer.
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        if self.buffer.len() + bytes.len() <= self.limits.write_buffer_size {
            self.buffer.extend_from_slice(bytes);
            return Ok(());
        }

        self.write_buffer().await?;
        self.writer.write_all(bytes).await?;
        Ok(())
    }

    /// Writes a body of `size` bytes read from `stream`, or a chunked body when the size is unknown.
    ///
    /// Fails with [`SendError::ShortBodyStream`] if the stream ends early. Bytes beyond `size`
    /// are never read.
    pub async fn write_body_stream<S>(&mut self, stream: &mut S, size: Option<u64>) -> Result<(), SendError>
    where
        S: BodyStream + ?Sized,
    {
        let result = match size {
            Some(size) => self.write_fixed_stream(stream, size).await,
            None => self.write_chunked_stream(stream).await,
        };
        stream.close();
        result
    }

    async fn write_fixed_stream<S>(&mut self, stream: &mut S, size: u64) -> Result<(), SendError>
    where
        S: BodyStream + ?Sized,
    {
        if size > self.limits.max_small_file_size as u64 {
            self.write_buffer().await?;
        }

        let mut encoder = PayloadEncoder::fix_length(size);
        let mut limited = AsyncReadExt::take(&mut *stream, size);
        let mut written = 0u64;
        let mut chunk = vec![0; self.limits.write_buffer_size.max(1)];
        loop {
            let n = limited.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            written += n as u64;
            encoder.encode(PayloadItem::Chunk(&chunk[..n]), &mut self.buffer)?;
            self.flush_if_full().await?;
        }

        if written < size {
            error!(written, expected = size, "body stream ended early");
            return Err(SendError::ShortBodyStream { written, expected: size });
        }
        encoder.encode(PayloadItem::<&[u8]>::Eof, &mut self.buffer)?;
        trace!(size, "wrote body stream");
        Ok(())
    }

    async fn write_chunked_stream<S>(&mut self, stream: &mut S) -> Result<(), SendError>
    where
        S: BodyStream + ?Sized,
    {
        let mut encoder = PayloadEncoder::chunked();
        let mut chunk = vec![0; self.limits.write_buffer_size.max(1)];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            encoder.encode(PayloadItem::Chunk(&chunk[..n]), &mut self.buffer)?;
            self.flush().await?;
        }
        encoder.encode(PayloadItem::<&[u8]>::Eof, &mut self.buffer)?;
        Ok(())
    }

    /// Writes out the buffer once it holds more than the configured buffer size.
    pub(crate) async fn flush_if_full(&mut self) -> Result<(), SendError> {
        if self.buffer.len() >= self.limits.write_buffer_size {
            self.write_buffer().await?;
        }
        Ok(())
    }

    async fn write_buffer(&mut self) -> Result<(), SendError> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Writes out everything buffered and flushes the transport.
    #[inline]
    pub async fn flush(&mut self) -> Result<(), SendError> {
        self.write_buffer().await?;
        Ok(self.writer.flush().await?)
    }
}
