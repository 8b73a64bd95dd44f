//! Message bodies: an in-memory buffer or a stream written out when the message is sent.

use std::fmt;
use std::io::{self, Cursor};

use bytes::{BufMut, BytesMut};
use bytes::buf::Writer;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::pool::Pooled;

const DRAIN_CHUNK_SIZE: usize = 4096;

/// A body source read while the message is being written.
///
/// `size_hint` reports the exact number of bytes the stream yields when it is known up front.
/// Messages with a sized stream are sent with `Content-Length`, all others chunked.
pub trait BodyStream: AsyncRead + Send + Unpin {
    fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Releases the resources of the stream once it has been written or discarded.
    fn close(&mut self) {}
}

impl<T> BodyStream for Cursor<T>
where
    T: AsRef<[u8]> + Send + Unpin,
{
    fn size_hint(&self) -> Option<u64> {
        let len = self.get_ref().as_ref().len() as u64;
        Some(len.saturating_sub(self.position()))
    }
}

impl BodyStream for &'static [u8] {
    fn size_hint(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl<R> BodyStream for tokio::io::Take<R>
where
    R: AsyncRead + Send + Unpin,
{
    fn size_hint(&self) -> Option<u64> {
        Some(self.limit())
    }
}

impl<R> BodyStream for tokio::io::BufReader<R> where R: AsyncRead + Send + Unpin {}

impl BodyStream for tokio::fs::File {}

impl<S: BodyStream + ?Sized> BodyStream for Box<S> {
    fn size_hint(&self) -> Option<u64> {
        (**self).size_hint()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// The body of a request or response.
///
/// Holds either buffered bytes or a [`BodyStream`]; setting one discards the other.
#[derive(Default)]
pub struct MessageBody {
    buffer: Pooled<BytesMut>,
    stream: Option<Box<dyn BodyStream>>,
}

impl MessageBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a body whose buffer comes from `pool`.
    pub fn with_buffer(buffer: Pooled<BytesMut>) -> Self {
        Self { buffer, stream: None }
    }

    /// The buffered bytes. Empty while a stream is set.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Replaces the body with a copy of `body`.
    pub fn set(&mut self, body: &[u8]) {
        self.close_stream();
        self.buffer.clear();
        self.buffer.extend_from_slice(body);
    }

    pub fn append(&mut self, body: &[u8]) {
        self.close_stream();
        self.buffer.extend_from_slice(body);
    }

    /// An [`io::Write`] appending to the buffer.
    pub fn writer(&mut self) -> Writer<&mut BytesMut> {
        self.close_stream();
        (&mut *self.buffer).writer()
    }

    pub fn set_stream(&mut self, stream: Box<dyn BodyStream>) {
        self.close_stream();
        self.buffer.clear();
        self.stream = Some(stream);
    }

    #[inline]
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn take_stream(&mut self) -> Option<Box<dyn BodyStream>> {
        self.stream.take()
    }

    /// Reads the stream to its end into the buffer. Does nothing without a stream.
    pub async fn drain(&mut self) -> io::Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        let mut result = Ok(());
        loop {
            self.buffer.reserve(DRAIN_CHUNK_SIZE);
            match stream.read_buf(&mut *self.buffer).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        stream.close();
        trace!(len = self.buffer.len(), "drained body stream");
        result
    }

    /// Clears the buffer and closes the stream.
    pub fn reset(&mut self) {
        self.close_stream();
        self.buffer.clear();
    }

    fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }
}

impl Drop for MessageBody {
    fn drop(&mut self) {
        self.close_stream();
    }
}

impl fmt::Debug for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBody")
            .field("len", &self.buffer.len())
            .field("stream", &self.stream.as_ref().map(|stream| stream.size_hint()))
            .finish()
    }
}
