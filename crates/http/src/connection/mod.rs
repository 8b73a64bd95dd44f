//! Buffered message I/O over any tokio transport.
//!
//! - [`MessageReader`]: owns the read buffer headers are parsed from and bodies are decoded
//!   out of; bytes past the end of one message stay buffered for the next
//! - [`MessageWriter`]: collects serialized headers and small bodies, bypassing the buffer
//!   for large writes and streaming bodies in fixed-size or chunked form
//!
//! Both take their buffer from a [`BufferPool`](crate::pool::BufferPool) when asked to and
//! return it on drop.

mod message_reader;
mod message_writer;

pub use message_reader::MessageReader;
pub use message_writer::MessageWriter;
