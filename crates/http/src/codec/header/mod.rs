//! Wire format of request and response headers
//!
//! This module implements parsing and serialization for [`RequestHeader`](crate::protocol::RequestHeader)
//! and [`ResponseHeader`](crate::protocol::ResponseHeader) as inherent methods on those types:
//!
//! - `parse`: resumable parsing from a byte slice, `Ok(None)` asks for more input
//! - `read`: parsing from a [`MessageReader`](crate::connection::MessageReader), enforcing the header size limit
//! - `append_bytes` / `write_to`: serialization, also available through `Display`
//!
//! # Features
//!
//! - CRLF and bare LF line endings
//! - Header name canonicalization, e.g. `content-type` becomes `Content-Type`
//! - Deferred field parsing for `GET` and `HEAD` requests
//! - `Content-Length`, `Transfer-Encoding` and `Connection` resolution into body framing

mod header_decoder;
mod header_encoder;

pub(crate) use header_decoder::peek_raw_header;
