//! A buffer-reusing HTTP/1.1 message engine
//!
//! This crate parses and serializes HTTP/1.1 requests and responses on top of tokio. Every
//! message type owns growable byte buffers that are cleared, not freed, between messages, so a
//! connection that reuses its [`Request`](protocol::Request) and [`Response`](protocol::Response)
//! objects reaches a steady state without per-message heap allocation.
//!
//! # Features
//!
//! - Incremental header parsing that asks for more input instead of failing
//! - Deferred field parsing for `GET` and `HEAD` requests
//! - Header name canonicalization, which can be switched off per header
//! - Fixed-length, chunked and read-until-close bodies with size limits
//! - URI decomposition, path normalization and relative reference resolution
//! - URL-encoded arguments for query strings and form bodies
//! - Streamed bodies, gzip/deflate body transforms and `multipart/form-data` forms
//!
//! # Example
//!
//! ```
//! use rapid_http::connection::{MessageReader, MessageWriter};
//! use rapid_http::protocol::{Request, Response};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let input = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
//! let mut reader = MessageReader::new(&input[..]);
//! let mut writer = MessageWriter::new(Vec::new());
//!
//! let mut request = Request::new();
//! let mut response = Response::new();
//!
//! request.read(&mut reader).await.unwrap();
//! let name = request.uri().query_args().peek(b"name").unwrap_or(&b"nobody"[..]).to_vec();
//!
//! response.header_mut().set_content_type(b"text/plain");
//! response.set_body(b"Hello ");
//! response.append_body(&name);
//! response.write_to(&mut writer).await.unwrap();
//!
//! let out = writer.into_inner();
//! assert!(out.ends_with(b"Content-Length: 11\r\n\r\nHello world"));
//! # });
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`protocol`]: message types: headers, URIs, arguments, bodies and errors
//! - [`codec`]: wire format of headers and body framings
//! - [`connection`]: buffered reading and writing over a tokio transport
//! - [`pool`]: concurrent object pools for buffers shared between connections
//! - [`config`]: buffer sizes and message size limits
//! - [`bytesconv`]: integer, date and percent-encoding primitives
//!
//! # Error Handling
//!
//! - [`protocol::ParseError`]: a message could not be read
//! - [`protocol::SendError`]: a message could not be written
//! - [`protocol::HttpError`]: either of the above
//!
//! # Limitations
//!
//! - HTTP/1.1 only (HTTP/2 or HTTP/3 is not supported)
//! - No TLS, connection management or routing: callers own the transport

pub mod bytesconv;
pub mod codec;
pub mod config;
pub mod connection;
pub mod pool;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
