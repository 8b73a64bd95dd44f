//! Core HTTP message types.
//!
//! Everything here is built for reuse across many messages: values live in growable byte
//! buffers that `reset` clears without releasing, and derived views such as the parsed
//! [`Uri`] or the form [`Args`] of a request are only computed on first access.
//!
//! - **Collections** ([`kv`], [`args`]): ordered byte key/value lists and URL-encoded arguments
//! - **Headers** ([`header`]): [`RequestHeader`] and [`ResponseHeader`] with canonicalized
//!   field names, special-cased framing fields and cookies
//! - **URIs** ([`uri`]): absolute and relative request targets, path normalization
//! - **Messages** ([`Request`], [`Response`]): header plus [`MessageBody`], read from a
//!   [`MessageReader`](crate::connection::MessageReader) and written to a
//!   [`MessageWriter`](crate::connection::MessageWriter)
//! - **Bodies** ([`body`], [`compress`], [`multipart`]): buffered or streamed bodies,
//!   gzip/deflate transforms and `multipart/form-data` forms
//! - **Errors** ([`error`]): [`ParseError`] on the way in, [`SendError`] on the way out

pub mod args;
pub mod body;
pub mod compress;
pub mod date;
pub mod header;
pub mod kv;
pub mod multipart;
pub mod status;
pub mod uri;

pub(crate) mod deferred;

mod message;
pub use message::BodyLength;
pub use message::CONTENT_LENGTH_CHUNKED;
pub use message::CONTENT_LENGTH_IDENTITY;
pub use message::PayloadItem;

mod request;
pub use request::DEFAULT_MAX_IN_MEMORY_FILE_SIZE;
pub use request::Request;

mod response;
pub use response::Response;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub use args::Args;
pub use body::{BodyStream, MessageBody};
pub use compress::ContentCoding;
pub use header::{RequestHeader, ResponseHeader};
pub use kv::{KeyValue, KvList};
pub use multipart::{FilePart, MultipartCodec, MultipartForm};
pub use uri::Uri;
