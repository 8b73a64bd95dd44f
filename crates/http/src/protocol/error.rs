use crate::bytesconv::NumberError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Errors raised while reading or parsing a message.
///
/// "Need more data" is not an error: parsers report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("malformed first line: {reason}")]
    MalformedFirstLine { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid integer: {source}")]
    InvalidInteger {
        #[from]
        source: NumberError,
    },

    #[error("invalid chunk size: {reason}")]
    InvalidChunkSize { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("body size exceeds the given limit {max_size}")]
    BodyTooLarge { max_size: usize },

    #[error("unexpected eof while reading body, read {read} bytes")]
    UnexpectedEof { read: usize },

    /// The peer closed the connection before sending anything but blank lines.
    #[error("end of stream")]
    EndOfStream,

    #[error("request has no multipart/form-data Content-Type")]
    NoMultipartForm,

    #[error("multipart error: {reason}")]
    Multipart { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn malformed_first_line<S: ToString>(str: S) -> Self {
        Self::MalformedFirstLine { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_chunk_size<S: ToString>(str: S) -> Self {
        Self::InvalidChunkSize { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn body_too_large(max_size: usize) -> Self {
        Self::BodyTooLarge { max_size }
    }

    pub fn unexpected_eof(read: usize) -> Self {
        Self::UnexpectedEof { read }
    }

    pub fn multipart<S: ToString>(str: S) -> Self {
        Self::Multipart { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true for the clean end of a keep-alive connection.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Errors raised while writing a message.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("missing required Host header in request")]
    MissingHost,

    #[error("non-zero body for {method} request")]
    BodyNotAllowed { method: String },

    #[error("body stream ended early, wrote {written} of {expected} bytes")]
    ShortBodyStream { written: u64, expected: u64 },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("multipart error: {reason}")]
    Multipart { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn body_not_allowed(method: &[u8]) -> Self {
        Self::BodyNotAllowed { method: String::from_utf8_lossy(method).into_owned() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn multipart<S: ToString>(str: S) -> Self {
        Self::Multipart { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
