//! Request and response header types.
//!
//! Frequently used fields live in dedicated buffers; every other field is kept in an ordered
//! [`KvList`](crate::protocol::KvList) in the order it was received or set. Wire parsing and
//! serialization are implemented in [`crate::codec`].

mod request_header;
mod response_header;

pub use request_header::RequestHeader;
pub(crate) use request_header::{append_request_cookies, parse_request_cookies};
pub use response_header::ResponseHeader;

use bytes::BytesMut;

pub(crate) const HOST: &[u8] = b"Host";
pub(crate) const CONTENT_TYPE: &[u8] = b"Content-Type";
pub(crate) const CONTENT_LENGTH: &[u8] = b"Content-Length";
pub(crate) const CONTENT_ENCODING: &[u8] = b"Content-Encoding";
pub(crate) const CONTENT_RANGE: &[u8] = b"Content-Range";
pub(crate) const TRANSFER_ENCODING: &[u8] = b"Transfer-Encoding";
pub(crate) const CONNECTION: &[u8] = b"Connection";
pub(crate) const USER_AGENT: &[u8] = b"User-Agent";
pub(crate) const SERVER: &[u8] = b"Server";
pub(crate) const COOKIE: &[u8] = b"Cookie";
pub(crate) const SET_COOKIE: &[u8] = b"Set-Cookie";
pub(crate) const DATE: &[u8] = b"Date";
pub(crate) const REFERER: &[u8] = b"Referer";
pub(crate) const EXPECT: &[u8] = b"Expect";
pub(crate) const RANGE: &[u8] = b"Range";
pub(crate) const LAST_MODIFIED: &[u8] = b"Last-Modified";
pub(crate) const ACCEPT_ENCODING: &[u8] = b"Accept-Encoding";
pub(crate) const VARY: &[u8] = b"Vary";

pub(crate) const CHUNKED: &[u8] = b"chunked";
pub(crate) const IDENTITY: &[u8] = b"identity";
pub(crate) const CLOSE: &[u8] = b"close";
pub(crate) const KEEP_ALIVE: &[u8] = b"keep-alive";
pub(crate) const UPGRADE: &[u8] = b"upgrade";
pub(crate) const HTTP11: &[u8] = b"HTTP/1.1";

/// `Server` value written when none is set.
pub const DEFAULT_SERVER_NAME: &[u8] = b"rapid-http";

/// `Content-Type` of responses that set none.
pub const DEFAULT_CONTENT_TYPE: &[u8] = b"text/plain; charset=utf-8";

/// `Content-Type` of requests carrying a body without one.
pub const FORM_CONTENT_TYPE: &[u8] = b"application/x-www-form-urlencoded";

/// Fields stored outside the generic field list.
///
/// Names are matched exactly against their canonical spelling, so with normalization
/// disabled a field spelled `content-length` is an ordinary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KnownField {
    Host,
    ContentType,
    UserAgent,
    Server,
    ContentLength,
    TransferEncoding,
    Connection,
    Cookie,
    SetCookie,
    Date,
    Other,
}

impl KnownField {
    pub(crate) fn from_name(name: &[u8]) -> Self {
        match name {
            HOST => Self::Host,
            CONTENT_TYPE => Self::ContentType,
            USER_AGENT => Self::UserAgent,
            SERVER => Self::Server,
            CONTENT_LENGTH => Self::ContentLength,
            TRANSFER_ENCODING => Self::TransferEncoding,
            CONNECTION => Self::Connection,
            COOKIE => Self::Cookie,
            SET_COOKIE => Self::SetCookie,
            DATE => Self::Date,
            _ => Self::Other,
        }
    }
}

/// Copies `key` into `buf`, canonicalized unless normalization is disabled.
pub(crate) fn header_key<'a>(buf: &'a mut BytesMut, key: &[u8], disable_normalizing: bool) -> &'a [u8] {
    buf.clear();
    buf.extend_from_slice(key);
    if !disable_normalizing {
        crate::bytesconv::normalize_header_key(buf);
    }
    buf
}

#[inline]
pub(crate) fn set_bytes(dst: &mut BytesMut, src: &[u8]) {
    dst.clear();
    dst.extend_from_slice(src);
}
