use super::{
    CHUNKED, CLOSE, CONNECTION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, DEFAULT_CONTENT_TYPE, IDENTITY,
    KEEP_ALIVE, KnownField, LAST_MODIFIED, SERVER, SET_COOKIE, TRANSFER_ENCODING, UPGRADE, header_key, set_bytes,
};
use crate::bytesconv::{append_http_date, append_uint, has_token_ignore_case, parse_uint};
use crate::protocol::kv::KvList;
use crate::protocol::{CONTENT_LENGTH_CHUNKED, CONTENT_LENGTH_IDENTITY};
use bytes::{BufMut, BytesMut};
use http::StatusCode;
use std::mem;
use std::time::SystemTime;

/// Header of an HTTP response.
///
/// ```
/// use rapid_http::protocol::ResponseHeader;
///
/// let mut header = ResponseHeader::new();
/// header.set_status_code(204);
/// header.set_content_length(10);
///
/// // 204 responses never carry a body
/// assert_eq!(header.content_length(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseHeader {
    pub(crate) disable_normalizing: bool,
    pub(crate) no_http11: bool,
    pub(crate) connection_close: bool,

    /// `0` stands for 200
    pub(crate) status_code: u16,

    /// `-1` for chunked, `-2` for a body running until the connection closes
    pub(crate) content_length: i64,
    pub(crate) content_length_bytes: BytesMut,

    pub(crate) content_type: BytesMut,
    pub(crate) server: BytesMut,

    pub(crate) h: KvList,
    /// `Set-Cookie` values keyed by cookie name
    pub(crate) cookies: KvList,

    pub(crate) key_buf: BytesMut,
    scratch: BytesMut,
}

impl ResponseHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps field names exactly as received or set instead of canonicalizing them.
    pub fn disable_normalizing(&mut self) {
        self.disable_normalizing = true;
    }

    /// The status code, `200` when unset.
    pub fn status_code(&self) -> u16 {
        if self.status_code == 0 { StatusCode::OK.as_u16() } else { self.status_code }
    }

    pub fn set_status_code(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    /// Returns false if the status line named another protocol version.
    pub fn is_http11(&self) -> bool {
        !self.no_http11
    }

    /// Informational, `204 No Content` and `304 Not Modified` responses have no body.
    pub fn must_skip_content_length(&self) -> bool {
        let status_code = self.status_code();
        if status_code < 100 || status_code == StatusCode::OK.as_u16() {
            return false;
        }
        status_code == StatusCode::NOT_MODIFIED.as_u16()
            || status_code == StatusCode::NO_CONTENT.as_u16()
            || status_code < 200
    }

    /// The `Content-Type`, defaulting to `text/plain; charset=utf-8`.
    pub fn content_type(&self) -> &[u8] {
        if self.content_type.is_empty() { DEFAULT_CONTENT_TYPE } else { &self.content_type }
    }

    pub fn set_content_type(&mut self, content_type: &[u8]) {
        set_bytes(&mut self.content_type, content_type);
    }

    pub fn server(&self) -> &[u8] {
        &self.server
    }

    pub fn set_server(&mut self, server: &[u8]) {
        set_bytes(&mut self.server, server);
    }

    /// The body length: `-1` for chunked, `-2` until the connection closes,
    /// always `0` when the status forbids a body.
    pub fn content_length(&self) -> i64 {
        if self.must_skip_content_length() { 0 } else { self.content_length }
    }

    /// Sets the body length. `-1` selects chunked encoding, any other negative value a body
    /// delimited by closing the connection.
    ///
    /// Ignored for statuses that must not carry a body.
    pub fn set_content_length(&mut self, content_length: i64) {
        if self.must_skip_content_length() {
            return;
        }
        self.content_length_bytes.clear();
        match u64::try_from(content_length) {
            Ok(len) => {
                self.content_length = content_length;
                append_uint(&mut self.content_length_bytes, len);
                self.h.delete_all(TRANSFER_ENCODING);
            }
            Err(_) if content_length == CONTENT_LENGTH_CHUNKED => {
                self.content_length = CONTENT_LENGTH_CHUNKED;
                self.h.set(TRANSFER_ENCODING, CHUNKED);
            }
            Err(_) => {
                self.content_length = CONTENT_LENGTH_IDENTITY;
                self.connection_close = true;
                self.h.set(TRANSFER_ENCODING, IDENTITY);
            }
        }
    }

    pub fn connection_close(&self) -> bool {
        self.connection_close
    }

    pub fn set_connection_close(&mut self) {
        self.connection_close = true;
    }

    /// Clears the close flag and drops any `Connection` field.
    pub fn reset_connection_close(&mut self) {
        self.connection_close = false;
        self.h.delete_all(CONNECTION);
    }

    /// Returns true if the `Connection` field lists `upgrade`.
    pub fn connection_upgrade(&self) -> bool {
        self.h.peek(CONNECTION).is_some_and(|value| has_token_ignore_case(value, UPGRADE))
    }

    pub fn set_last_modified(&mut self, time: SystemTime) {
        let mut value = mem::take(&mut self.scratch);
        value.clear();
        append_http_date(&mut value, time);
        self.h.set(LAST_MODIFIED, &value);
        self.scratch = value;
    }

    /// Sets `Content-Range: bytes start-end/content_length`.
    pub fn set_content_range(&mut self, start: u64, end: u64, content_length: u64) {
        let mut value = mem::take(&mut self.scratch);
        value.clear();
        value.put_slice(b"bytes ");
        append_uint(&mut value, start);
        value.put_u8(b'-');
        append_uint(&mut value, end);
        value.put_u8(b'/');
        append_uint(&mut value, content_length);
        self.h.set(CONTENT_RANGE, &value);
        self.scratch = value;
    }

    /// The full `Set-Cookie` value of the cookie named `key`.
    pub fn cookie(&self, key: &[u8]) -> Option<&[u8]> {
        self.cookies.peek(key)
    }

    /// Stores a `Set-Cookie` value such as `id=42; Path=/; HttpOnly`, replacing the
    /// cookie of the same name.
    pub fn set_cookie(&mut self, cookie: &[u8]) {
        self.cookies.set(cookie_name(cookie), cookie);
    }

    pub fn del_cookie(&mut self, key: &[u8]) {
        self.cookies.delete_all(key);
    }

    pub fn del_all_cookies(&mut self) {
        self.cookies.clear();
    }

    /// Calls `f` with the name and full `Set-Cookie` value of every cookie.
    pub fn visit_all_cookie<F>(&self, f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        self.cookies.visit_all(f);
    }

    /// The first value of the field `key`.
    pub fn peek(&mut self, key: &[u8]) -> Option<&[u8]> {
        let mut key_buf = mem::take(&mut self.key_buf);
        let key = header_key(&mut key_buf, key, self.disable_normalizing);
        let field = KnownField::from_name(key);
        let index = self.h.iter().position(|kv| kv.key() == key);
        self.key_buf = key_buf;

        let value: &[u8] = match field {
            KnownField::ContentType => self.content_type(),
            KnownField::Server => &self.server,
            KnownField::ContentLength => &self.content_length_bytes,
            KnownField::Connection if self.connection_close => CLOSE,
            KnownField::SetCookie => return self.cookies.get(0).map(|kv| kv.value()),
            _ => return index.and_then(|i| self.h.get(i)).map(|kv| kv.value()),
        };
        if value.is_empty() { None } else { Some(value) }
    }

    /// Sets the field `key`, replacing its first occurrence.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let mut key_buf = mem::take(&mut self.key_buf);
        self.set_canonical(header_key(&mut key_buf, key, self.disable_normalizing), value);
        self.key_buf = key_buf;
    }

    /// Like [`set`](Self::set) for a key already in canonical form.
    pub fn set_canonical(&mut self, key: &[u8], value: &[u8]) {
        if !self.set_special(key, value) {
            self.h.set(key, value);
        }
    }

    /// Adds the field `key`, keeping existing occurrences.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        let mut key_buf = mem::take(&mut self.key_buf);
        let key = header_key(&mut key_buf, key, self.disable_normalizing);
        if !self.set_special(key, value) {
            self.h.append(key, value);
        }
        self.key_buf = key_buf;
    }

    /// Removes every occurrence of the field `key`.
    pub fn del(&mut self, key: &[u8]) {
        let mut key_buf = mem::take(&mut self.key_buf);
        let key = header_key(&mut key_buf, key, self.disable_normalizing);
        match KnownField::from_name(key) {
            KnownField::ContentType => self.content_type.clear(),
            KnownField::Server => self.server.clear(),
            KnownField::SetCookie => self.cookies.clear(),
            KnownField::ContentLength => {
                self.content_length = 0;
                self.content_length_bytes.clear();
            }
            KnownField::Connection => self.connection_close = false,
            _ => {}
        }
        self.h.delete_all(key);
        self.key_buf = key_buf;
    }

    fn set_special(&mut self, key: &[u8], value: &[u8]) -> bool {
        match KnownField::from_name(key) {
            KnownField::ContentType => set_bytes(&mut self.content_type, value),
            KnownField::Server => set_bytes(&mut self.server, value),
            KnownField::SetCookie => self.set_cookie(value),
            KnownField::ContentLength => {
                if let Ok(len) = parse_uint(value) {
                    self.set_content_length(i64::try_from(len).unwrap_or(i64::MAX));
                }
            }
            // managed through set_content_length
            KnownField::TransferEncoding => {}
            KnownField::Connection if value.eq_ignore_ascii_case(CLOSE) => {
                self.connection_close = true;
                self.h.delete_all(CONNECTION);
            }
            KnownField::Connection => {
                self.connection_close = false;
                self.h.set(CONNECTION, value);
            }
            _ => return false,
        }
        true
    }

    /// Calls `f` for every field, the dedicated ones first.
    pub fn visit_all<F>(&self, mut f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        if !self.content_length_bytes.is_empty() {
            f(CONTENT_LENGTH, &self.content_length_bytes);
        }
        f(CONTENT_TYPE, self.content_type());
        if !self.server.is_empty() {
            f(SERVER, &self.server);
        }
        for kv in &self.cookies {
            f(SET_COOKIE, kv.value());
        }
        self.h.visit_all(&mut f);
        if self.connection_close {
            f(CONNECTION, CLOSE);
        }
    }

    /// Number of fields [`visit_all`](Self::visit_all) reports.
    pub fn len(&self) -> usize {
        let mut n = 0;
        self.visit_all(|_, _| n += 1);
        n
    }

    /// Never true: `Content-Type` always has a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deep-copies this header into `dst`, reusing its buffers.
    pub fn copy_to(&self, dst: &mut ResponseHeader) {
        dst.disable_normalizing = self.disable_normalizing;
        dst.no_http11 = self.no_http11;
        dst.connection_close = self.connection_close;
        dst.status_code = self.status_code;
        dst.content_length = self.content_length;
        set_bytes(&mut dst.content_length_bytes, &self.content_length_bytes);
        set_bytes(&mut dst.content_type, &self.content_type);
        set_bytes(&mut dst.server, &self.server);
        self.h.copy_to(&mut dst.h);
        self.cookies.copy_to(&mut dst.cookies);
    }

    /// Clears the header for reuse, normalization included.
    pub fn reset(&mut self) {
        self.disable_normalizing = false;
        self.reset_skip_normalize();
    }

    pub(crate) fn reset_skip_normalize(&mut self) {
        self.no_http11 = false;
        self.connection_close = false;
        self.status_code = 0;
        self.content_length = 0;
        self.content_length_bytes.clear();
        self.content_type.clear();
        self.server.clear();
        self.h.clear();
        self.cookies.clear();
    }

    /// Settles the body framing once every field line has been seen.
    ///
    /// Without `Content-Length` or `Transfer-Encoding` a response that may carry a body runs
    /// until the connection closes.
    pub(crate) fn resolve_content_length(&mut self) {
        if self.content_length < 0 {
            self.content_length_bytes.clear();
        }
        if self.content_length == CONTENT_LENGTH_IDENTITY {
            if self.connection_upgrade() || self.must_skip_content_length() {
                self.content_length = 0;
            } else {
                self.h.set(TRANSFER_ENCODING, IDENTITY);
                self.connection_close = true;
            }
        }
        if self.no_http11 && !self.connection_close {
            let keep_alive = self.h.peek(CONNECTION).is_some_and(|value| has_token_ignore_case(value, KEEP_ALIVE));
            self.connection_close = !keep_alive;
        }
    }
}

/// The cookie name of a `Set-Cookie` value: everything before the first `=`.
fn cookie_name(cookie: &[u8]) -> &[u8] {
    let end = memchr::memchr2(b'=', b';', cookie).unwrap_or(cookie.len());
    cookie[..end].trim_ascii()
}
