use super::{
    ACCEPT_ENCODING, CHUNKED, CLOSE, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, EXPECT, HOST, KEEP_ALIVE,
    KnownField, RANGE, REFERER, TRANSFER_ENCODING, UPGRADE, USER_AGENT, header_key, set_bytes,
};
use crate::bytesconv::{append_uint, has_token_ignore_case, parse_uint};
use crate::codec::peek_raw_header;
use crate::protocol::deferred::State;
use crate::protocol::kv::KvList;
use crate::protocol::multipart;
use bytes::{BufMut, BytesMut};
use http::Method;
use memchr::memmem;
use std::mem;

/// Header of an HTTP request.
///
/// The header of a `GET` or `HEAD` request over HTTP/1.1 is kept as raw bytes after
/// [`parse`](RequestHeader::parse) and only split into fields when a field other than the
/// method, request target or `Host` is accessed.
///
/// ```
/// use rapid_http::protocol::RequestHeader;
///
/// let mut header = RequestHeader::new();
/// header.parse(b"POST /upload HTTP/1.1\r\nhost: example.com\r\ncontent-length: 5\r\n\r\n").unwrap();
///
/// assert!(header.is_post());
/// assert_eq!(header.host(), b"example.com");
/// assert_eq!(header.content_length(), 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestHeader {
    pub(crate) disable_normalizing: bool,
    pub(crate) no_http11: bool,
    pub(crate) connection_close: bool,

    /// `-1` for chunked, otherwise the declared length
    pub(crate) content_length: i64,
    pub(crate) content_length_bytes: BytesMut,

    pub(crate) method: BytesMut,
    pub(crate) request_uri: BytesMut,
    pub(crate) host: BytesMut,
    pub(crate) content_type: BytesMut,
    pub(crate) user_agent: BytesMut,

    pub(crate) h: KvList,
    pub(crate) cookies: KvList,

    /// The field lines as received, while `raw_state` is `Unparsed`
    pub(crate) raw_headers: BytesMut,
    pub(crate) raw_state: State,

    pub(crate) key_buf: BytesMut,
    scratch: BytesMut,
}

impl RequestHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps field names exactly as received or set instead of canonicalizing them.
    pub fn disable_normalizing(&mut self) {
        self.disable_normalizing = true;
    }

    /// The request method, `GET` when unset.
    pub fn method(&self) -> &[u8] {
        if self.method.is_empty() { Method::GET.as_str().as_bytes() } else { &self.method }
    }

    pub fn set_method(&mut self, method: &[u8]) {
        set_bytes(&mut self.method, method);
    }

    #[inline]
    pub fn is_get(&self) -> bool {
        self.method() == Method::GET.as_str().as_bytes()
    }

    #[inline]
    pub fn is_post(&self) -> bool {
        self.method() == Method::POST.as_str().as_bytes()
    }

    #[inline]
    pub fn is_put(&self) -> bool {
        self.method() == Method::PUT.as_str().as_bytes()
    }

    #[inline]
    pub fn is_head(&self) -> bool {
        self.method() == Method::HEAD.as_str().as_bytes()
    }

    #[inline]
    pub fn is_delete(&self) -> bool {
        self.method() == Method::DELETE.as_str().as_bytes()
    }

    #[inline]
    pub fn is_options(&self) -> bool {
        self.method() == Method::OPTIONS.as_str().as_bytes()
    }

    #[inline]
    pub fn is_trace(&self) -> bool {
        self.method() == Method::TRACE.as_str().as_bytes()
    }

    #[inline]
    pub fn is_connect(&self) -> bool {
        self.method() == Method::CONNECT.as_str().as_bytes()
    }

    #[inline]
    pub fn is_patch(&self) -> bool {
        self.method() == Method::PATCH.as_str().as_bytes()
    }

    /// `GET` and `HEAD` requests never carry a body.
    #[inline]
    pub(crate) fn no_body(&self) -> bool {
        self.is_get() || self.is_head()
    }

    /// The request target as received, `/` when unset.
    pub fn request_uri(&self) -> &[u8] {
        if self.request_uri.is_empty() { b"/" } else { &self.request_uri }
    }

    pub fn set_request_uri(&mut self, request_uri: &[u8]) {
        set_bytes(&mut self.request_uri, request_uri);
    }

    /// Returns false if the request line named another protocol version or none at all.
    pub fn is_http11(&self) -> bool {
        !self.no_http11
    }

    /// The `Host` field. Reading it never triggers a full parse of a deferred header.
    pub fn host(&self) -> &[u8] {
        if self.raw_state == State::Unparsed {
            if let Some(host) = peek_raw_header(&self.raw_headers, HOST, !self.disable_normalizing) {
                return host;
            }
        }
        &self.host
    }

    pub fn set_host(&mut self, host: &[u8]) {
        self.parse_raw_headers();
        set_bytes(&mut self.host, host);
    }

    pub fn content_type(&mut self) -> &[u8] {
        self.parse_raw_headers();
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: &[u8]) {
        self.parse_raw_headers();
        set_bytes(&mut self.content_type, content_type);
    }

    pub fn user_agent(&mut self) -> &[u8] {
        self.parse_raw_headers();
        &self.user_agent
    }

    pub fn set_user_agent(&mut self, user_agent: &[u8]) {
        self.parse_raw_headers();
        set_bytes(&mut self.user_agent, user_agent);
    }

    pub fn referer(&mut self) -> Option<&[u8]> {
        self.parse_raw_headers();
        self.h.peek(REFERER)
    }

    pub fn set_referer(&mut self, referer: &[u8]) {
        self.set_canonical(REFERER, referer);
    }

    /// The declared body length: `-1` for chunked, `0` for requests that cannot carry a body.
    pub fn content_length(&mut self) -> i64 {
        if self.no_body() {
            return 0;
        }
        self.parse_raw_headers();
        self.content_length
    }

    /// Sets `Content-Length`, or switches to chunked encoding for a negative length.
    pub fn set_content_length(&mut self, content_length: i64) {
        self.parse_raw_headers();
        match u64::try_from(content_length) {
            Ok(len) => {
                self.content_length = content_length;
                self.content_length_bytes.clear();
                append_uint(&mut self.content_length_bytes, len);
                self.h.delete_all(TRANSFER_ENCODING);
            }
            Err(_) => {
                self.content_length = crate::protocol::CONTENT_LENGTH_CHUNKED;
                self.content_length_bytes.clear();
                self.h.set(TRANSFER_ENCODING, CHUNKED);
            }
        }
    }

    /// Whether the connection must be closed after this request.
    pub fn connection_close(&mut self) -> bool {
        self.parse_raw_headers();
        self.connection_close
    }

    pub fn set_connection_close(&mut self) {
        self.parse_raw_headers();
        self.connection_close = true;
    }

    /// Clears the close flag and drops any `Connection` field.
    pub fn reset_connection_close(&mut self) {
        self.parse_raw_headers();
        self.connection_close = false;
        self.h.delete_all(CONNECTION);
    }

    /// Returns true if the `Connection` field lists `upgrade`.
    pub fn connection_upgrade(&mut self) -> bool {
        self.parse_raw_headers();
        self.h.peek(CONNECTION).is_some_and(|value| has_token_ignore_case(value, UPGRADE))
    }

    /// Returns true if the client waits for `100 Continue` before sending its body.
    pub fn may_continue(&mut self) -> bool {
        self.parse_raw_headers();
        self.h.peek(EXPECT).is_some_and(|value| value.eq_ignore_ascii_case(b"100-continue"))
    }

    /// Returns true if `Accept-Encoding` lists `encoding`.
    pub fn has_accept_encoding(&mut self, encoding: &[u8]) -> bool {
        self.parse_raw_headers();
        let Some(accept) = self.h.peek(ACCEPT_ENCODING) else {
            return false;
        };
        memmem::find_iter(accept, encoding).any(|n| {
            let before_ok = n == 0 || matches!(accept[n - 1], b' ' | b',');
            let after = &accept[n + encoding.len()..];
            let after_ok = after.first().is_none_or(|c| matches!(c, b',' | b';' | b' '));
            before_ok && after_ok
        })
    }

    /// Sets `Range: bytes=start-end`.
    ///
    /// A negative `start` requests the last `-start` bytes; a negative `end` leaves the range open.
    pub fn set_byte_range(&mut self, start: i64, end: i64) {
        let mut value = mem::take(&mut self.scratch);
        value.clear();
        value.put_slice(b"bytes=");
        let end = match u64::try_from(start) {
            Ok(start) => {
                append_uint(&mut value, start);
                end
            }
            Err(_) => -start,
        };
        value.put_u8(b'-');
        if let Ok(end) = u64::try_from(end) {
            append_uint(&mut value, end);
        }
        self.set_canonical(RANGE, &value);
        self.scratch = value;
    }

    /// The boundary of a `multipart/form-data` body.
    pub fn multipart_form_boundary(&mut self) -> Option<String> {
        self.parse_raw_headers();
        multipart::multipart_form_boundary(&self.content_type)
    }

    /// Sets `Content-Type: multipart/form-data; boundary=<boundary>`.
    pub fn set_multipart_form_boundary(&mut self, boundary: &str) {
        self.parse_raw_headers();
        self.content_type.clear();
        self.content_type.put_slice(b"multipart/form-data; boundary=");
        self.content_type.put_slice(boundary.as_bytes());
    }

    pub fn cookie(&mut self, key: &[u8]) -> Option<&[u8]> {
        self.parse_raw_headers();
        self.cookies.peek(key)
    }

    pub fn set_cookie(&mut self, key: &[u8], value: &[u8]) {
        self.parse_raw_headers();
        self.cookies.set(key, value);
    }

    pub fn del_cookie(&mut self, key: &[u8]) {
        self.parse_raw_headers();
        self.cookies.delete_all(key);
    }

    pub fn del_all_cookies(&mut self) {
        self.parse_raw_headers();
        self.cookies.clear();
    }

    pub fn visit_all_cookie<F>(&mut self, f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        self.parse_raw_headers();
        self.cookies.visit_all(f);
    }

    /// The first value of the field `key`.
    pub fn peek(&mut self, key: &[u8]) -> Option<&[u8]> {
        self.parse_raw_headers();
        let mut key_buf = mem::take(&mut self.key_buf);
        let key = header_key(&mut key_buf, key, self.disable_normalizing);
        let field = KnownField::from_name(key);
        let index = self.h.iter().position(|kv| kv.key() == key);
        self.key_buf = key_buf;

        let value: &[u8] = match field {
            KnownField::Host => &self.host,
            KnownField::ContentType => &self.content_type,
            KnownField::UserAgent => &self.user_agent,
            KnownField::ContentLength => &self.content_length_bytes,
            KnownField::Connection if self.connection_close => CLOSE,
            KnownField::Cookie => {
                self.scratch.clear();
                append_request_cookies(&mut self.scratch, &self.cookies);
                &self.scratch
            }
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
        self.parse_raw_headers();
        if !self.set_special(key, value) {
            self.h.set(key, value);
        }
    }

    /// Adds the field `key`, keeping existing occurrences.
    ///
    /// Fields with a dedicated slot such as `Host` are replaced instead.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        self.parse_raw_headers();
        let mut key_buf = mem::take(&mut self.key_buf);
        let key = header_key(&mut key_buf, key, self.disable_normalizing);
        if !self.set_special(key, value) {
            self.h.append(key, value);
        }
        self.key_buf = key_buf;
    }

    /// Removes every occurrence of the field `key`.
    pub fn del(&mut self, key: &[u8]) {
        self.parse_raw_headers();
        let mut key_buf = mem::take(&mut self.key_buf);
        let key = header_key(&mut key_buf, key, self.disable_normalizing);
        match KnownField::from_name(key) {
            KnownField::Host => self.host.clear(),
            KnownField::ContentType => self.content_type.clear(),
            KnownField::UserAgent => self.user_agent.clear(),
            KnownField::Cookie => self.cookies.clear(),
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

    /// Handles fields kept outside the generic list. Returns false for any other field.
    fn set_special(&mut self, key: &[u8], value: &[u8]) -> bool {
        match KnownField::from_name(key) {
            KnownField::Host => set_bytes(&mut self.host, value),
            KnownField::ContentType => set_bytes(&mut self.content_type, value),
            KnownField::UserAgent => set_bytes(&mut self.user_agent, value),
            KnownField::Cookie => parse_request_cookies(&mut self.cookies, value),
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
    pub fn visit_all<F>(&mut self, mut f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        self.parse_raw_headers();
        if !self.host.is_empty() {
            f(HOST, &self.host);
        }
        if !self.content_length_bytes.is_empty() {
            f(CONTENT_LENGTH, &self.content_length_bytes);
        }
        if !self.content_type.is_empty() {
            f(CONTENT_TYPE, &self.content_type);
        }
        if !self.user_agent.is_empty() {
            f(USER_AGENT, &self.user_agent);
        }
        if !self.cookies.is_empty() {
            self.scratch.clear();
            append_request_cookies(&mut self.scratch, &self.cookies);
            f(COOKIE, &self.scratch);
        }
        self.h.visit_all(&mut f);
        if self.connection_close {
            f(CONNECTION, CLOSE);
        }
    }

    /// Number of fields [`visit_all`](Self::visit_all) reports.
    pub fn len(&mut self) -> usize {
        let mut n = 0;
        self.visit_all(|_, _| n += 1);
        n
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// The field lines captured verbatim when the last parse deferred them, terminating empty line included.
    pub fn raw_headers(&self) -> &[u8] {
        &self.raw_headers
    }

    /// Deep-copies this header into `dst`, reusing its buffers.
    pub fn copy_to(&self, dst: &mut RequestHeader) {
        dst.disable_normalizing = self.disable_normalizing;
        dst.no_http11 = self.no_http11;
        dst.connection_close = self.connection_close;
        dst.content_length = self.content_length;
        set_bytes(&mut dst.content_length_bytes, &self.content_length_bytes);
        set_bytes(&mut dst.method, &self.method);
        set_bytes(&mut dst.request_uri, &self.request_uri);
        set_bytes(&mut dst.host, &self.host);
        set_bytes(&mut dst.content_type, &self.content_type);
        set_bytes(&mut dst.user_agent, &self.user_agent);
        self.h.copy_to(&mut dst.h);
        self.cookies.copy_to(&mut dst.cookies);
        set_bytes(&mut dst.raw_headers, &self.raw_headers);
        dst.raw_state = self.raw_state;
    }

    /// Clears the header for reuse, normalization included.
    pub fn reset(&mut self) {
        self.disable_normalizing = false;
        self.reset_skip_normalize();
    }

    pub(crate) fn reset_skip_normalize(&mut self) {
        self.no_http11 = false;
        self.connection_close = false;
        self.content_length = 0;
        self.content_length_bytes.clear();
        self.method.clear();
        self.request_uri.clear();
        self.host.clear();
        self.content_type.clear();
        self.user_agent.clear();
        self.h.clear();
        self.cookies.clear();
        self.raw_headers.clear();
        self.raw_state = State::Parsed;
    }

    /// After a parse, an HTTP/1.0 request keeps its connection only if it asked to.
    pub(crate) fn resolve_connection(&mut self) {
        if self.no_http11 && !self.connection_close {
            let keep_alive = self.h.peek(CONNECTION).is_some_and(|value| has_token_ignore_case(value, KEEP_ALIVE));
            self.connection_close = !keep_alive;
        }
    }
}

/// Splits a `Cookie` value `a=b; c=d` into `cookies`. A part without `=` has an empty key.
pub(crate) fn parse_request_cookies(cookies: &mut KvList, value: &[u8]) {
    for part in value.split(|&c| c == b';') {
        let part = part.trim_ascii();
        if part.is_empty() {
            continue;
        }
        match memchr::memchr(b'=', part) {
            Some(n) => cookies.append(part[..n].trim_ascii(), part[n + 1..].trim_ascii()),
            None => cookies.append(b"", part),
        }
    }
}

/// Renders `cookies` as a single `Cookie` value.
pub(crate) fn append_request_cookies(dst: &mut BytesMut, cookies: &KvList) {
    for (i, kv) in cookies.iter().enumerate() {
        if i > 0 {
            dst.put_slice(b"; ");
        }
        if !kv.key().is_empty() {
            dst.put_slice(kv.key());
            dst.put_u8(b'=');
        }
        dst.put_slice(kv.value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let header = RequestHeader::new();
        assert_eq!(header.method(), b"GET");
        assert_eq!(header.request_uri(), b"/");
        assert!(header.is_get());
        assert!(header.is_http11());
        assert!(header.host().is_empty());
    }

    #[test]
    fn test_special_fields() {
        let mut header = RequestHeader::new();
        header.set(b"host", b"example.com");
        header.set(b"content-type", b"text/html");
        header.add(b"x-trace", b"1");
        header.add(b"X-TRACE", b"2");
        header.set(b"Cookie", b"a=b; c=d");

        assert_eq!(header.host(), b"example.com");
        assert_eq!(header.peek(b"Content-Type"), Some(&b"text/html"[..]));
        assert_eq!(header.peek(b"x-trace"), Some(&b"1"[..]));
        assert_eq!(header.h.peek_all(b"X-Trace"), vec![&b"1"[..], &b"2"[..]]);
        assert_eq!(header.cookie(b"c"), Some(&b"d"[..]));
        assert_eq!(header.peek(b"cookie"), Some(&b"a=b; c=d"[..]));

        header.del(b"X-Trace");
        header.del(b"host");
        assert_eq!(header.peek(b"X-Trace"), None);
        assert_eq!(header.peek(b"Host"), None);
    }

    #[test]
    fn test_content_length() {
        let mut header = RequestHeader::new();
        header.set_method(b"POST");
        header.set_content_length(42);
        assert_eq!(header.content_length(), 42);
        assert_eq!(header.peek(b"Content-Length"), Some(&b"42"[..]));

        header.set_content_length(-5);
        assert_eq!(header.content_length(), -1);
        assert_eq!(header.peek(b"Transfer-Encoding"), Some(&b"chunked"[..]));
        assert_eq!(header.peek(b"Content-Length"), None);

        header.set(b"Content-Length", b"7");
        assert_eq!(header.content_length(), 7);
        assert_eq!(header.peek(b"Transfer-Encoding"), None);
    }

    #[test]
    fn test_connection() {
        let mut header = RequestHeader::new();
        header.set(b"Connection", b"Upgrade");
        assert!(!header.connection_close());
        assert!(header.connection_upgrade());

        header.set(b"Connection", b"close");
        assert!(header.connection_close());
        assert_eq!(header.peek(b"Connection"), Some(&b"close"[..]));

        header.reset_connection_close();
        assert!(!header.connection_close());
        assert_eq!(header.peek(b"Connection"), None);
    }

    #[test]
    fn test_accept_encoding() {
        let mut header = RequestHeader::new();
        header.set(b"Accept-Encoding", b"gzip;q=1.0, deflate, br");
        assert!(header.has_accept_encoding(b"gzip"));
        assert!(header.has_accept_encoding(b"deflate"));
        assert!(header.has_accept_encoding(b"br"));
        assert!(!header.has_accept_encoding(b"zip"));
        assert!(!header.has_accept_encoding(b"compress"));
    }

    #[test]
    fn test_byte_range() {
        let mut header = RequestHeader::new();
        header.set_byte_range(10, 20);
        assert_eq!(header.peek(b"Range"), Some(&b"bytes=10-20"[..]));
        header.set_byte_range(5, -1);
        assert_eq!(header.peek(b"Range"), Some(&b"bytes=5-"[..]));
        header.set_byte_range(-7, 0);
        assert_eq!(header.peek(b"Range"), Some(&b"bytes=-7"[..]));
    }

    #[test]
    fn test_multipart_boundary() {
        let mut header = RequestHeader::new();
        header.set_multipart_form_boundary("xyz123");
        assert_eq!(header.content_type(), b"multipart/form-data; boundary=xyz123");
        assert_eq!(header.multipart_form_boundary().as_deref(), Some("xyz123"));

        header.set_content_type(b"application/json");
        assert_eq!(header.multipart_form_boundary(), None);
    }

    #[test]
    fn test_visit_all_and_copy() {
        let mut header = RequestHeader::new();
        header.set_host(b"example.com");
        header.set_user_agent(b"agent");
        header.set(b"X-A", b"1");
        header.set_cookie(b"k", b"v");
        header.set_connection_close();

        let mut fields = Vec::new();
        header.visit_all(|k, v| fields.push(format!("{}: {}", String::from_utf8_lossy(k), String::from_utf8_lossy(v))));
        assert_eq!(fields, ["Host: example.com", "User-Agent: agent", "Cookie: k=v", "X-A: 1", "Connection: close"]);
        assert_eq!(header.len(), 5);

        let mut copy = RequestHeader::new();
        copy.set(b"X-Stale", b"1");
        header.copy_to(&mut copy);
        assert_eq!(copy.host(), b"example.com");
        assert_eq!(copy.peek(b"X-Stale"), None);
        assert!(copy.connection_close());
    }
}
