//! HTTP header decoder implementation for parsing request and response headers
//!
//! This module turns raw header bytes into [`RequestHeader`] and [`ResponseHeader`] values.
//! Parsing is resumable: when the buffer ends before the empty line closing the header, the
//! parsers report `Ok(None)` and the caller retries from the same start with more bytes.
//!
//! # Implementation Details
//!
//! The decoder works in multiple stages:
//!
//! 1. Skip empty lines and parse the request or status line
//! 2. Locate the empty line terminating the field block
//! 3. Split every `Name: value` line, canonicalize the name and dispatch it to a dedicated slot
//!    or the generic field list
//! 4. Settle the body framing from `Content-Length`, `Transfer-Encoding` and `Connection`
//!
//! The field block of a `GET` or `HEAD` request over HTTP/1.1 skips stage 3 and 4: it is kept
//! verbatim and split only when a field is first accessed.

use std::mem;

use bytes::BytesMut;
use memchr::{memchr, memchr_iter, memrchr};
use tokio::io::AsyncRead;
use tracing::{trace, warn};

use crate::bytesconv::{parse_uint, parse_uint_prefix};
use crate::connection::MessageReader;
use crate::ensure;
use crate::protocol::deferred::State;
use crate::protocol::header::{
    CHUNKED, CLOSE, HTTP11, IDENTITY, KnownField, TRANSFER_ENCODING, header_key, parse_request_cookies,
    set_bytes,
};
use crate::protocol::{CONTENT_LENGTH_CHUNKED, CONTENT_LENGTH_IDENTITY, ParseError, RequestHeader, ResponseHeader};

impl RequestHeader {
    /// Parses a request header from the start of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(n))` with the number of bytes the header occupies, terminating empty line included
    /// - `Ok(None)` if `buf` ends before the header does
    /// - `Err(ParseError)` if the header is malformed
    pub fn parse(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        self.reset_skip_normalize();

        let Some(n) = self.parse_first_line(buf)? else {
            return Ok(None);
        };
        let Some(m) = field_block_len(&buf[n..]) else {
            return Ok(None);
        };

        let block = &buf[n..n + m];
        if self.no_body() && !self.no_http11 {
            trace!(len = block.len(), "deferring request header fields");
            set_bytes(&mut self.raw_headers, block);
            self.raw_state = State::Unparsed;
        } else {
            self.parse_fields(block)?;
        }
        Ok(Some(n + m))
    }

    /// Reads a request header, pulling more bytes from `reader` until it is complete.
    ///
    /// The header is reset if reading fails. [`ParseError::EndOfStream`] reports a peer that
    /// closed the connection without starting another request.
    pub async fn read<R>(&mut self, reader: &mut MessageReader<R>) -> Result<(), ParseError>
    where
        R: AsyncRead + Unpin,
    {
        read_header(self, reader).await
    }

    /// Splits a deferred field block into fields.
    pub(crate) fn parse_raw_headers(&mut self) {
        if self.raw_state == State::Parsed {
            return;
        }
        self.raw_state = State::Parsed;
        if self.raw_headers.is_empty() {
            return;
        }

        trace!("parsing deferred request header fields");
        let raw = mem::take(&mut self.raw_headers);
        if let Err(e) = self.parse_fields(&raw) {
            warn!(cause = %e, "ignoring malformed deferred request header");
        }
        self.raw_headers = raw;
    }

    fn parse_first_line(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        let Some((line, n)) = first_line(buf) else {
            return Ok(None);
        };

        let method_end = memchr(b' ', line).filter(|&i| i > 0);
        let Some(method_end) = method_end else {
            return Err(ParseError::malformed_first_line(format!("cannot find http request method in {:?}", lossy(line))));
        };
        set_bytes(&mut self.method, &line[..method_end]);

        let rest = &line[method_end + 1..];
        let uri = match memrchr(b' ', rest) {
            None => {
                self.no_http11 = true;
                rest
            }
            Some(i) => {
                self.no_http11 = &rest[i + 1..] != HTTP11;
                &rest[..i]
            }
        };
        ensure!(!uri.is_empty(), ParseError::malformed_first_line("request uri cannot be empty"));
        set_bytes(&mut self.request_uri, uri);

        Ok(Some(n))
    }

    fn parse_fields(&mut self, block: &[u8]) -> Result<(), ParseError> {
        let mut key_buf = mem::take(&mut self.key_buf);
        let result = self.dispatch_fields(block, &mut key_buf);
        self.key_buf = key_buf;
        result
    }

    fn dispatch_fields(&mut self, block: &[u8], key_buf: &mut BytesMut) -> Result<(), ParseError> {
        self.content_length = CONTENT_LENGTH_IDENTITY;

        for field in FieldLines::new(block) {
            let (key, value) = field?;
            let key = header_key(key_buf, key, self.disable_normalizing);
            match KnownField::from_name(key) {
                KnownField::Host => set_bytes(&mut self.host, value),
                KnownField::ContentType => set_bytes(&mut self.content_type, value),
                KnownField::UserAgent => set_bytes(&mut self.user_agent, value),
                KnownField::Cookie => parse_request_cookies(&mut self.cookies, value),
                KnownField::ContentLength => {
                    if let Some(len) = content_length(self.content_length, value) {
                        self.content_length = len;
                        set_bytes(&mut self.content_length_bytes, value);
                    }
                }
                KnownField::TransferEncoding => {
                    if !value.eq_ignore_ascii_case(IDENTITY) {
                        self.content_length = CONTENT_LENGTH_CHUNKED;
                        self.h.set(TRANSFER_ENCODING, CHUNKED);
                    }
                }
                KnownField::Connection if value.eq_ignore_ascii_case(CLOSE) => self.connection_close = true,
                KnownField::Connection => {
                    self.connection_close = false;
                    self.h.append(key, value);
                }
                _ => self.h.append(key, value),
            }
        }

        if self.content_length < 0 {
            self.content_length_bytes.clear();
        }
        // a request body never runs until the connection closes
        if self.content_length == CONTENT_LENGTH_IDENTITY {
            self.content_length = 0;
        }
        self.resolve_connection();
        Ok(())
    }
}

impl ResponseHeader {
    /// Parses a response header from the start of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(n))` with the number of bytes the header occupies, terminating empty line included
    /// - `Ok(None)` if `buf` ends before the header does
    /// - `Err(ParseError)` if the header is malformed
    pub fn parse(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        self.reset_skip_normalize();

        let Some(n) = self.parse_first_line(buf)? else {
            return Ok(None);
        };
        let Some(m) = field_block_len(&buf[n..]) else {
            return Ok(None);
        };

        let mut key_buf = mem::take(&mut self.key_buf);
        let result = self.dispatch_fields(&buf[n..n + m], &mut key_buf);
        self.key_buf = key_buf;
        result?;

        Ok(Some(n + m))
    }

    /// Reads a response header, pulling more bytes from `reader` until it is complete.
    ///
    /// The header is reset if reading fails.
    pub async fn read<R>(&mut self, reader: &mut MessageReader<R>) -> Result<(), ParseError>
    where
        R: AsyncRead + Unpin,
    {
        read_header(self, reader).await
    }

    fn parse_first_line(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        let Some((line, n)) = first_line(buf) else {
            return Ok(None);
        };

        let Some(version_end) = memchr(b' ', line) else {
            return Err(ParseError::malformed_first_line(format!(
                "cannot find whitespace in the first line of response {:?}",
                lossy(line)
            )));
        };
        self.no_http11 = &line[..version_end] != HTTP11;

        let rest = &line[version_end + 1..];
        let (status_code, digits) = parse_uint_prefix(rest)
            .map_err(|e| ParseError::malformed_first_line(format!("cannot parse response status code: {e}")))?;
        ensure!(
            rest.get(digits).is_none_or(|&c| c == b' '),
            ParseError::malformed_first_line(format!("unexpected char at the end of status code {:?}", lossy(rest)))
        );
        self.status_code = u16::try_from(status_code)
            .map_err(|e| ParseError::malformed_first_line(format!("status code {status_code} out of range: {e}")))?;

        Ok(Some(n))
    }

    fn dispatch_fields(&mut self, block: &[u8], key_buf: &mut BytesMut) -> Result<(), ParseError> {
        self.content_length = CONTENT_LENGTH_IDENTITY;

        for field in FieldLines::new(block) {
            let (key, value) = field?;
            let key = header_key(key_buf, key, self.disable_normalizing);
            match KnownField::from_name(key) {
                KnownField::ContentType => set_bytes(&mut self.content_type, value),
                KnownField::Server => set_bytes(&mut self.server, value),
                KnownField::SetCookie => self.set_cookie(value),
                KnownField::ContentLength => {
                    if let Some(len) = content_length(self.content_length, value) {
                        self.content_length = len;
                        set_bytes(&mut self.content_length_bytes, value);
                    }
                }
                KnownField::TransferEncoding => {
                    if !value.eq_ignore_ascii_case(IDENTITY) {
                        self.content_length = CONTENT_LENGTH_CHUNKED;
                        self.h.set(TRANSFER_ENCODING, CHUNKED);
                    }
                }
                KnownField::Connection if value.eq_ignore_ascii_case(CLOSE) => self.connection_close = true,
                KnownField::Connection => {
                    self.connection_close = false;
                    self.h.append(key, value);
                }
                _ => self.h.append(key, value),
            }
        }

        self.resolve_content_length();
        Ok(())
    }
}

/// A `Content-Length` value, unless chunked encoding was already selected.
///
/// Malformed values are ignored, keeping whatever length was seen before.
fn content_length(current: i64, value: &[u8]) -> Option<i64> {
    if current == CONTENT_LENGTH_CHUNKED {
        return None;
    }
    match parse_uint(value) {
        Ok(len) => i64::try_from(len).ok(),
        Err(e) => {
            warn!(cause = %e, value = %lossy(value), "ignoring invalid content-length");
            None
        }
    }
}

/// Parsers driven by [`read_header`].
trait HeaderParse {
    fn parse_header(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError>;

    fn reset_header(&mut self);
}

impl HeaderParse for RequestHeader {
    fn parse_header(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        self.parse(buf)
    }

    fn reset_header(&mut self) {
        self.reset_skip_normalize();
    }
}

impl HeaderParse for ResponseHeader {
    fn parse_header(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        self.parse(buf)
    }

    fn reset_header(&mut self) {
        self.reset_skip_normalize();
    }
}

async fn read_header<H, R>(header: &mut H, reader: &mut MessageReader<R>) -> Result<(), ParseError>
where
    H: HeaderParse,
    R: AsyncRead + Unpin,
{
    let result = try_read_header(header, reader).await;
    if result.is_err() {
        header.reset_header();
    }
    result
}

async fn try_read_header<H, R>(header: &mut H, reader: &mut MessageReader<R>) -> Result<(), ParseError>
where
    H: HeaderParse,
    R: AsyncRead + Unpin,
{
    let max_header_size = reader.limits().max_header_size;
    loop {
        if reader.buffered() > 0 {
            if let Some(n) = header.parse_header(reader.buffer())? {
                trace!(header_size = n, "parsed header");
                reader.discard(n);
                return Ok(());
            }
            ensure!(
                reader.buffered() < max_header_size,
                ParseError::too_large_header(reader.buffered(), max_header_size)
            );
        }

        if reader.fill().await? == 0 {
            // blank lines left behind by a previous message are a clean end of stream
            if reader.buffer().iter().all(|&c| c == b'\r' || c == b'\n') {
                return Err(ParseError::EndOfStream);
            }
            return Err(ParseError::invalid_header(format!(
                "unexpected eof with {} bytes of incomplete header",
                reader.buffered()
            )));
        }
    }
}

/// The first non-empty line of `buf`, without its line ending, and the bytes it spans
/// including the empty lines before it.
fn first_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let mut consumed = 0;
    loop {
        let rest = &buf[consumed..];
        let end = memchr(b'\n', rest)?;
        consumed += end + 1;
        let line = trim_cr(&rest[..end]);
        if !line.is_empty() {
            return Some((line, consumed));
        }
    }
}

/// Length of the field block at the start of `buf`, up to and including the empty line
/// ending it. Lines may end with CRLF or a bare LF.
fn field_block_len(buf: &[u8]) -> Option<usize> {
    if buf.starts_with(b"\r\n") {
        return Some(2);
    }
    if buf.starts_with(b"\n") {
        return Some(1);
    }
    for n in memchr_iter(b'\n', buf) {
        match &buf[n + 1..] {
            [b'\n', ..] => return Some(n + 2),
            [b'\r', b'\n', ..] => return Some(n + 3),
            _ => {}
        }
    }
    None
}

/// Iterates the `Name: value` lines of a field block, stopping at the first empty line.
struct FieldLines<'a> {
    block: &'a [u8],
}

impl<'a> FieldLines<'a> {
    fn new(block: &'a [u8]) -> Self {
        Self { block }
    }
}

impl<'a> Iterator for FieldLines<'a> {
    type Item = Result<(&'a [u8], &'a [u8]), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line, rest) = match memchr(b'\n', self.block) {
            Some(n) => (&self.block[..n], &self.block[n + 1..]),
            None => (self.block, &self.block[self.block.len()..]),
        };
        self.block = rest;

        let line = trim_cr(line);
        if line.is_empty() {
            return None;
        }
        Some(split_field(line))
    }
}

fn split_field(line: &[u8]) -> Result<(&[u8], &[u8]), ParseError> {
    let Some(colon) = memchr(b':', line) else {
        return Err(ParseError::invalid_header(format!("cannot find colon in header line {:?}", lossy(line))));
    };
    let key = &line[..colon];
    ensure!(
        !key.is_empty() && key.iter().all(|c| c.is_ascii_graphic()),
        ParseError::invalid_header(format!("invalid header name {:?}", lossy(key)))
    );
    Ok((key, line[colon + 1..].trim_ascii()))
}

/// Looks up `key` in a raw field block without splitting it into fields.
pub(crate) fn peek_raw_header<'a>(block: &'a [u8], key: &[u8], ignore_case: bool) -> Option<&'a [u8]> {
    block.split(|&c| c == b'\n').find_map(|line| {
        let name = line.get(..key.len())?;
        let matched = if ignore_case { name.eq_ignore_ascii_case(key) } else { name == key };
        if !matched || line.get(key.len()) != Some(&b':') {
            return None;
        }
        Some(line[key.len() + 1..].trim_ascii())
    })
}

#[inline]
fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn lossy(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use indoc::indoc;

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut header = RequestHeader::new();
        let n = header.parse(str.as_bytes()).unwrap().unwrap();
        assert_eq!(&str.as_bytes()[n..], b"123");

        assert!(header.is_get());
        assert!(header.is_http11());
        assert_eq!(header.request_uri(), b"/index.html");

        // fields stay raw until one other than Host is read
        assert_eq!(header.raw_state, State::Unparsed);
        assert_eq!(header.host(), b"127.0.0.1:8080");
        assert_eq!(header.raw_state, State::Unparsed);

        assert_eq!(header.user_agent(), b"curl/7.79.1");
        assert_eq!(header.raw_state, State::Parsed);
        assert_eq!(header.peek(b"accept"), Some(&b"*/*"[..]));
        assert_eq!(header.content_length(), 0);
    }

    #[test]
    fn from_edge() {
        let str = indoc! {r##"
        POST /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Cache-Control: max-age=0
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-mobile: ?0
        User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36
        Accept-Encoding: gzip, deflate, br
        Cookie: session=abc; theme=dark
        Content-Length: 10

        "##};

        let mut header = RequestHeader::new();
        header.parse(str.as_bytes()).unwrap().unwrap();

        assert!(header.is_post());
        assert_eq!(header.request_uri(), b"/index/?a=1&b=2&a=3");
        assert_eq!(header.content_length(), 10);
        assert!(!header.connection_close());
        assert!(header.has_accept_encoding(b"br"));
        assert_eq!(header.cookie(b"theme"), Some(&b"dark"[..]));
        assert_eq!(header.peek(b"Sec-Ch-Ua-Mobile"), Some(&b"?0"[..]));
        assert_eq!(header.peek(b"Connection"), Some(&b"keep-alive"[..]));
        assert_eq!(
            header.peek(b"sec-ch-ua"),
            Some(&br##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##[..])
        );
    }

    #[test]
    fn test_need_more_data() {
        let full = b"POST /a HTTP/1.1\r\nHost: x\r\nContent-Length: 3\r\n\r\nabc";
        let header_len = full.len() - 3;

        let mut header = RequestHeader::new();
        for end in 0..header_len {
            assert!(header.parse(&full[..end]).unwrap().is_none(), "prefix of {end} bytes");
        }
        assert_eq!(header.parse(full).unwrap(), Some(header_len));
        assert_eq!(header.content_length(), 3);
    }

    #[test]
    fn test_leading_empty_lines() {
        let mut header = RequestHeader::new();
        let n = header.parse(b"\r\n\r\nPUT /x HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert_eq!(n, 23);
        assert!(header.is_put());
    }

    #[test]
    fn test_malformed_first_line() {
        for line in [&b"GET\r\n\r\n"[..], b" / HTTP/1.1\r\n\r\n", b"GET  HTTP/1.1\r\n\r\n"] {
            let mut header = RequestHeader::new();
            let result = header.parse(line);
            assert!(matches!(result, Err(ParseError::MalformedFirstLine { .. })), "{:?}", lossy(line));
        }

        for line in [&b"HTTP/1.1\r\n\r\n"[..], b"HTTP/1.1 abc OK\r\n\r\n", b"HTTP/1.1 200x OK\r\n\r\n"] {
            let mut header = ResponseHeader::new();
            let result = header.parse(line);
            assert!(matches!(result, Err(ParseError::MalformedFirstLine { .. })), "{:?}", lossy(line));
        }
    }

    #[test]
    fn test_http10_request() {
        let mut header = RequestHeader::new();
        header.parse(b"GET /old HTTP/1.0\r\nHost: a\r\n\r\n").unwrap().unwrap();
        assert!(!header.is_http11());
        assert!(header.connection_close());

        header.parse(b"GET /old HTTP/1.0\r\nConnection: keep-alive\r\n\r\n").unwrap().unwrap();
        assert!(!header.connection_close());

        header.parse(b"GET /bare\r\n\r\n").unwrap().unwrap();
        assert!(!header.is_http11());
        assert_eq!(header.request_uri(), b"/bare");
    }

    #[test]
    fn test_invalid_header_line() {
        let mut header = ResponseHeader::new();
        let result = header.parse(b"HTTP/1.1 200 OK\r\nno colon here\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader { .. })));

        let result = header.parse(b"HTTP/1.1 200 OK\r\nbad name: x\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader { .. })));
    }

    #[test]
    fn test_chunked_request() {
        let mut header = RequestHeader::new();
        header
            .parse(b"POST /upload HTTP/1.1\r\nHost: a\r\nTransfer-Encoding: gzip, chunked\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(header.content_length(), -1);
        assert_eq!(header.peek(b"Transfer-Encoding"), Some(&b"chunked"[..]));
    }

    #[test]
    fn test_content_length_resolution() {
        let mut header = ResponseHeader::new();

        // chunked wins over any content-length
        header.parse(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap();
        assert_eq!(header.content_length(), -1);
        assert_eq!(header.peek(b"Content-Length"), None);

        // the last valid value wins, invalid ones are ignored
        header.parse(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Length: 7\r\nContent-Length: x\r\n\r\n").unwrap();
        assert_eq!(header.content_length(), 7);

        // an invalid value alone means the body runs until close
        header.parse(b"HTTP/1.1 200 OK\r\nContent-Length: -3\r\n\r\n").unwrap();
        assert_eq!(header.content_length(), -2);
        assert!(header.connection_close());
        assert_eq!(header.peek(b"Transfer-Encoding"), Some(&b"identity"[..]));

        // identity transfer-encoding is not chunked
        header.parse(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: identity\r\nContent-Length: 2\r\n\r\n").unwrap();
        assert_eq!(header.content_length(), 2);
        assert_eq!(header.peek(b"Transfer-Encoding"), None);
    }

    #[test]
    fn test_response_without_body() {
        let mut header = ResponseHeader::new();
        header.parse(b"HTTP/1.1 204 No Content\r\nContent-Length: 10\r\n\r\n").unwrap().unwrap();
        assert_eq!(header.status_code(), 204);
        assert_eq!(header.content_length(), 0);
        assert!(!header.connection_close());

        header.parse(b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\n\r\n").unwrap().unwrap();
        assert_eq!(header.content_length(), 0);
        assert!(header.connection_upgrade());
        assert!(!header.connection_close());
    }

    #[test]
    fn test_response_fields() {
        let str = indoc! {r##"
        HTTP/1.0 404 Not Found
        server: nginx
        content-type: text/html
        set-cookie: a=1; Path=/
        SET-COOKIE: b=2
        Content-Length: 0
        X-Request-Id: 42
        X-Request-Id: 43

        "##};

        let mut header = ResponseHeader::new();
        header.parse(str.as_bytes()).unwrap().unwrap();

        assert!(!header.is_http11());
        assert!(header.connection_close());
        assert_eq!(header.status_code(), 404);
        assert_eq!(header.server(), b"nginx");
        assert_eq!(header.content_type(), b"text/html");
        assert_eq!(header.cookie(b"a"), Some(&b"a=1; Path=/"[..]));
        assert_eq!(header.cookie(b"b"), Some(&b"b=2"[..]));
        assert_eq!(header.h.peek_all(b"X-Request-Id"), vec![&b"42"[..], &b"43"[..]]);
    }

    #[test]
    fn test_disable_normalizing() {
        let mut header = ResponseHeader::new();
        header.disable_normalizing();
        header.parse(b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\nContent-Length: 3\r\nx-lower: y\r\n\r\n").unwrap();

        // the lowercase spelling is an ordinary field
        assert_eq!(header.content_length(), 3);
        assert_eq!(header.peek(b"content-length"), Some(&b"5"[..]));
        assert_eq!(header.peek(b"x-lower"), Some(&b"y"[..]));
        assert_eq!(header.peek(b"X-Lower"), None);
    }

    #[test]
    fn test_peek_raw_header() {
        let block = b"Accept: */*\r\nhost: example.com \r\nX-Host: nope\r\n\r\n";
        assert_eq!(peek_raw_header(block, b"Host", true), Some(&b"example.com"[..]));
        assert_eq!(peek_raw_header(block, b"Host", false), None);
        assert_eq!(peek_raw_header(block, b"Missing", true), None);
    }

    #[tokio::test]
    async fn test_read_pipelined() {
        let input: &[u8] = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: y\r\n\r\n\r\n";
        let mut reader = MessageReader::with_limits(input, Limits::default().with_read_buffer_size(7));
        let mut header = RequestHeader::new();

        header.read(&mut reader).await.unwrap();
        assert_eq!(header.request_uri(), b"/a");
        assert_eq!(header.host(), b"x");

        header.read(&mut reader).await.unwrap();
        assert_eq!(header.request_uri(), b"/b");
        assert_eq!(header.host(), b"y");

        let result = header.read(&mut reader).await;
        assert!(matches!(result, Err(ParseError::EndOfStream)));
        assert_eq!(header.request_uri(), b"/");
    }

    #[tokio::test]
    async fn test_read_too_large() {
        let mut input = b"GET /".to_vec();
        input.extend(vec![b'a'; 200]);
        input.extend(b" HTTP/1.1\r\n\r\n");

        let limits = Limits::default().with_read_buffer_size(16).with_max_header_size(64);
        let mut reader = MessageReader::with_limits(&input[..], limits);
        let mut header = RequestHeader::new();

        let result = header.read(&mut reader).await;
        assert!(matches!(result, Err(ParseError::TooLargeHeader { max_size: 64, .. })));
    }

    #[tokio::test]
    async fn test_read_truncated() {
        let input: &[u8] = b"HTTP/1.1 200 OK\r\nServer: x\r\n";
        let mut reader = MessageReader::new(input);
        let mut header = ResponseHeader::new();

        let result = header.read(&mut reader).await;
        assert!(matches!(result, Err(ParseError::InvalidHeader { .. })));
        assert!(header.server().is_empty());
    }

    #[tokio::test]
    async fn test_read_empty_stream() {
        let mut reader = MessageReader::new(&b""[..]);
        let mut header = ResponseHeader::new();
        assert!(header.read(&mut reader).await.unwrap_err().is_end_of_stream());
    }
}
