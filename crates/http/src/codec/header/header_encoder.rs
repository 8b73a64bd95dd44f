//! HTTP header encoder implementation for serializing request and response headers
//!
//! Headers are appended to a [`BytesMut`] in wire format: the first line, the dedicated fields,
//! the generic fields in insertion order, and the terminating empty line. Body framing fields
//! are written exactly as the header's Content-Length state describes them, so a serialized
//! header parses back to the same framing and connection semantics.

use std::fmt;

use bytes::{BufMut, BytesMut};
use tokio::io::AsyncWrite;

use crate::connection::MessageWriter;
use crate::protocol::date::DateService;
use crate::protocol::deferred::State;
use crate::protocol::header::{
    CLOSE, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, DATE, DEFAULT_SERVER_NAME, FORM_CONTENT_TYPE, HOST,
    SERVER, SET_COOKIE, USER_AGENT, append_request_cookies,
};
use crate::protocol::status::status_line;
use crate::protocol::{RequestHeader, ResponseHeader, SendError};

/// Initial room reserved for a serialized header
const INIT_HEADER_SIZE: usize = 512;

impl RequestHeader {
    /// Appends the serialized header to `dst`.
    ///
    /// A deferred field block that was never touched is written back verbatim.
    pub fn append_bytes(&self, dst: &mut BytesMut) {
        dst.reserve(INIT_HEADER_SIZE);
        dst.put_slice(self.method());
        dst.put_u8(b' ');
        dst.put_slice(self.request_uri());
        dst.put_slice(b" HTTP/1.1\r\n");

        if self.raw_state == State::Unparsed && !self.raw_headers.is_empty() {
            dst.put_slice(&self.raw_headers);
            return;
        }

        append_field(dst, USER_AGENT, &self.user_agent);
        append_field(dst, HOST, &self.host);
        if self.no_body() {
            append_field(dst, CONTENT_TYPE, &self.content_type);
        } else {
            let content_type = if self.content_type.is_empty() { FORM_CONTENT_TYPE } else { &self.content_type };
            append_field(dst, CONTENT_TYPE, content_type);
            append_field(dst, CONTENT_LENGTH, &self.content_length_bytes);
        }

        for kv in &self.h {
            append_field(dst, kv.key(), kv.value());
        }

        if !self.cookies.is_empty() {
            dst.put_slice(COOKIE);
            dst.put_slice(b": ");
            append_request_cookies(dst, &self.cookies);
            dst.put_slice(b"\r\n");
        }

        if self.connection_close {
            append_field(dst, CONNECTION, CLOSE);
        }
        dst.put_slice(b"\r\n");
    }

    /// Serializes the header into the buffer of `writer`.
    pub async fn write_to<W>(&self, writer: &mut MessageWriter<W>) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        self.append_bytes(writer.buffer_mut());
        writer.flush_if_full().await
    }
}

impl ResponseHeader {
    /// Appends the serialized header to `dst`, stamped with the current `Date`.
    pub fn append_bytes(&self, dst: &mut BytesMut) {
        dst.reserve(INIT_HEADER_SIZE);
        dst.put_slice(&status_line(self.status_code()));

        let server = if self.server.is_empty() { DEFAULT_SERVER_NAME } else { &self.server };
        append_field(dst, SERVER, server);
        DateService::global().with_http_date(|date| append_field(dst, DATE, date));

        // a body-less response only names its type when asked to
        if self.content_length() != 0 || !self.content_type.is_empty() {
            append_field(dst, CONTENT_TYPE, self.content_type());
        }
        if !self.must_skip_content_length() {
            append_field(dst, CONTENT_LENGTH, &self.content_length_bytes);
        }

        for kv in &self.h {
            if kv.key() != DATE {
                append_field(dst, kv.key(), kv.value());
            }
        }
        for kv in &self.cookies {
            append_field(dst, SET_COOKIE, kv.value());
        }

        if self.connection_close {
            append_field(dst, CONNECTION, CLOSE);
        }
        dst.put_slice(b"\r\n");
    }

    /// Serializes the header into the buffer of `writer`.
    pub async fn write_to<W>(&self, writer: &mut MessageWriter<W>) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        self.append_bytes(writer.buffer_mut());
        writer.flush_if_full().await
    }
}

impl fmt::Display for RequestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = BytesMut::new();
        self.append_bytes(&mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

impl fmt::Display for ResponseHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = BytesMut::new();
        self.append_bytes(&mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Writes `key: value\r\n`, skipping empty values.
#[inline]
fn append_field(dst: &mut BytesMut, key: &[u8], value: &[u8]) {
    if value.is_empty() {
        return;
    }
    dst.put_slice(key);
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize_response(header: &ResponseHeader) -> String {
        let mut buf = BytesMut::new();
        header.append_bytes(&mut buf);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let mut header = RequestHeader::new();
        header.set_method(b"POST");
        header.set_request_uri(b"/upload?x=1");
        header.set_host(b"example.com");
        header.set_user_agent(b"rapid");
        header.set_content_length(3);
        header.set(b"x-trace", b"abc");
        header.set_cookie(b"a", b"1");
        header.set_cookie(b"b", b"2");
        header.set_connection_close();

        let expected = concat!(
            "POST /upload?x=1 HTTP/1.1\r\n",
            "User-Agent: rapid\r\n",
            "Host: example.com\r\n",
            "Content-Type: application/x-www-form-urlencoded\r\n",
            "Content-Length: 3\r\n",
            "X-Trace: abc\r\n",
            "Cookie: a=1; b=2\r\n",
            "Connection: close\r\n",
            "\r\n",
        );
        assert_eq!(header.to_string(), expected);
    }

    #[test]
    fn test_get_request_without_body_fields() {
        let mut header = RequestHeader::new();
        header.set_host(b"a");
        assert_eq!(header.to_string(), "GET / HTTP/1.1\r\nHost: a\r\n\r\n");
    }

    #[test]
    fn test_untouched_raw_request_is_written_verbatim() {
        let input = b"GET /x HTTP/1.1\r\nhost: a\r\nx-weird-CASE: 1\r\n\r\n";
        let mut header = RequestHeader::new();
        header.parse(input).unwrap().unwrap();
        assert_eq!(header.to_string().as_bytes(), input);
    }

    #[test]
    fn test_response_serialization() {
        let mut header = ResponseHeader::new();
        header.set_status_code(404);
        header.set_content_type(b"text/html");
        header.set_content_length(5);
        header.set(b"X-Id", b"7");
        header.set_cookie(b"sid=1; Path=/");

        let out = serialize_response(&header);
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\nServer: rapid-http\r\nDate: "));
        assert!(out.ends_with(concat!(
            "Content-Type: text/html\r\n",
            "Content-Length: 5\r\n",
            "X-Id: 7\r\n",
            "Set-Cookie: sid=1; Path=/\r\n",
            "\r\n",
        )));
    }

    #[test]
    fn test_no_content_response() {
        let mut header = ResponseHeader::new();
        header.parse(b"HTTP/1.1 204 No Content\r\nContent-Length: 10\r\n\r\n").unwrap();

        let out = serialize_response(&header);
        assert!(!out.contains("Content-Length"));
        assert!(!out.contains("Content-Type"));

        let mut parsed = ResponseHeader::new();
        parsed.parse(out.as_bytes()).unwrap().unwrap();
        assert_eq!(parsed.status_code(), 204);
        assert_eq!(parsed.content_length(), 0);
    }

    #[test]
    fn test_response_round_trip_keeps_framing() {
        let framings = [
            ("", -2),
            ("Transfer-Encoding: chunked\r\n", -1),
            ("Content-Length: 5\r\n", 5),
            ("Transfer-Encoding: identity\r\n", -2),
        ];

        for (framing, content_length) in framings {
            for version in ["HTTP/1.0", "HTTP/1.1"] {
                for connection in ["", "Connection: close\r\n", "Connection: keep-alive\r\n"] {
                    let input = format!("{version} 200 OK\r\n{framing}{connection}\r\n");
                    let mut header = ResponseHeader::new();
                    header.parse(input.as_bytes()).unwrap().unwrap();

                    let close = content_length == -2
                        || connection.contains("close")
                        || (version == "HTTP/1.0" && !connection.contains("keep-alive"));
                    assert_eq!(header.content_length(), content_length, "{input:?}");
                    assert_eq!(header.connection_close(), close, "{input:?}");

                    let mut reparsed = ResponseHeader::new();
                    reparsed.parse(header.to_string().as_bytes()).unwrap().unwrap();
                    assert_eq!(reparsed.content_length(), content_length, "{input:?}");
                    assert_eq!(reparsed.connection_close(), close, "{input:?}");
                }
            }
        }
    }

    #[test]
    fn test_request_round_trip_keeps_framing() {
        let framings = [("", 0), ("Transfer-Encoding: chunked\r\n", -1), ("Content-Length: 5\r\n", 5)];

        for (framing, content_length) in framings {
            for version in ["HTTP/1.0", "HTTP/1.1"] {
                for connection in ["", "Connection: close\r\n", "Connection: keep-alive\r\n"] {
                    let input = format!("POST /p {version}\r\nHost: h\r\n{framing}{connection}\r\n");
                    let mut header = RequestHeader::new();
                    header.parse(input.as_bytes()).unwrap().unwrap();

                    let close =
                        connection.contains("close") || (version == "HTTP/1.0" && !connection.contains("keep-alive"));
                    assert_eq!(header.content_length(), content_length, "{input:?}");
                    assert_eq!(header.connection_close(), close, "{input:?}");

                    let mut reparsed = RequestHeader::new();
                    reparsed.parse(header.to_string().as_bytes()).unwrap().unwrap();
                    assert_eq!(reparsed.content_length(), content_length, "{input:?}");
                    assert_eq!(reparsed.connection_close(), close, "{input:?}");
                    assert_eq!(reparsed.host(), b"h");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_write_to_writer() {
        let mut writer = MessageWriter::new(Vec::new());
        let mut header = RequestHeader::new();
        header.set_host(b"a");
        header.write_to(&mut writer).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(writer.get_mut().as_slice(), b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
    }
}
