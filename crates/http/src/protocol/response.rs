//! HTTP response: header and body, plus whole-body compression and file bodies.

use std::fmt;
use std::io;
use std::path::Path;

use bytes::BytesMut;
use bytes::buf::Writer;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, trace};

use crate::connection::{MessageReader, MessageWriter};
use crate::pool::BufferPool;
use crate::protocol::body::{BodyStream, MessageBody};
use crate::protocol::compress::ContentCoding;
use crate::protocol::header::{ACCEPT_ENCODING, CONTENT_ENCODING, VARY};
use crate::protocol::{BodyLength, ParseError, ResponseHeader, SendError};

/// An HTTP response.
///
/// ```
/// use rapid_http::connection::MessageWriter;
/// use rapid_http::protocol::Response;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let mut response = Response::new();
/// response.header_mut().set_content_type(b"text/plain");
/// response.set_body(b"hello");
///
/// let mut writer = MessageWriter::new(Vec::new());
/// response.write_to(&mut writer).await.unwrap();
///
/// let out = String::from_utf8(writer.into_inner()).unwrap();
/// assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(out.ends_with("Content-Length: 5\r\n\r\nhello"));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct Response {
    header: ResponseHeader,
    body: MessageBody,

    /// Answers a `HEAD` request: the body is neither read nor written.
    skip_body: bool,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a response whose body buffer is borrowed from `pool` and handed back on drop.
    pub fn with_pool(pool: &BufferPool) -> Self {
        Self { body: MessageBody::with_buffer(pool.acquire()), ..Self::default() }
    }

    #[inline]
    pub fn header(&self) -> &ResponseHeader {
        &self.header
    }

    #[inline]
    pub fn header_mut(&mut self) -> &mut ResponseHeader {
        &mut self.header
    }

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.header.status_code()
    }

    pub fn set_status_code(&mut self, status_code: u16) {
        self.header.set_status_code(status_code);
    }

    pub fn connection_close(&self) -> bool {
        self.header.connection_close()
    }

    pub fn set_connection_close(&mut self) {
        self.header.set_connection_close();
    }

    #[inline]
    pub fn skip_body(&self) -> bool {
        self.skip_body
    }

    /// Marks the response as answering a `HEAD` request.
    pub fn set_skip_body(&mut self, skip_body: bool) {
        self.skip_body = skip_body;
    }

    /// The body, reading a body stream to its end first.
    pub async fn body(&mut self) -> io::Result<&[u8]> {
        self.body.drain().await?;
        Ok(self.body.bytes())
    }

    #[inline]
    pub fn body_bytes(&self) -> &[u8] {
        self.body.bytes()
    }

    pub fn set_body(&mut self, body: &[u8]) {
        self.body.set(body);
    }

    pub fn append_body(&mut self, body: &[u8]) {
        self.body.append(body);
    }

    pub fn reset_body(&mut self) {
        self.body.reset();
    }

    pub fn body_writer(&mut self) -> Writer<&mut BytesMut> {
        self.body.writer()
    }

    /// Sets a body read from `stream` when the response is written.
    ///
    /// Without a `size`, from the caller or the stream itself, the body is sent chunked.
    pub fn set_body_stream<S>(&mut self, stream: S, size: Option<u64>)
    where
        S: BodyStream + 'static,
    {
        let size = size.or_else(|| stream.size_hint());
        self.body.set_stream(Box::new(stream));
        match size {
            Some(size) => self.header.set_content_length(i64::try_from(size).unwrap_or(i64::MAX)),
            None => self.header.set_content_length(-1),
        }
    }

    /// Streams the file at `path` as the body.
    ///
    /// Sets `Last-Modified` from the file and, unless one is already set, a `Content-Type`
    /// guessed from the extension.
    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("not a file: {}", path.display())));
        }

        if let Ok(modified) = metadata.modified() {
            self.header.set_last_modified(modified);
        }
        if self.header.content_type.is_empty() {
            let mime = content_type_for(path);
            let content_type: &str = mime.as_ref();
            self.header.set_content_type(content_type.as_bytes());
        }

        trace!(path = %path.display(), size = metadata.len(), "sending file");
        self.set_body_stream(file, Some(metadata.len()));
        Ok(())
    }

    /// Compresses the body with gzip at `level` (0 to 9).
    ///
    /// Does nothing when the response already has a `Content-Encoding`.
    pub async fn gzip_body(&mut self, level: u32) -> io::Result<()> {
        self.compress_body(ContentCoding::Gzip, level).await
    }

    /// Compresses the body with deflate at `level` (0 to 9).
    ///
    /// Does nothing when the response already has a `Content-Encoding`.
    pub async fn deflate_body(&mut self, level: u32) -> io::Result<()> {
        self.compress_body(ContentCoding::Deflate, level).await
    }

    async fn compress_body(&mut self, coding: ContentCoding, level: u32) -> io::Result<()> {
        if self.header.peek(CONTENT_ENCODING).is_some() {
            return Ok(());
        }
        self.body.drain().await?;

        let mut encoded = BytesMut::with_capacity(self.body.len() / 2);
        coding.append_encoded(&mut encoded, self.body.bytes(), level)?;
        self.body.set(&encoded);

        self.header.set_canonical(CONTENT_ENCODING, coding.name().as_bytes());
        self.header.set_canonical(VARY, ACCEPT_ENCODING);
        Ok(())
    }

    /// The gunzipped body.
    pub fn body_gunzip(&self) -> io::Result<BytesMut> {
        let mut decoded = BytesMut::new();
        ContentCoding::Gzip.append_decoded(&mut decoded, self.body.bytes())?;
        Ok(decoded)
    }

    /// The inflated body.
    pub fn body_inflate(&self) -> io::Result<BytesMut> {
        let mut decoded = BytesMut::new();
        ContentCoding::Deflate.append_decoded(&mut decoded, self.body.bytes())?;
        Ok(decoded)
    }

    /// Reads a response from `reader`, skipping any `100 Continue` interim responses.
    ///
    /// The body is left unread for statuses that cannot carry one and when
    /// [`skip_body`](Self::skip_body) is set. On failure the response is reset.
    pub async fn read<R>(&mut self, reader: &mut MessageReader<R>) -> Result<(), ParseError>
    where
        R: AsyncRead + Unpin,
    {
        self.body.reset();
        loop {
            self.header.read(reader).await?;
            if self.header.status_code() != 100 {
                break;
            }
            trace!("skipping 100 Continue");
        }

        if self.skip_body || self.header.must_skip_content_length() {
            return Ok(());
        }

        let max_body_size = reader.limits().max_body_size as u64;
        let length = BodyLength::from_content_length(self.header.content_length());
        if let Err(e) = reader.read_body(length, max_body_size, self.body.buffer_mut()).await {
            error!(cause = %e, status = self.header.status_code(), "failed to read response body");
            self.reset();
            return Err(e);
        }

        let body_size = self.body.len();
        trace!(body_size, identity = length.is_identity(), "read response body");
        self.header.set_content_length(i64::try_from(body_size).unwrap_or(i64::MAX));
        Ok(())
    }

    /// Serializes the response into `writer`, without flushing the transport.
    ///
    /// A body stream without a known size is sent chunked. The body is not written for
    /// [`skip_body`](Self::skip_body) responses and statuses that forbid one.
    pub async fn write<W>(&mut self, writer: &mut MessageWriter<W>) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        let send_body = !self.skip_body && !self.header.must_skip_content_length();

        if let Some(mut stream) = self.body.take_stream() {
            let size = u64::try_from(self.header.content_length()).ok();
            if size.is_none() {
                self.header.set_content_length(-1);
            }
            if !send_body {
                stream.close();
                return self.header.write_to(writer).await;
            }
            if let Err(e) = self.header.write_to(writer).await {
                stream.close();
                return Err(e);
            }
            return writer.write_body_stream(&mut stream, size).await;
        }

        let body_size = self.body.len();
        if send_body || body_size > 0 {
            self.header.set_content_length(i64::try_from(body_size).unwrap_or(i64::MAX));
        }
        self.header.write_to(writer).await?;
        if send_body {
            writer.write_bytes(self.body.bytes()).await?;
        }
        Ok(())
    }

    /// Writes the response and flushes `writer`.
    pub async fn write_to<W>(&mut self, writer: &mut MessageWriter<W>) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        self.write(writer).await?;
        writer.flush().await
    }

    /// Deep-copies header and buffered body into `dst`. A body stream is never copied.
    pub fn copy_to(&self, dst: &mut Response) {
        self.header.copy_to(&mut dst.header);
        dst.body.set(self.body.bytes());
        dst.skip_body = self.skip_body;
    }

    /// Clears the response for reuse.
    pub fn reset(&mut self) {
        self.header.reset();
        self.body.reset();
        self.skip_body = false;
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        f.write_str(&String::from_utf8_lossy(self.body.bytes()))
    }
}

fn content_type_for(path: &Path) -> mime::Mime {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("js" | "mjs") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("json") => mime::APPLICATION_JSON,
        Some("xml") => mime::TEXT_XML,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("svg") => mime::IMAGE_SVG,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use std::io::Write;

    async fn read_response(input: &[u8]) -> (Response, Result<(), ParseError>) {
        let mut reader = MessageReader::new(input);
        let mut response = Response::new();
        let result = response.read(&mut reader).await;
        (response, result)
    }

    async fn write_response(response: &mut Response) -> String {
        let mut writer = MessageWriter::new(Vec::new());
        response.write_to(&mut writer).await.unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn test_read_skips_continue() {
        let input = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        let (response, result) = read_response(input).await;
        result.unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body_bytes(), b"ok");
    }

    #[tokio::test]
    async fn test_read_chunked() {
        let input = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n";
        let (mut response, result) = read_response(input).await;
        result.unwrap();
        assert_eq!(response.body_bytes(), b"abcde");
        assert_eq!(response.header().content_length(), 5);
        assert_eq!(response.header_mut().peek(b"Transfer-Encoding"), None);
    }

    #[tokio::test]
    async fn test_read_until_close() {
        let (response, result) = read_response(b"HTTP/1.1 200 OK\r\n\r\nall of it").await;
        result.unwrap();
        assert_eq!(response.body_bytes(), b"all of it");
        assert!(response.connection_close());
    }

    #[tokio::test]
    async fn test_read_without_body() {
        let input = b"HTTP/1.1 304 Not Modified\r\nContent-Length: 100\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nx";
        let mut reader = MessageReader::new(&input[..]);
        let mut response = Response::new();

        response.read(&mut reader).await.unwrap();
        assert_eq!(response.status_code(), 304);
        assert!(response.body_bytes().is_empty());

        response.read(&mut reader).await.unwrap();
        assert_eq!(response.body_bytes(), b"x");
    }

    #[tokio::test]
    async fn test_read_head_response() {
        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n";
        let mut reader = MessageReader::new(&input[..]);
        let mut response = Response::new();
        response.set_skip_body(true);
        response.read(&mut reader).await.unwrap();
        assert!(response.body_bytes().is_empty());
        assert_eq!(response.header().content_length(), 100);
    }

    #[tokio::test]
    async fn test_read_failure_resets() {
        let (response, result) = read_response(b"HTTP/1.1 404 Not Found\r\nContent-Length: 10\r\n\r\nshort").await;
        assert!(matches!(result, Err(ParseError::UnexpectedEof { read: 5 })));
        assert_eq!(response.status_code(), 200);
        assert!(response.body_bytes().is_empty());

        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123456789";
        let mut reader = MessageReader::with_limits(&input[..], Limits::default().with_max_body_size(3));
        let mut response = Response::new();
        assert!(matches!(response.read(&mut reader).await, Err(ParseError::BodyTooLarge { max_size: 3 })));
    }

    #[tokio::test]
    async fn test_write_body() {
        let mut response = Response::new();
        response.set_status_code(201);
        write!(response.body_writer(), "{{\"id\":{}}}", 7).unwrap();
        response.header_mut().set_content_type(b"application/json");

        let out = write_response(&mut response).await;
        assert!(out.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(out.ends_with("Content-Type: application/json\r\nContent-Length: 8\r\n\r\n{\"id\":7}"), "{out}");
    }

    #[tokio::test]
    async fn test_write_head_response() {
        let mut response = Response::new();
        response.set_skip_body(true);
        response.header_mut().set_content_length(42);
        let out = write_response(&mut response).await;
        assert!(out.ends_with("Content-Length: 42\r\n\r\n"), "{out}");
    }

    #[tokio::test]
    async fn test_write_unsized_stream_is_chunked() {
        let mut response = Response::new();
        response.set_body_stream(tokio::io::BufReader::new(&b"streamed"[..]), None);
        let out = write_response(&mut response).await;
        assert!(out.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!out.contains("Content-Length"));
        assert!(out.ends_with("\r\n\r\n8\r\nstreamed\r\n0\r\n\r\n"), "{out}");
    }

    #[tokio::test]
    async fn test_no_content_has_no_body() {
        let mut response = Response::new();
        response.set_status_code(204);
        response.set_body(b"ignored");
        let out = write_response(&mut response).await;
        assert!(!out.contains("ignored"));
        assert!(!out.contains("Content-Length"));
    }

    #[tokio::test]
    async fn test_gzip_body() {
        let text = b"compress me ".repeat(50);
        let mut response = Response::new();
        response.set_body(&text);
        response.gzip_body(6).await.unwrap();

        assert!(response.body_bytes().len() < text.len());
        assert_eq!(response.header_mut().peek(b"content-encoding"), Some(&b"gzip"[..]));
        assert_eq!(response.header_mut().peek(b"Vary"), Some(&b"Accept-Encoding"[..]));
        assert_eq!(&response.body_gunzip().unwrap()[..], &text[..]);

        // already encoded
        let compressed = response.body_bytes().to_vec();
        response.deflate_body(6).await.unwrap();
        assert_eq!(response.body_bytes(), &compressed[..]);
    }

    #[tokio::test]
    async fn test_deflate_body() {
        let mut response = Response::new();
        response.set_body(b"inflate me");
        response.deflate_body(9).await.unwrap();
        assert_eq!(&response.body_inflate().unwrap()[..], b"inflate me");
    }

    #[tokio::test]
    async fn test_send_file() {
        let path = std::env::temp_dir().join(format!("rapid-http-send-file-{}.html", std::process::id()));
        tokio::fs::write(&path, b"<p>hi</p>").await.unwrap();

        let mut response = Response::new();
        response.send_file(&path).await.unwrap();
        let out = write_response(&mut response).await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(out.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(out.contains("Last-Modified: "));
        assert!(out.ends_with("\r\n\r\n<p>hi</p>"));
        assert!(out.contains("Content-Length: 9\r\n"));

        assert!(response.send_file(std::env::temp_dir()).await.is_err());
        assert!(response.send_file("/definitely/not/here").await.is_err());
    }

    #[test]
    fn test_copy_to() {
        let mut response = Response::new();
        response.set_status_code(404);
        response.set_body(b"missing");

        let mut copy = Response::new();
        response.copy_to(&mut copy);
        response.reset();

        assert_eq!(copy.status_code(), 404);
        assert_eq!(copy.body_bytes(), b"missing");
        assert_eq!(response.status_code(), 200);
    }

    #[tokio::test]
    async fn test_pooled_body() {
        let pool = BufferPool::new(4);
        {
            let mut response = Response::with_pool(&pool);
            response.set_body(b"pooled");
            assert_eq!(write_response(&mut response).await.split("\r\n\r\n").nth(1), Some("pooled"));
        }
        assert_eq!(pool.idle(), 1);

        let response = Response::with_pool(&pool);
        assert_eq!(pool.idle(), 0);
        assert!(response.body_bytes().is_empty());
    }
}
