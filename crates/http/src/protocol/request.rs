//! HTTP request: header, lazily parsed URI and form arguments, and body.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use bytes::buf::Writer;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, trace};

use crate::connection::{MessageReader, MessageWriter};
use crate::ensure;
use crate::pool::BufferPool;
use crate::protocol::body::{BodyStream, MessageBody};
use crate::protocol::compress::ContentCoding;
use crate::protocol::deferred::Deferred;
use crate::protocol::header::{CONTENT_ENCODING, FORM_CONTENT_TYPE};
use crate::protocol::multipart::{MultipartCodec, MultipartForm};
use crate::protocol::{Args, BodyLength, CONTENT_LENGTH_IDENTITY, ParseError, RequestHeader, SendError, Uri};

/// File content of a multipart form kept in memory while decoding, per form.
pub const DEFAULT_MAX_IN_MEMORY_FILE_SIZE: usize = 16 * 1024 * 1024;

/// An HTTP request.
///
/// A request is meant to be reused: [`reset`](Self::reset) and every [`read`](Self::read) keep
/// the allocated buffers around for the next message.
///
/// # Example
///
/// ```
/// use rapid_http::connection::MessageReader;
/// use rapid_http::protocol::Request;
///
/// # tokio_test_block(async {
/// let input = b"POST /login?next=%2Fhome HTTP/1.1\r\nHost: example.com\r\n\
///     Content-Type: application/x-www-form-urlencoded\r\nContent-Length: 13\r\n\r\nuser=me&pw=42";
/// let mut reader = MessageReader::new(&input[..]);
///
/// let mut request = Request::new();
/// request.read(&mut reader).await.unwrap();
///
/// assert_eq!(request.uri().path(), b"/login");
/// assert_eq!(request.uri().query_args().peek(b"next"), Some(&b"/home"[..]));
/// assert_eq!(request.post_args().peek(b"user"), Some(&b"me"[..]));
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Default)]
pub struct Request {
    header: RequestHeader,
    uri: Deferred<Uri>,
    post_args: Deferred<Args>,
    body: MessageBody,

    multipart_form: Option<MultipartForm>,
    multipart_boundary: String,
    multipart_codec: Option<Arc<dyn MultipartCodec>>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request whose body buffer is borrowed from `pool` and handed back on drop.
    pub fn with_pool(pool: &BufferPool) -> Self {
        Self { body: MessageBody::with_buffer(pool.acquire()), ..Self::default() }
    }

    /// Sets the codec used to decode and encode `multipart/form-data` bodies.
    pub fn set_multipart_codec(&mut self, codec: Arc<dyn MultipartCodec>) {
        self.multipart_codec = Some(codec);
    }

    #[inline]
    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    #[inline]
    pub fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    /// The request URI, parsed from the header on first access.
    pub fn uri(&mut self) -> &mut Uri {
        let header = &self.header;
        self.uri.get_or_parse(|uri| uri.parse(Some(header.host()), header.request_uri()))
    }

    pub fn set_request_uri(&mut self, request_uri: &[u8]) {
        self.header.set_request_uri(request_uri);
        self.uri.invalidate();
    }

    /// The arguments of an `application/x-www-form-urlencoded` body, parsed on first access.
    ///
    /// Empty for any other content type.
    pub fn post_args(&mut self) -> &mut Args {
        let is_form = self.header.content_type() == FORM_CONTENT_TYPE;
        let body = &self.body;
        self.post_args.get_or_parse(|args| {
            if is_form {
                args.parse(body.bytes());
            } else {
                args.reset();
            }
        })
    }

    pub fn connection_close(&mut self) -> bool {
        self.header.connection_close()
    }

    pub fn set_connection_close(&mut self) {
        self.header.set_connection_close();
    }

    /// Returns true if the client waits for `100 Continue` before sending the body.
    pub fn may_continue(&mut self) -> bool {
        self.header.may_continue()
    }

    /// The body, reading a body stream to its end first.
    pub async fn body(&mut self) -> io::Result<&[u8]> {
        self.body.drain().await?;
        Ok(self.body.bytes())
    }

    /// The buffered body, empty while a body stream is set.
    #[inline]
    pub fn body_bytes(&self) -> &[u8] {
        self.body.bytes()
    }

    pub fn set_body(&mut self, body: &[u8]) {
        self.body.set(body);
        self.post_args.invalidate();
    }

    pub fn append_body(&mut self, body: &[u8]) {
        self.body.append(body);
        self.post_args.invalidate();
    }

    pub fn reset_body(&mut self) {
        self.body.reset();
        self.post_args.invalidate();
    }

    /// An [`io::Write`] appending to the body.
    pub fn body_writer(&mut self) -> Writer<&mut BytesMut> {
        self.post_args.invalidate();
        self.body.writer()
    }

    /// Sets a body read from `stream` when the request is written.
    ///
    /// With a known `size`, or a stream reporting one, the body is sent with that
    /// `Content-Length` and the stream must yield exactly as many bytes. Otherwise it is sent chunked.
    pub fn set_body_stream<S>(&mut self, stream: S, size: Option<u64>)
    where
        S: BodyStream + 'static,
    {
        let size = size.or_else(|| stream.size_hint());
        self.body.set_stream(Box::new(stream));
        self.post_args.invalidate();
        match size {
            Some(size) => self.header.set_content_length(i64::try_from(size).unwrap_or(i64::MAX)),
            None => self.header.set_content_length(-1),
        }
    }

    /// Decodes the `multipart/form-data` body, once.
    ///
    /// A gzip `Content-Encoding` is undone first; any other encoding is rejected.
    ///
    /// # Errors
    ///
    /// [`ParseError::NoMultipartForm`] if the content type carries no multipart boundary.
    pub fn multipart_form(&mut self) -> Result<&MultipartForm, ParseError> {
        if self.multipart_form.is_none() {
            let form = self.decode_multipart_form()?;
            self.multipart_form = Some(form);
        }
        self.multipart_form.as_ref().ok_or(ParseError::NoMultipartForm)
    }

    fn decode_multipart_form(&mut self) -> Result<MultipartForm, ParseError> {
        let boundary = self.header.multipart_form_boundary().ok_or(ParseError::NoMultipartForm)?;
        let codec = self.multipart_codec.as_ref().ok_or_else(|| ParseError::multipart("no multipart codec configured"))?;

        let form = match self.header.peek(CONTENT_ENCODING) {
            None => codec.decode(self.body.bytes(), &boundary, DEFAULT_MAX_IN_MEMORY_FILE_SIZE)?,
            Some(b"gzip") => {
                let mut body = BytesMut::new();
                ContentCoding::Gzip
                    .append_decoded(&mut body, self.body.bytes())
                    .map_err(|e| ParseError::multipart(format!("cannot gunzip request body: {e}")))?;
                codec.decode(&body, &boundary, DEFAULT_MAX_IN_MEMORY_FILE_SIZE)?
            }
            Some(encoding) => {
                return Err(ParseError::multipart(format!(
                    "unsupported Content-Encoding: {}",
                    String::from_utf8_lossy(encoding)
                )));
            }
        };
        self.multipart_boundary = boundary;
        Ok(form)
    }

    /// Sets a multipart form to be sent as the body when no other body is set.
    pub fn set_multipart_form(&mut self, form: MultipartForm, boundary: &str) {
        self.header.set_multipart_form_boundary(boundary);
        self.multipart_boundary.clear();
        self.multipart_boundary.push_str(boundary);
        self.multipart_form = Some(form);
    }

    /// Drops the decoded multipart form along with its file contents.
    pub fn remove_multipart_form_files(&mut self) {
        self.multipart_form = None;
        self.multipart_boundary.clear();
    }

    /// Reads a request, its body included, from `reader`.
    ///
    /// The body is not read for `GET` and `HEAD` requests, nor when the client expects
    /// `100 Continue`: call [`continue_read_body`](Self::continue_read_body) after answering it.
    pub async fn read<R>(&mut self, reader: &mut MessageReader<R>) -> Result<(), ParseError>
    where
        R: AsyncRead + Unpin,
    {
        self.reset_skip_header();
        self.header.read(reader).await?;

        if self.header.no_body() {
            return Ok(());
        }
        if self.header.may_continue() {
            trace!("request expects 100-continue, body left unread");
            return Ok(());
        }
        self.continue_read_body(reader).await
    }

    /// Reads the body announced by an already read header, limited by the reader's `max_body_size`.
    ///
    /// On failure the request is reset.
    pub async fn continue_read_body<R>(&mut self, reader: &mut MessageReader<R>) -> Result<(), ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let content_length = self.header.content_length();
        if content_length == CONTENT_LENGTH_IDENTITY {
            // a request body never runs until the connection closes
            self.header.set_content_length(0);
            return Ok(());
        }

        let max_body_size = reader.limits().max_body_size as u64;
        let length = BodyLength::from_content_length(content_length);
        if let Err(e) = reader.read_body(length, max_body_size, self.body.buffer_mut()).await {
            error!(cause = %e, "failed to read request body");
            self.reset();
            return Err(e);
        }

        let body_size = self.body.len();
        trace!(body_size, chunked = length.is_chunked(), "read request body");
        self.header.set_content_length(i64::try_from(body_size).unwrap_or(i64::MAX));
        Ok(())
    }

    /// Serializes the request into `writer`, without flushing the transport.
    ///
    /// `Host` and the request URI are taken from the parsed URI when it has been accessed, or
    /// when the header has no `Host`. A body stream is consumed and closed.
    ///
    /// # Errors
    ///
    /// - [`SendError::MissingHost`] if no host is known
    /// - [`SendError::BodyNotAllowed`] for a non-empty body on a `GET` or `HEAD` request
    pub async fn write<W>(&mut self, writer: &mut MessageWriter<W>) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        if self.header.host().is_empty() || self.uri.is_parsed() {
            let header = &self.header;
            let uri = self.uri.get_or_parse(|uri| uri.parse(Some(header.host()), header.request_uri()));
            ensure!(!uri.host().is_empty(), SendError::MissingHost);
            self.header.set_host(uri.host());
            self.header.set_request_uri(uri.request_uri());
        }

        if let Some(mut stream) = self.body.take_stream() {
            let size = u64::try_from(self.header.content_length()).ok();
            if size.is_none() {
                self.header.set_content_length(-1);
            }
            if let Err(e) = self.header.write_to(writer).await {
                stream.close();
                return Err(e);
            }
            return writer.write_body_stream(&mut stream, size).await;
        }

        let mut generated = BytesMut::new();
        if self.body.is_empty() {
            if let Some(form) = &self.multipart_form {
                let codec =
                    self.multipart_codec.as_ref().ok_or_else(|| SendError::multipart("no multipart codec configured"))?;
                codec.encode(form, &self.multipart_boundary, &mut generated)?;
                self.header.set_multipart_form_boundary(&self.multipart_boundary);
            } else if let Some(args) = self.post_args.parsed() {
                args.append_bytes(&mut generated);
            }
        }
        let body = if self.body.is_empty() { &generated[..] } else { self.body.bytes() };

        let has_body = !self.header.no_body();
        if has_body {
            self.header.set_content_length(i64::try_from(body.len()).unwrap_or(i64::MAX));
        } else if !body.is_empty() {
            return Err(SendError::body_not_allowed(self.header.method()));
        }

        self.header.write_to(writer).await?;
        if has_body {
            writer.write_bytes(body).await?;
        }
        Ok(())
    }

    /// Writes the request and flushes `writer`.
    pub async fn write_to<W>(&mut self, writer: &mut MessageWriter<W>) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        self.write(writer).await?;
        writer.flush().await
    }

    /// Deep-copies header, URI, form arguments and buffered body into `dst`.
    ///
    /// A body stream is never copied.
    pub fn copy_to(&self, dst: &mut Request) {
        self.header.copy_to(&mut dst.header);
        dst.body.set(self.body.bytes());

        dst.uri.invalidate();
        if let Some(uri) = self.uri.parsed() {
            uri.copy_to(dst.uri.set_parsed());
        }
        dst.post_args.invalidate();
        if let Some(args) = self.post_args.parsed() {
            args.copy_to(dst.post_args.set_parsed());
        }
    }

    /// Clears the request for reuse.
    pub fn reset(&mut self) {
        self.header.reset();
        self.reset_skip_header();
    }

    fn reset_skip_header(&mut self) {
        self.uri.invalidate();
        self.post_args.invalidate();
        self.body.reset();
        self.remove_multipart_form_files();
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("header", &self.header)
            .field("body", &self.body)
            .field("multipart_form", &self.multipart_form)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::protocol::multipart::{FilePart, MockMultipartCodec};
    use indoc::indoc;
    use std::io::Cursor;
    use std::io::Write;
    use tokio::io::AsyncReadExt;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).with_test_writer().try_init();
    }

    async fn read_request(input: &[u8]) -> (Request, Result<(), ParseError>) {
        init_tracing();
        let mut reader = MessageReader::new(input);
        let mut request = Request::new();
        let result = request.read(&mut reader).await;
        (request, result)
    }

    async fn write_request(request: &mut Request) -> Result<String, SendError> {
        let mut writer = MessageWriter::new(Vec::new());
        request.write_to(&mut writer).await?;
        Ok(String::from_utf8(writer.into_inner()).unwrap())
    }

    #[tokio::test]
    async fn test_read_fixed_body() {
        let (mut request, result) = read_request(b"PUT /x HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nhello").await;
        result.unwrap();
        assert!(request.header_mut().is_put());
        assert_eq!(request.body().await.unwrap(), b"hello");
        assert_eq!(request.header_mut().content_length(), 5);
    }

    #[tokio::test]
    async fn test_pooled_body() {
        let pool = BufferPool::new(4);
        {
            let mut reader = MessageReader::new(&b"POST /x HTTP/1.1\r\nHost: a\r\nContent-Length: 2\r\n\r\nok"[..]);
            let mut request = Request::with_pool(&pool);
            request.read(&mut reader).await.unwrap();
            assert_eq!(request.body_bytes(), b"ok");
        }
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_read_chunked_body() {
        let input = indoc! {"
        POST /upload HTTP/1.1
        Host: a
        Transfer-Encoding: chunked

        4\r
        Wiki\r
        5\r
        pedia\r
        0\r
        \r
        "};
        let (mut request, result) = read_request(input.as_bytes()).await;
        result.unwrap();
        assert_eq!(request.body_bytes(), b"Wikipedia");
        assert_eq!(request.header_mut().content_length(), 9);
        assert_eq!(request.header_mut().peek(b"Transfer-Encoding"), None);
    }

    #[tokio::test]
    async fn test_pipelined_get_requests() {
        let input = b"GET /first HTTP/1.1\r\nHost: a\r\n\r\nGET /second HTTP/1.1\r\nHost: b\r\n\r\n";
        let mut reader = MessageReader::new(&input[..]);
        let mut request = Request::new();

        request.read(&mut reader).await.unwrap();
        assert_eq!(request.uri().path(), b"/first");
        assert!(request.body_bytes().is_empty());

        request.read(&mut reader).await.unwrap();
        assert_eq!(request.uri().path(), b"/second");
        assert_eq!(request.uri().host(), b"b");
    }

    #[tokio::test]
    async fn test_expect_continue() {
        let input = b"POST / HTTP/1.1\r\nHost: a\r\nExpect: 100-continue\r\nContent-Length: 2\r\n\r\nok";
        let mut reader = MessageReader::new(&input[..]);
        let mut request = Request::new();

        request.read(&mut reader).await.unwrap();
        assert!(request.may_continue());
        assert!(request.body_bytes().is_empty());

        request.continue_read_body(&mut reader).await.unwrap();
        assert_eq!(request.body_bytes(), b"ok");
    }

    #[tokio::test]
    async fn test_short_body_resets_request() {
        let (mut request, result) = read_request(b"POST /x HTTP/1.1\r\nHost: a\r\nContent-Length: 10\r\n\r\n01234").await;
        assert!(matches!(result, Err(ParseError::UnexpectedEof { read: 5 })));
        assert!(request.body_bytes().is_empty());
        assert_eq!(request.header_mut().request_uri(), b"/");
        assert!(request.header().host().is_empty());
    }

    #[tokio::test]
    async fn test_huge_content_length_is_not_preallocated() {
        let (request, result) =
            read_request(b"POST /x HTTP/1.1\r\nHost: a\r\nContent-Length: 999999999999999999\r\n\r\nhello").await;
        assert!(matches!(result, Err(ParseError::UnexpectedEof { read: 5 })));
        assert!(request.body_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let input = b"POST /x HTTP/1.1\r\nHost: a\r\nContent-Length: 10\r\n\r\n0123456789";
        let mut reader = MessageReader::with_limits(&input[..], Limits::default().with_max_body_size(4));
        let mut request = Request::new();
        let result = request.read(&mut reader).await;
        assert!(matches!(result, Err(ParseError::BodyTooLarge { max_size: 4 })));
    }

    #[tokio::test]
    async fn test_post_args_only_for_forms() {
        let (mut request, result) =
            read_request(b"POST / HTTP/1.1\r\nHost: a\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\na=1").await;
        result.unwrap();
        assert!(request.post_args().is_empty());

        request.header_mut().set_content_type(FORM_CONTENT_TYPE);
        request.set_body(b"a=1&b=%20");
        assert_eq!(request.post_args().peek(b"b"), Some(&b" "[..]));
    }

    #[tokio::test]
    async fn test_write_takes_host_from_uri() {
        let mut request = Request::new();
        request.set_request_uri(b"http://Example.COM/some/path?q=1");
        let out = write_request(&mut request).await.unwrap();
        assert_eq!(out, "GET /some/path?q=1 HTTP/1.1\r\nHost: example.com\r\n\r\n");

        let mut request = Request::new();
        request.set_request_uri(b"/relative");
        assert!(matches!(write_request(&mut request).await, Err(SendError::MissingHost)));
    }

    #[tokio::test]
    async fn test_write_body() {
        let mut request = Request::new();
        request.header_mut().set_method(b"POST");
        request.header_mut().set_host(b"a");
        write!(request.body_writer(), "x={}", 1).unwrap();

        let out = write_request(&mut request).await.unwrap();
        assert_eq!(
            out,
            "POST / HTTP/1.1\r\nHost: a\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 3\r\n\r\nx=1"
        );
    }

    #[tokio::test]
    async fn test_write_post_args() {
        let mut request = Request::new();
        request.header_mut().set_method(b"POST");
        request.header_mut().set_host(b"a");
        request.post_args().add(b"k", b"v w");

        let out = write_request(&mut request).await.unwrap();
        assert!(out.ends_with("Content-Length: 7\r\n\r\nk=v%20w"), "{out}");
    }

    #[tokio::test]
    async fn test_body_not_allowed() {
        let mut request = Request::new();
        request.header_mut().set_host(b"a");
        request.set_body(b"oops");
        assert!(matches!(write_request(&mut request).await, Err(SendError::BodyNotAllowed { .. })));
    }

    #[tokio::test]
    async fn test_write_body_stream() {
        let mut request = Request::new();
        request.header_mut().set_method(b"POST");
        request.header_mut().set_host(b"a");
        request.set_body_stream(Cursor::new(b"streamed".to_vec()), None);
        let out = write_request(&mut request).await.unwrap();
        assert!(out.contains("Content-Length: 8\r\n"));
        assert!(out.ends_with("\r\n\r\nstreamed"));

        let mut request = Request::new();
        request.header_mut().set_method(b"POST");
        request.header_mut().set_host(b"a");
        request.set_body_stream(AsyncReadExt::take(tokio::io::repeat(b'z'), 3), None);
        let out = write_request(&mut request).await.unwrap();
        assert!(out.contains("Content-Length: 3\r\n"));
        assert!(out.ends_with("zzz"));
    }

    #[tokio::test]
    async fn test_multipart_form() {
        let mut codec = MockMultipartCodec::new();
        codec.expect_decode().withf(|body, boundary, _| body == b"raw form" && boundary == "xyz").times(1).returning(
            |_, _, _| {
                let mut form = MultipartForm::new();
                form.add_value("name", "value");
                form.add_file("upload", FilePart { file_name: "a.txt".into(), ..Default::default() });
                Ok(form)
            },
        );

        let mut request = Request::new();
        request.set_multipart_codec(Arc::new(codec));
        request.header_mut().set_method(b"POST");
        request.header_mut().set_multipart_form_boundary("xyz");
        request.set_body(b"raw form");

        assert_eq!(request.multipart_form().unwrap().value("name"), Some("value"));
        // decoded once
        assert_eq!(request.multipart_form().unwrap().files["upload"][0].file_name, "a.txt");

        request.remove_multipart_form_files();
        request.header_mut().set_content_type(b"text/plain");
        assert!(matches!(request.multipart_form(), Err(ParseError::NoMultipartForm)));
    }

    #[tokio::test]
    async fn test_write_multipart_form() {
        let mut codec = MockMultipartCodec::new();
        codec.expect_encode().returning(|form, boundary, dst| {
            dst.extend_from_slice(format!("--{boundary}:{}", form.value("k").unwrap_or_default()).as_bytes());
            Ok(())
        });

        let mut form = MultipartForm::new();
        form.add_value("k", "v");
        let mut request = Request::new();
        request.set_multipart_codec(Arc::new(codec));
        request.header_mut().set_method(b"POST");
        request.header_mut().set_host(b"a");
        request.set_multipart_form(form, "b0");

        let out = write_request(&mut request).await.unwrap();
        assert!(out.contains("Content-Type: multipart/form-data; boundary=b0\r\n"));
        assert!(out.ends_with("Content-Length: 6\r\n\r\n--b0:v"), "{out}");
    }

    #[tokio::test]
    async fn test_copy_to_and_reset() {
        let (mut request, result) = read_request(b"POST /p?a=1 HTTP/1.1\r\nHost: h\r\nContent-Length: 2\r\n\r\nhi").await;
        result.unwrap();
        assert_eq!(request.uri().query_args().peek(b"a"), Some(&b"1"[..]));

        let mut copy = Request::new();
        request.copy_to(&mut copy);
        assert_eq!(copy.body_bytes(), b"hi");
        assert_eq!(copy.uri().path(), b"/p");
        assert_eq!(copy.header().host(), b"h");

        request.reset();
        assert!(request.body_bytes().is_empty());
        assert_eq!(request.uri().path(), b"/");
    }
}
