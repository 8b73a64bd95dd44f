//! URI decomposition, path normalization and relative reference resolution.

use crate::bytesconv::{append_lowercase, append_quoted_path, decode_arg_append};
use crate::protocol::args::Args;
use crate::protocol::deferred::Deferred;
use bytes::{BufMut, BytesMut};
use memchr::{memchr, memchr3, memmem, memrchr};
use std::fmt;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A parsed URI: `scheme://host/path?query#hash`.
///
/// The path is kept twice: as received ([`path_original`](Uri::path_original)) and decoded and
/// normalized ([`path`](Uri::path)). Query args are parsed from the query string on first
/// access and replace it for serialization from then on.
///
/// ```
/// use rapid_http::protocol::Uri;
///
/// let mut uri = Uri::new();
/// uri.parse(None, b"HTTP://Example.COM/a/./b/../c%20d?x=1#top");
/// assert_eq!(uri.scheme(), b"http");
/// assert_eq!(uri.host(), b"example.com");
/// assert_eq!(uri.path(), b"/a/c d");
/// assert_eq!(uri.query_string(), b"x=1");
/// assert_eq!(uri.hash(), b"top");
/// assert_eq!(uri.full_uri(), b"http://example.com/a/c%20d?x=1#top");
/// ```
#[derive(Default, Clone)]
pub struct Uri {
    path_original: BytesMut,
    scheme: BytesMut,
    path: BytesMut,
    query_string: BytesMut,
    hash: BytesMut,
    host: BytesMut,

    query_args: Deferred<Args>,

    full_uri: BytesMut,
    request_uri: BytesMut,
}

impl Uri {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every component, keeping the buffers.
    pub fn reset(&mut self) {
        self.path_original.clear();
        self.scheme.clear();
        self.path.clear();
        self.query_string.clear();
        self.hash.clear();
        self.host.clear();
        self.query_args.invalidate();
    }

    /// Parses `uri`, taking the host from it when it is absolute, or from `host` otherwise.
    ///
    /// Scheme and host are lowercased. A `#` that comes before the first `?` makes the rest a
    /// fragment, so `/a#b?c` has no query string.
    pub fn parse(&mut self, host: Option<&[u8]>, uri: &[u8]) {
        self.reset();

        let (scheme, host, rest) = split_host_uri(host.unwrap_or_default(), uri);
        append_lowercase(&mut self.scheme, scheme);
        append_lowercase(&mut self.host, host);

        let mut query_index = memchr(b'?', rest);
        let fragment_index = memchr(b'#', rest);
        if let (Some(q), Some(f)) = (query_index, fragment_index) {
            if q > f {
                query_index = None;
            }
        }

        let path_end = query_index.or(fragment_index).unwrap_or(rest.len());
        self.path_original.extend_from_slice(&rest[..path_end]);
        normalize_path(&mut self.path, &self.path_original);

        if let Some(q) = query_index {
            let query_end = fragment_index.unwrap_or(rest.len());
            self.query_string.extend_from_slice(&rest[q + 1..query_end]);
        }
        if let Some(f) = fragment_index {
            self.hash.extend_from_slice(&rest[f + 1..]);
        }
    }

    /// The scheme, lowercased; `http` when unset.
    pub fn scheme(&self) -> &[u8] {
        if self.scheme.is_empty() { &b"http"[..] } else { self.scheme.as_ref() }
    }

    pub fn set_scheme(&mut self, scheme: &[u8]) {
        self.scheme.clear();
        append_lowercase(&mut self.scheme, scheme);
    }

    pub fn is_https(&self) -> bool {
        self.scheme() == b"https"
    }

    /// The host, lowercased.
    pub fn host(&self) -> &[u8] {
        &self.host
    }

    pub fn set_host(&mut self, host: &[u8]) {
        self.host.clear();
        append_lowercase(&mut self.host, host);
    }

    /// The decoded, normalized path; `/` when unset.
    ///
    /// It never contains `//`, `/./` or `/../` and always starts with `/`.
    pub fn path(&self) -> &[u8] {
        if self.path.is_empty() { &b"/"[..] } else { self.path.as_ref() }
    }

    /// Sets the path, as it would appear on the wire.
    pub fn set_path(&mut self, path: &[u8]) {
        self.path_original.clear();
        self.path_original.extend_from_slice(path);
        normalize_path(&mut self.path, &self.path_original);
    }

    /// The path exactly as it was given to [`parse`](Uri::parse) or [`set_path`](Uri::set_path).
    pub fn path_original(&self) -> &[u8] {
        &self.path_original
    }

    /// The part of the path after the last `/`: `baz.html` for `/foo/baz.html`, empty for `/foo/`.
    pub fn last_path_segment(&self) -> &[u8] {
        let path = self.path();
        match memrchr(b'/', path) {
            Some(n) => &path[n + 1..],
            None => path,
        }
    }

    pub fn query_string(&self) -> &[u8] {
        &self.query_string
    }

    pub fn set_query_string(&mut self, query_string: &[u8]) {
        self.query_string.clear();
        self.query_string.extend_from_slice(query_string);
        self.query_args.invalidate();
    }

    /// The fragment, without the leading `#`.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn set_hash(&mut self, hash: &[u8]) {
        self.hash.clear();
        self.hash.extend_from_slice(hash);
    }

    /// The query args, parsed from the query string on first access.
    pub fn query_args(&mut self) -> &mut Args {
        self.query_args.get_or_parse(|args| args.parse(&self.query_string))
    }

    /// Path, query and fragment, i.e. the URI without scheme and host.
    pub fn request_uri(&mut self) -> &[u8] {
        let mut buf = std::mem::take(&mut self.request_uri);
        buf.clear();
        self.append_request_uri(&mut buf);
        self.request_uri = buf;
        &self.request_uri
    }

    /// The complete URI, `scheme://host/path?query#hash`.
    pub fn full_uri(&mut self) -> &[u8] {
        let mut buf = std::mem::take(&mut self.full_uri);
        buf.clear();
        self.append_bytes(&mut buf);
        self.full_uri = buf;
        &self.full_uri
    }

    /// Appends the complete URI to `dst`.
    pub fn append_bytes(&self, dst: &mut BytesMut) {
        self.append_scheme_host(dst);
        self.append_request_uri(dst);
    }

    pub async fn write_to<W>(&mut self, w: &mut W) -> io::Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let uri = self.full_uri();
        w.write_all(uri).await?;
        Ok(uri.len())
    }

    /// Resolves `new_uri` against this URI and replaces it with the result.
    ///
    /// - an absolute URI replaces everything
    /// - `/path` keeps scheme and host
    /// - `?query` only replaces the query string
    /// - anything else replaces the last segment of the current path
    pub fn update(&mut self, new_uri: &[u8]) {
        let Some(&first) = new_uri.first() else {
            return;
        };

        if first == b'?' {
            self.set_query_string(&new_uri[1..]);
            return;
        }

        if scheme_end(new_uri).is_some() {
            self.parse(None, new_uri);
            return;
        }

        let mut buf = std::mem::take(&mut self.full_uri);
        buf.clear();
        self.append_scheme_host(&mut buf);
        if first != b'/' {
            let path = self.path();
            let dir_end = memrchr(b'/', path).map_or(0, |n| n + 1);
            append_quoted_path(&mut buf, &path[..dir_end]);
        }
        buf.extend_from_slice(new_uri);
        self.parse(None, &buf);
        self.full_uri = buf;
    }

    /// Deep-copies this URI into `dst`.
    pub fn copy_to(&self, dst: &mut Uri) {
        dst.reset();
        dst.path_original.extend_from_slice(&self.path_original);
        dst.scheme.extend_from_slice(&self.scheme);
        dst.path.extend_from_slice(&self.path);
        dst.query_string.extend_from_slice(&self.query_string);
        dst.hash.extend_from_slice(&self.hash);
        dst.host.extend_from_slice(&self.host);
        if let Some(args) = self.query_args.parsed() {
            args.copy_to(dst.query_args.set_parsed());
        }
    }

    fn append_scheme_host(&self, dst: &mut BytesMut) {
        dst.extend_from_slice(self.scheme());
        dst.extend_from_slice(b"://");
        dst.extend_from_slice(&self.host);
    }

    fn append_request_uri(&self, dst: &mut BytesMut) {
        append_quoted_path(dst, self.path());
        match self.query_args.parsed() {
            Some(args) => {
                if !args.is_empty() {
                    dst.put_u8(b'?');
                    args.append_bytes(dst);
                }
            }
            None => {
                if !self.query_string.is_empty() {
                    dst.put_u8(b'?');
                    dst.extend_from_slice(&self.query_string);
                }
            }
        }
        if !self.hash.is_empty() {
            dst.put_u8(b'#');
            dst.extend_from_slice(&self.hash);
        }
    }
}

/// Splits `scheme://host/rest`, falling back to `http` and `host` for relative URIs.
/// Position of the `://` ending the scheme of an absolute URI.
fn scheme_end(uri: &[u8]) -> Option<usize> {
    let n = memmem::find(uri, b"://")?;
    match memchr3(b'/', b'?', b'#', &uri[..n]) {
        Some(_) => None,
        None => Some(n),
    }
}

fn split_host_uri<'a>(host: &'a [u8], uri: &'a [u8]) -> (&'a [u8], &'a [u8], &'a [u8]) {
    let Some(n) = scheme_end(uri) else {
        return (&b"http"[..], host, uri);
    };
    let scheme = &uri[..n];
    let rest = &uri[n + 3..];
    match memchr(b'/', rest) {
        Some(n) => (scheme, &rest[..n], &rest[n..]),
        None => (scheme, rest, &b"/"[..]),
    }
}

/// Writes the canonical form of the path `src` into `dst`.
///
/// In order: a leading `/` is added if missing, the path is percent-decoded (`+` stays as is),
/// runs of `/` are collapsed, `/x/../` and `/./` segments are resolved, and a trailing `/x/..`
/// is dropped.
///
/// Idempotent only for paths without `%`: decoding `/%2541` yields `/%41`, which a second pass
/// decodes again to `/A`.
pub fn normalize_path(dst: &mut BytesMut, src: &[u8]) {
    dst.clear();
    if src.first() != Some(&b'/') {
        dst.put_u8(b'/');
    }
    decode_arg_append(dst, src, false);

    let b = &mut dst[..];
    let mut len = collapse_slashes(b);

    while let Some(n) = memmem::find(&b[..len], b"/../") {
        let nn = memrchr(b'/', &b[..n]).unwrap_or(0);
        let tail = n + 3;
        b.copy_within(tail..len, nn);
        len -= tail - nn;
    }

    while let Some(n) = memmem::find(&b[..len], b"/./") {
        b.copy_within(n + 2..len, n);
        len -= 2;
    }

    if b[..len].ends_with(b"/..") {
        match memrchr(b'/', &b[..len - 3]) {
            Some(nn) => len = nn + 1,
            None => {
                dst.clear();
                dst.put_u8(b'/');
                return;
            }
        }
    }

    dst.truncate(len);
}

fn collapse_slashes(b: &mut [u8]) -> usize {
    let mut len = 0;
    for i in 0..b.len() {
        if b[i] == b'/' && len > 0 && b[len - 1] == b'/' {
            continue;
        }
        b[len] = b[i];
        len += 1;
    }
    len
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = BytesMut::new();
        self.append_bytes(&mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uri")
            .field("scheme", &String::from_utf8_lossy(self.scheme()))
            .field("host", &String::from_utf8_lossy(&self.host))
            .field("path", &String::from_utf8_lossy(self.path()))
            .field("query_string", &String::from_utf8_lossy(&self.query_string))
            .field("hash", &String::from_utf8_lossy(&self.hash))
            .finish_non_exhaustive()
    }
}
