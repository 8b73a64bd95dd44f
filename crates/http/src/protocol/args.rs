//! Query string style `key=value&key2=value2` arguments.

use crate::bytesconv::{
    NumberError, append_quoted_arg, append_uint, decode_arg_append, parse_ufloat, parse_uint,
};
use crate::protocol::kv::{KeyValue, KvList};
use bytes::BytesMut;
use memchr::memchr;
use std::fmt;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Percent-decoded query arguments.
///
/// Keys may repeat and keep their insertion order. Parsing never fails: malformed escapes
/// are taken literally.
///
/// ```
/// use rapid_http::protocol::Args;
///
/// let mut args = Args::new();
/// args.parse(b"foo=bar&baz=123&flag");
/// assert_eq!(args.peek(b"foo"), Some(&b"bar"[..]));
/// assert_eq!(args.get_uint(b"baz"), Ok(123));
/// assert_eq!(args.query_string(), b"foo=bar&baz=123&flag");
/// ```
#[derive(Default, Clone)]
pub struct Args {
    args: KvList,
    buf: BytesMut,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all arguments, keeping their buffers.
    pub fn reset(&mut self) {
        self.args.clear();
    }

    /// Replaces the arguments with those decoded from `s`.
    ///
    /// Segments are split on `&` and then on the first `=`; `+` decodes to a space. A segment
    /// with neither key nor value (`&&`, `&=&`) is skipped.
    pub fn parse(&mut self, s: &[u8]) {
        self.args.clear();
        for segment in s.split(|&c| c == b'&') {
            let (key, value) = match memchr(b'=', segment) {
                Some(i) => (&segment[..i], &segment[i + 1..]),
                None => (segment, &b""[..]),
            };
            if key.is_empty() && value.is_empty() {
                continue;
            }

            let kv = self.args.alloc();
            decode_arg_append(kv.key_mut(), key, true);
            decode_arg_append(kv.value_mut(), value, true);
        }
    }

    /// The serialized form of the arguments.
    ///
    /// The returned slice lives in an internal buffer overwritten by the next call.
    pub fn query_string(&mut self) -> &[u8] {
        self.buf.clear();
        append_args(&self.args, &mut self.buf);
        &self.buf
    }

    /// Appends the serialized form to `dst`.
    pub fn append_bytes(&self, dst: &mut BytesMut) {
        append_args(&self.args, dst);
    }

    /// Writes the serialized form to `w`, returning the number of bytes written.
    pub async fn write_to<W>(&mut self, w: &mut W) -> io::Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let query = self.query_string();
        w.write_all(query).await?;
        Ok(query.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Adds `key=value`, keeping any existing values of `key`.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        self.args.append(key, value);
    }

    /// Sets the first `key` to `value`, or adds it.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.args.set(key, value);
    }

    pub fn del(&mut self, key: &[u8]) {
        self.args.delete_all(key);
    }

    pub fn peek(&self, key: &[u8]) -> Option<&[u8]> {
        self.args.peek(key)
    }

    pub fn peek_multi(&self, key: &[u8]) -> Vec<&[u8]> {
        self.args.peek_all(key)
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.args.has(key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyValue> {
        self.args.iter()
    }

    pub fn visit_all<F>(&self, f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        self.args.visit_all(f);
    }

    /// Parses the value of `key` as an unsigned integer. A missing key reads as an empty value.
    pub fn get_uint(&self, key: &[u8]) -> Result<u64, NumberError> {
        parse_uint(self.peek(key).unwrap_or_default())
    }

    pub fn get_uint_or_zero(&self, key: &[u8]) -> u64 {
        self.get_uint(key).unwrap_or(0)
    }

    pub fn set_uint(&mut self, key: &[u8], value: u64) {
        self.buf.clear();
        append_uint(&mut self.buf, value);
        self.args.set(key, &self.buf);
    }

    /// Parses the value of `key` as an unsigned float. A missing key reads as an empty value.
    pub fn get_ufloat(&self, key: &[u8]) -> Result<f64, NumberError> {
        parse_ufloat(self.peek(key).unwrap_or_default())
    }

    pub fn get_ufloat_or_zero(&self, key: &[u8]) -> f64 {
        self.get_ufloat(key).unwrap_or(0.0)
    }

    /// Deep-copies the arguments into `dst`.
    pub fn copy_to(&self, dst: &mut Args) {
        self.args.copy_to(&mut dst.args);
    }
}

fn append_args(args: &KvList, dst: &mut BytesMut) {
    for (i, kv) in args.iter().enumerate() {
        if i > 0 {
            dst.extend_from_slice(b"&");
        }
        append_quoted_arg(dst, kv.key());
        if !kv.value().is_empty() {
            dst.extend_from_slice(b"=");
            append_quoted_arg(dst, kv.value());
        }
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = BytesMut::new();
        self.append_bytes(&mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args").field("args", &self.args).finish()
    }
}
