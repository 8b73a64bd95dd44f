//! Primitive byte and number codecs shared by the header, URI and args engines.
//!
//! Everything in this module appends into a caller supplied [`BytesMut`] or parses from a
//! borrowed slice, so the hot paths never allocate on their own.

use bytes::{BufMut, BytesMut};
use std::time::SystemTime;
use thiserror::Error;

/// Decimal digits accepted by [`parse_uint`]; 18 digits always fit into a `u64`.
const MAX_INT_CHARS: usize = 18;

/// Hex digits accepted for a chunk size.
pub(crate) const MAX_HEX_INT_CHARS: usize = 15;

const UPPER_HEX: &[u8; 16] = b"0123456789ABCDEF";
const LOWER_HEX: &[u8; 16] = b"0123456789abcdef";

/// Errors produced by the integer and float parsers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    #[error("empty number")]
    Empty,

    #[error("unexpected first char found, expecting 0-9")]
    UnexpectedFirstChar,

    #[error("unexpected trailing char found, expecting 0-9")]
    UnexpectedTrailingChar,

    #[error("too long number")]
    TooLong,

    #[error("invalid float number: {0}")]
    InvalidFloat(&'static str),
}

/// Parses an unsigned decimal integer occupying the whole slice.
pub fn parse_uint(b: &[u8]) -> Result<u64, NumberError> {
    let (v, n) = parse_uint_prefix(b)?;
    if n != b.len() {
        return Err(NumberError::UnexpectedTrailingChar);
    }
    Ok(v)
}

/// Parses the leading decimal digits of `b`, returning the value and the number of bytes consumed.
pub fn parse_uint_prefix(b: &[u8]) -> Result<(u64, usize), NumberError> {
    if b.is_empty() {
        return Err(NumberError::Empty);
    }

    let mut v = 0u64;
    for (i, &c) in b.iter().enumerate() {
        let k = c.wrapping_sub(b'0');
        if k > 9 {
            if i == 0 {
                return Err(NumberError::UnexpectedFirstChar);
            }
            return Ok((v, i));
        }
        if i >= MAX_INT_CHARS {
            return Err(NumberError::TooLong);
        }
        v = 10 * v + u64::from(k);
    }
    Ok((v, b.len()))
}

/// Parses an unsigned float such as `12.5`, `.5` or `1e-3`.
pub fn parse_ufloat(buf: &[u8]) -> Result<f64, NumberError> {
    if buf.is_empty() {
        return Err(NumberError::Empty);
    }

    let mut v = 0u64;
    let mut offset = 1.0f64;
    let mut point_found = false;
    for (i, &c) in buf.iter().enumerate() {
        if c.is_ascii_digit() {
            v = v
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(c - b'0')))
                .ok_or(NumberError::TooLong)?;
            if point_found {
                offset /= 10.0;
            }
            continue;
        }

        match c {
            b'.' if point_found => return Err(NumberError::InvalidFloat("duplicate point")),
            b'.' => point_found = true,
            b'e' | b'E' => {
                let mut exp = &buf[i + 1..];
                if exp.is_empty() {
                    return Err(NumberError::InvalidFloat("unexpected end"));
                }
                let mut sign = 1i32;
                match exp[0] {
                    b'+' => exp = &exp[1..],
                    b'-' => {
                        exp = &exp[1..];
                        sign = -1;
                    }
                    _ => {}
                }
                let e = parse_uint(exp)
                    .ok()
                    .and_then(|e| i32::try_from(e).ok())
                    .ok_or(NumberError::InvalidFloat("invalid exponent"))?;
                return Ok(to_f64(v) * offset * 10f64.powi(sign * e));
            }
            _ => return Err(NumberError::InvalidFloat("unexpected char")),
        }
    }

    Ok(to_f64(v) * offset)
}

#[inline]
#[allow(clippy::cast_precision_loss, reason = "float parsing is lossy by nature")]
fn to_f64(v: u64) -> f64 {
    v as f64
}

/// Returns the value of an ascii hex digit.
#[inline]
pub(crate) fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Parses leading hex digits, returning the value and the number of bytes consumed.
pub fn parse_hex_prefix(b: &[u8]) -> Result<(u64, usize), NumberError> {
    if b.is_empty() {
        return Err(NumberError::Empty);
    }

    let mut v = 0u64;
    for (i, &c) in b.iter().enumerate() {
        let Some(k) = hex_value(c) else {
            if i == 0 {
                return Err(NumberError::Empty);
            }
            return Ok((v, i));
        };
        if i >= MAX_HEX_INT_CHARS {
            return Err(NumberError::TooLong);
        }
        v = (v << 4) | u64::from(k);
    }
    Ok((v, b.len()))
}

/// Appends the decimal form of `n`.
pub fn append_uint(dst: &mut BytesMut, mut n: u64) {
    let mut buf = [0u8; 20];
    let mut i = buf.len();
    loop {
        i -= 1;
        #[allow(clippy::cast_possible_truncation, reason = "n % 10 is a single digit")]
        let digit = (n % 10) as u8;
        buf[i] = b'0' + digit;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    dst.put_slice(&buf[i..]);
}

/// Appends the hex form of `n`, uppercase or lowercase.
pub fn append_hex(dst: &mut BytesMut, mut n: u64, upper: bool) {
    let table = if upper { UPPER_HEX } else { LOWER_HEX };
    let mut buf = [0u8; 16];
    let mut i = buf.len();
    loop {
        i -= 1;
        #[allow(clippy::cast_possible_truncation, reason = "masked to a nibble")]
        let nibble = (n & 0xf) as usize;
        buf[i] = table[nibble];
        n >>= 4;
        if n == 0 {
            break;
        }
    }
    dst.put_slice(&buf[i..]);
}

#[inline]
fn append_percent(dst: &mut BytesMut, c: u8) {
    dst.put_slice(&[b'%', UPPER_HEX[usize::from(c >> 4)], UPPER_HEX[usize::from(c & 0xf)]]);
}

/// Percent-encodes `src` as a query argument: only `[A-Za-z0-9*-._]` stay literal.
pub fn append_quoted_arg(dst: &mut BytesMut, src: &[u8]) {
    dst.reserve(src.len());
    for &c in src {
        if c.is_ascii_alphanumeric() || matches!(c, b'*' | b'-' | b'.' | b'_') {
            dst.put_u8(c);
        } else {
            append_percent(dst, c);
        }
    }
}

/// Percent-encodes `src` as a path, keeping `/.,=:&~-_` literal as well.
pub fn append_quoted_path(dst: &mut BytesMut, src: &[u8]) {
    dst.reserve(src.len());
    for &c in src {
        if c.is_ascii_alphanumeric() || matches!(c, b'/' | b'.' | b',' | b'=' | b':' | b'&' | b'~' | b'-' | b'_') {
            dst.put_u8(c);
        } else {
            append_percent(dst, c);
        }
    }
}

/// Percent-decodes `src` into `dst`.
///
/// Malformed escapes never fail: a `%` followed by fewer than two bytes copies the rest
/// verbatim, and a `%` followed by non-hex digits is kept as a literal `%`.
pub fn decode_arg_append(dst: &mut BytesMut, src: &[u8], decode_plus: bool) {
    dst.reserve(src.len());
    let n = src.len();
    let mut i = 0;
    while i < n {
        let c = src[i];
        if c == b'%' {
            if i + 2 >= n {
                dst.put_slice(&src[i..]);
                return;
            }
            match (hex_value(src[i + 1]), hex_value(src[i + 2])) {
                (Some(x1), Some(x2)) => {
                    dst.put_u8((x1 << 4) | x2);
                    i += 2;
                }
                _ => dst.put_u8(c),
            }
        } else if decode_plus && c == b'+' {
            dst.put_u8(b' ');
        } else {
            dst.put_u8(c);
        }
        i += 1;
    }
}

/// Canonicalizes a header name in place: `content-TYPE` becomes `Content-Type`.
pub fn normalize_header_key(key: &mut [u8]) {
    let mut upper = true;
    for c in key.iter_mut() {
        if *c == b'-' {
            upper = true;
        } else if upper {
            c.make_ascii_uppercase();
            upper = false;
        } else {
            c.make_ascii_lowercase();
        }
    }
}

/// Appends `src` lowercased.
pub(crate) fn append_lowercase(dst: &mut BytesMut, src: &[u8]) {
    dst.reserve(src.len());
    dst.extend(src.iter().map(u8::to_ascii_lowercase));
}

/// Appends an RFC 1123 date such as `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn append_http_date(dst: &mut BytesMut, date: SystemTime) {
    dst.put_slice(httpdate::fmt_http_date(date).as_bytes());
}

/// Parses an RFC 1123 (or obsolete RFC 850 / asctime) date.
pub fn parse_http_date(date: &[u8]) -> Option<SystemTime> {
    std::str::from_utf8(date).ok().and_then(|s| httpdate::parse_http_date(s).ok())
}

/// Case-insensitive search of `needle` in `haystack`. `needle` must be lowercase.
pub(crate) fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w.eq_ignore_ascii_case(needle))
}

/// Returns true if `value` holds `token` as one of its comma separated items.
pub(crate) fn has_token_ignore_case(value: &[u8], token: &[u8]) -> bool {
    value.split(|&c| c == b',').any(|item| item.trim_ascii().eq_ignore_ascii_case(token))
}
