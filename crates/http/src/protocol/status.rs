//! Pre-rendered `HTTP/1.1 <code> <reason>\r\n` status lines.

use arc_swap::ArcSwap;
use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::bytesconv::append_uint;

/// Process-wide copy-on-write cache. Entries are added on first use and never evicted.
static STATUS_LINES: Lazy<ArcSwap<HashMap<u16, Bytes>>> = Lazy::new(|| ArcSwap::from_pointee(HashMap::new()));

/// The reason phrase of `code`, `Unknown Status Code` for codes without one.
pub fn status_message(code: u16) -> &'static str {
    StatusCode::from_u16(code).ok().and_then(|status| status.canonical_reason()).unwrap_or("Unknown Status Code")
}

/// The complete status line of `code`, including the trailing CRLF.
pub fn status_line(code: u16) -> Bytes {
    if let Some(line) = STATUS_LINES.load().get(&code) {
        return line.clone();
    }

    let line = render_status_line(code);
    STATUS_LINES.rcu(|lines| {
        let mut lines = HashMap::clone(lines);
        lines.insert(code, line.clone());
        lines
    });
    line
}

fn render_status_line(code: u16) -> Bytes {
    let reason = status_message(code);
    let mut line = BytesMut::with_capacity(15 + reason.len());
    line.put_slice(b"HTTP/1.1 ");
    append_uint(&mut line, u64::from(code));
    line.put_u8(b' ');
    line.put_slice(reason.as_bytes());
    line.put_slice(b"\r\n");
    line.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line() {
        assert_eq!(&status_line(200)[..], b"HTTP/1.1 200 OK\r\n");
        assert_eq!(&status_line(404)[..], b"HTTP/1.1 404 Not Found\r\n");
        assert_eq!(&status_line(799)[..], b"HTTP/1.1 799 Unknown Status Code\r\n");
        // cached lines are shared
        assert_eq!(status_line(404).as_ptr(), status_line(404).as_ptr());
    }

    #[test]
    fn test_status_message() {
        assert_eq!(status_message(204), "No Content");
        assert_eq!(status_message(1000), "Unknown Status Code");
    }
}
