//! HTTP codec module for encoding and decoding HTTP messages
//!
//! The codec turns bytes into message parts and back:
//!
//! - [`body`]: body framers implementing tokio-util's [`Decoder`](tokio_util::codec::Decoder) and
//!   [`Encoder`](tokio_util::codec::Encoder) for Content-Length, chunked and read-until-close bodies
//! - `header`: parsing and serialization of request and response headers, exposed as methods of
//!   [`RequestHeader`](crate::protocol::RequestHeader) and [`ResponseHeader`](crate::protocol::ResponseHeader)
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use rapid_http::codec::body::PayloadDecoder;
//! use rapid_http::protocol::{BodyLength, PayloadItem, RequestHeader};
//! use tokio_util::codec::Decoder;
//!
//! let input = b"POST /echo HTTP/1.1\r\nHost: a\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n";
//!
//! let mut header = RequestHeader::new();
//! let header_len = header.parse(input).unwrap().unwrap();
//! assert_eq!(header.content_length(), -1);
//!
//! let length = BodyLength::from_content_length(header.content_length());
//! let mut decoder = PayloadDecoder::from_body_length(length, 0).unwrap();
//! let mut buf = BytesMut::from(&input[header_len..]);
//! assert_eq!(decoder.decode(&mut buf).unwrap(), Some(PayloadItem::Chunk("abc".into())));
//! assert_eq!(decoder.decode(&mut buf).unwrap(), Some(PayloadItem::Eof));
//! ```

pub mod body;
mod header;

pub(crate) use header::peek_raw_header;
