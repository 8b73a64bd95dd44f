use crate::bytesconv::append_hex;
use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;

/// Frames payload items as `<lowercase hex size>\r\n<data>\r\n`, closing with `0\r\n\r\n`.
///
/// Empty chunks are skipped since a zero size would end the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    send_size: u64,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, send_size: 0 }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }

    /// Payload bytes framed so far, not counting chunk headers.
    pub fn send_size(&self) -> u64 {
        self.send_size
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(mut bytes) => {
                let len = bytes.remaining();
                if len == 0 {
                    return Ok(());
                }
                dst.reserve(len + 20);
                append_hex(dst, len as u64, false);
                dst.put_slice(b"\r\n");
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.put_slice(chunk);
                    bytes.advance(n);
                }
                dst.put_slice(b"\r\n");
                self.send_size += len as u64;
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.put_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::body::chunked_decoder::ChunkedDecoder;
    use bytes::Bytes;
    use tokio_util::codec::Decoder;

    #[test]
    fn test_encode_chunks() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(&[b'a'; 26])), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::new()), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"xyz")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ignored")), &mut dst).unwrap();

        let mut expected = b"1a\r\n".to_vec();
        expected.extend_from_slice(&[b'a'; 26]);
        expected.extend_from_slice(b"\r\n3\r\nxyz\r\n0\r\n\r\n");
        assert_eq!(&dst[..], &expected[..]);
        assert!(encoder.is_finish());
        assert_eq!(encoder.send_size(), 29);
    }

    #[test]
    fn test_decodes_what_it_encodes() {
        let body: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let mut encoder = ChunkedEncoder::new();
        let mut wire = BytesMut::new();
        for part in body.chunks(777) {
            encoder.encode(PayloadItem::Chunk(Bytes::copy_from_slice(part)), &mut wire).unwrap();
        }
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut wire).unwrap();

        let mut decoder = ChunkedDecoder::new();
        let mut decoded = Vec::new();
        loop {
            match decoder.decode(&mut wire).unwrap().unwrap() {
                PayloadItem::Chunk(bytes) => decoded.extend_from_slice(&bytes),
                PayloadItem::Eof => break,
            }
        }
        assert_eq!(decoded, body);
        assert!(wire.is_empty());
    }
}
