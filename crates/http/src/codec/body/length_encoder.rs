use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

/// Copies payload bytes verbatim up to the declared Content-Length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    pub fn is_finish(&self) -> bool {
        self.length == 0
    }

    pub fn remaining(&self) -> u64 {
        self.length
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                if self.length == 0 {
                    warn!(extra = bytes.remaining(), "encode payload_item but no need to encode anymore");
                    return Ok(());
                }
                let len = std::cmp::min(bytes.remaining() as u64, self.length);
                if len < bytes.remaining() as u64 {
                    warn!(extra = bytes.remaining() as u64 - len, "payload exceeds content length, truncated");
                }
                let len = usize::try_from(len).unwrap_or(usize::MAX);
                dst.put((&mut bytes).take(len));
                self.length -= len as u64;
                Ok(())
            }
            PayloadItem::Eof => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_encode_exact_length() {
        let mut encoder = LengthEncoder::new(8);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        assert_eq!(encoder.remaining(), 3);
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"world")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"hellowor");
        assert!(encoder.is_finish());
    }
}
