//! Whole-body gzip and deflate transforms.
//!
//! `deflate` is the zlib format, as `Content-Encoding: deflate` is defined over it.

use std::io::{self, Read, Write};

use bytes::{BufMut, BytesMut};
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use tracing::trace;

/// A content coding supported by the body transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Gzip,
    Deflate,
}

impl ContentCoding {
    /// The `Content-Encoding` token.
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }

    /// Compresses `src` at `level` (0 to 9) and appends the result to `dst`.
    pub fn append_encoded(self, dst: &mut BytesMut, src: &[u8], level: u32) -> io::Result<()> {
        let level = Compression::new(level.min(9));
        let writer = (&mut *dst).writer();
        match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(writer, level);
                encoder.write_all(src)?;
                encoder.finish()?;
            }
            Self::Deflate => {
                let mut encoder = ZlibEncoder::new(writer, level);
                encoder.write_all(src)?;
                encoder.finish()?;
            }
        }
        trace!(coding = self.name(), from = src.len(), to = dst.len(), "compressed body");
        Ok(())
    }

    /// Decompresses `src` and appends the result to `dst`.
    pub fn append_decoded(self, dst: &mut BytesMut, src: &[u8]) -> io::Result<u64> {
        let mut writer = (&mut *dst).writer();
        match self {
            Self::Gzip => copy_decoded(GzDecoder::new(src), &mut writer),
            Self::Deflate => copy_decoded(ZlibDecoder::new(src), &mut writer),
        }
    }
}

fn copy_decoded<R: Read, W: Write>(mut decoder: R, writer: &mut W) -> io::Result<u64> {
    io::copy(&mut decoder, writer)
}
