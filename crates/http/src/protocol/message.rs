use bytes::{Buf, Bytes};

/// Content-Length value meaning the body uses chunked transfer encoding.
pub const CONTENT_LENGTH_CHUNKED: i64 = -1;

/// Content-Length value meaning the body runs until the connection closes.
pub const CONTENT_LENGTH_IDENTITY: i64 = -2;

/// Represents an item in the HTTP message payload stream.
///
/// This enum is used by the payload decoders to produce either data chunks
/// or signal the end of the payload stream (EOF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

/// How the body of a message is delimited on the wire.
///
/// Headers expose this as a signed Content-Length, where [`CONTENT_LENGTH_CHUNKED`] and
/// [`CONTENT_LENGTH_IDENTITY`] stand for the two framings without a known size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyLength {
    /// Exactly this many bytes follow the header
    Fixed(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// Body continues until the connection is closed, responses only
    Identity,
}

impl Default for BodyLength {
    fn default() -> Self {
        Self::Fixed(0)
    }
}

impl BodyLength {
    /// Maps a signed Content-Length to a framing. Negative values other than
    /// [`CONTENT_LENGTH_CHUNKED`] mean identity.
    pub fn from_content_length(content_length: i64) -> Self {
        match u64::try_from(content_length) {
            Ok(len) => Self::Fixed(len),
            Err(_) if content_length == CONTENT_LENGTH_CHUNKED => Self::Chunked,
            Err(_) => Self::Identity,
        }
    }

    /// The signed Content-Length form of this framing.
    pub fn as_content_length(self) -> i64 {
        match self {
            Self::Fixed(len) => i64::try_from(len).unwrap_or(i64::MAX),
            Self::Chunked => CONTENT_LENGTH_CHUNKED,
            Self::Identity => CONTENT_LENGTH_IDENTITY,
        }
    }

    #[inline]
    pub fn is_chunked(self) -> bool {
        matches!(self, Self::Chunked)
    }

    #[inline]
    pub fn is_identity(self) -> bool {
        matches!(self, Self::Identity)
    }

    /// The declared size, if any.
    #[inline]
    pub fn fixed(self) -> Option<u64> {
        match self {
            Self::Fixed(len) => Some(len),
            Self::Chunked | Self::Identity => None,
        }
    }
}

impl<D: Buf> PayloadItem<D> {
    /// Returns true if this item represents the end of the payload stream
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns true if this item contains chunk data
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    ///
    /// Returns None if this is an EOF marker
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the PayloadItem and returns the contained bytes if this is a Chunk
    ///
    /// Returns None if this is an EOF marker
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
