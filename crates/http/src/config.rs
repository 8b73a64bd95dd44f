//! Size limits applied while reading and writing messages.

/// Size limits for a single connection.
///
/// ```
/// use rapid_http::config::Limits;
///
/// let limits = Limits {
///     max_body_size: 1024 * 1024,
///     ..Default::default()
/// };
/// assert_eq!(limits.max_header_size, 8 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Initial capacity of the read buffer, and the size of every read from the transport.
    ///
    /// Default: `4096`
    pub read_buffer_size: usize,

    /// The largest header block (first line included) a reader accepts.
    ///
    /// A request line that alone exceeds this limit fails the same way.
    ///
    /// Default: `8192`
    pub max_header_size: usize,

    /// The largest body a reader accepts, `0` means unlimited.
    ///
    /// Default: `0`
    pub max_body_size: usize,

    /// Capacity of the write buffer. Bodies larger than this bypass the buffer.
    ///
    /// Default: `4096`
    pub write_buffer_size: usize,

    /// Streamed bodies of a known size above this threshold are written straight to the
    /// transport after flushing the buffered header.
    ///
    /// Default: `8192`
    pub max_small_file_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            read_buffer_size: 4 * 1024,
            max_header_size: 8 * 1024,
            max_body_size: 0,
            write_buffer_size: 4 * 1024,
            max_small_file_size: 2 * 4096,
        }
    }
}

impl Limits {
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }
}
