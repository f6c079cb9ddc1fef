//! Receiver configuration
//!
//! Sanity limits enforced while parsing and the size of each transport read.

/// Default longest line accepted before its CRLF arrives
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// Default maximum number of headers per response
pub const DEFAULT_MAX_HEADERS: usize = 100;

/// Default largest declared chunk size (64 MiB)
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Default number of bytes requested per transport read
pub const DEFAULT_READ_BUFFER_SIZE: usize = 32 * 1024;

/// Parser limits and read sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub(crate) max_line_length: usize,
    pub(crate) max_headers: usize,
    pub(crate) max_chunk_size: usize,
    pub(crate) read_buffer_size: usize,
}

impl ParserConfig {
    /// Create a configuration with the default limits
    pub fn new() -> Self {
        ParserConfig {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_headers: DEFAULT_MAX_HEADERS,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Set the longest status, header or chunk-size line accepted
    pub fn with_max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    /// Set the maximum number of headers
    pub fn with_max_headers(mut self, count: usize) -> Self {
        self.max_headers = count;
        self
    }

    /// Set the largest declared chunk size
    pub fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size;
        self
    }

    /// Set the number of bytes requested per transport read (at least 1)
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    pub fn max_headers(&self) -> usize {
        self.max_headers
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new()
    }
}
