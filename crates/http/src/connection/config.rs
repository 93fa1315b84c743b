use std::time::Duration;

use crate::codec::header::{DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADER_NUM};

const DEFAULT_READ_CHUNK_SIZE: usize = 4 * 1024;

const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Limits and timeouts for one connection.
///
/// ```
/// use std::time::Duration;
/// use restline_http::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .with_max_header_bytes(16 * 1024)
///     .with_idle_timeout(Some(Duration::from_secs(30)));
/// assert_eq!(config.max_header_bytes(), 16 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    max_header_bytes: usize,
    max_headers: usize,
    read_chunk_size: usize,
    read_buffer_size: usize,
    idle_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_headers: DEFAULT_MAX_HEADER_NUM,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            idle_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// Largest request head accepted, terminator included.
    #[must_use]
    pub fn with_max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    #[must_use]
    pub fn with_max_headers(mut self, max_headers: usize) -> Self {
        self.max_headers = max_headers;
        self
    }

    /// Largest body segment handed to a handler at once.
    #[must_use]
    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size;
        self
    }

    #[must_use]
    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    /// How long to wait for the next request head before closing quietly.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn max_headers(&self) -> usize {
        self.max_headers
    }

    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }
}
