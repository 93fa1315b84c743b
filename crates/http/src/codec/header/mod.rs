//! Request head decoding and response head encoding.
//!
//! - [`HeaderScanner`]: finds the end of a request head and polices its bytes
//! - [`HeaderDecoder`]: turns a complete head into a [`RequestHeader`](crate::protocol::RequestHeader)
//! - [`HeaderEncoder`]: writes a status line and headers

mod header_decoder;
mod header_encoder;
mod scanner;

pub(crate) use header_decoder::{DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADER_NUM, is_chunked};
pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub use scanner::{HeaderScanner, ScanOutcome};

pub(crate) use header_encoder::FastWrite;
