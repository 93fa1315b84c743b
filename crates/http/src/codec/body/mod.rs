//! Body framing on the wire.
//!
//! Request bodies are decoded by [`PayloadDecoder`], which picks a length
//! or chunked decoder from the request's [`PayloadSize`](crate::protocol::PayloadSize).
//! Response bodies go through [`PayloadEncoder`] the same way. Both decoders
//! hand out bounded segments so a large body never sits in memory at once.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
