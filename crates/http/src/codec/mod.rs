//! Codecs between raw bytes and [`Message`](crate::protocol::Message)s.
//!
//! - [`RequestDecoder`] turns bytes into a request head followed by body
//!   segments, with [`header`] doing the head and [`body`] the framing.
//! - [`ResponseEncoder`] turns a response head and body segments back into bytes.
//!
//! Both plug into `tokio_util::codec::FramedRead` and `FramedWrite`.

pub mod body;
pub mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
