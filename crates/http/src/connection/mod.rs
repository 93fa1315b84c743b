//! Serving requests over a single byte stream.
//!
//! [`HttpConnection`] reads request heads and bodies with
//! [`RequestDecoder`](crate::codec::RequestDecoder), hands each request to a
//! [`Handler`](crate::handler::Handler) and writes the response back with
//! [`ResponseEncoder`](crate::codec::ResponseEncoder). [`ConnectionConfig`]
//! holds its limits and timeouts.

mod config;
mod http_connection;

pub use config::ConnectionConfig;
pub use http_connection::HttpConnection;
