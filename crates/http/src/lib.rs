//! The HTTP/1.1 connection core of restline.
//!
//! This crate reads requests off any `AsyncRead`/`AsyncWrite` pair, hands
//! them to a [`Handler`](handler::Handler) and writes the responses back. It
//! knows nothing about sockets, routing or listeners; the `restline` crate
//! builds those on top.
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use http::{Request, Response};
//! use http_body_util::BodyExt;
//! use restline_http::connection::HttpConnection;
//! use restline_http::handler::from_fn;
//! use restline_http::protocol::body::ReqBody;
//! use tokio::net::TcpListener;
//! use tracing::{info, warn};
//!
//! async fn echo(request: Request<ReqBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
//!     let body = request.into_body().collect().await?.to_bytes();
//!     Ok(Response::new(String::from_utf8_lossy(&body).into_owned()))
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let tcp_listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = Arc::new(from_fn(echo));
//!
//!     loop {
//!         let (tcp_stream, remote_addr) = tcp_listener.accept().await?;
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             match HttpConnection::new(reader, writer).process(handler).await {
//!                 Ok(()) => info!(%remote_addr, "connection finished"),
//!                 Err(e) => warn!(%remote_addr, cause = %e, "connection failed"),
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`connection`]: the per-connection request loop and its limits
//! - [`codec`]: request decoding and response encoding
//! - [`protocol`]: messages, bodies, errors and request path helpers
//! - [`handler`]: the seam to application code
//!
//! # Limits
//!
//! Only HTTP/1.x is spoken and requests on one connection are served one at
//! a time. Request heads are capped at 8 KiB and 64 header fields by default,
//! see [`ConnectionConfig`](connection::ConnectionConfig).

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
