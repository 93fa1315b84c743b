//! Path routed HTTP listeners.
//!
//! An [`HttpListener`] is opened on an absolute URI such as
//! `http://localhost:8080/api/` and serves every request whose path falls
//! under that prefix. Listeners sharing a `host:port` share one socket; the
//! [`HttpServer`] routes each request to the listener with the longest
//! matching path prefix, or answers `404 Not Found`.
//!
//! The protocol work happens in [`restline_http`]; this crate adds listener
//! URIs, per-method dispatch, pipeline stages, the path registry and the
//! accept loops.

mod body;
mod config;
mod error;
mod handler;
mod listener;
mod pipeline;
mod registry;
mod responder;
mod server;
#[cfg(feature = "tls")]
mod tls;
mod uri;

pub use body::ResponseBody;
pub use config::ListenerConfig;
pub use error::{ListenerError, RegistryError};
pub use handler::{BoxError, FnHandler, RequestHandler, handler_fn};
pub use listener::{HttpListener, HttpListenerBuilder, ListenerId};
pub use pipeline::{Next, Stage};
pub use registry::HostPortRegistry;
pub use responder::Responder;
pub use server::HttpServer;
#[cfg(feature = "tls")]
pub use tls::TlsConfig;
pub use uri::ListenerUri;
