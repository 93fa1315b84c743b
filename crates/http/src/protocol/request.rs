//! Parsed request heads and the annotations attached to requests on their way
//! to a handler.

use std::sync::Arc;

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

/// The head of a request: method, target, version and the merged header map.
///
/// Wraps a `http::Request<()>` so that a body can be attached once the
/// connection knows how the body is framed.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, producing the request handed to handlers.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the connection must be closed once this request is answered.
    ///
    /// HTTP/1.0 requests always close; HTTP/1.1 requests close when they carry
    /// a `close` token in their `Connection` header.
    pub fn wants_close(&self) -> bool {
        self.version() == Version::HTTP_10 || has_close_token(self.headers())
    }

    /// Whether the client asked for an interim `100 Continue` before sending its body.
    pub fn expects_continue(&self) -> bool {
        self.version() == Version::HTTP_11
            && self
                .headers()
                .get(header::EXPECT)
                .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

/// True when a `Connection` header lists the `close` token.
pub(crate) fn has_close_token(headers: &HeaderMap) -> bool {
    headers.get_all(header::CONNECTION).iter().any(|value| {
        value.as_bytes().split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close"))
    })
}

/// The registration path of the listener that accepted a request.
///
/// Inserted into the request extensions by the dispatcher, always ends in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPath(Arc<str>);

impl MatchedPath {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
