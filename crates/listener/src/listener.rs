//! Listeners: a URI plus the handlers serving requests under it.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use restline_http::protocol::body::ReqBody;
use tracing::trace;

use crate::body::ResponseBody;
use crate::config::ListenerConfig;
use crate::error::ListenerError;
use crate::handler::{BoxError, RequestHandler};
use crate::pipeline::{Next, Stage};
use crate::uri::ListenerUri;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one listener for as long as the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Serves the requests under one URI.
///
/// Requests first pass through the listener's [stages](Stage), then go to the
/// handler registered for their method. Without one, `OPTIONS` is answered
/// with the supported methods, `TRACE` echoes the request head back, and
/// anything else goes to the catch-all handler or gets
/// `405 Method Not Allowed`.
pub struct HttpListener {
    id: ListenerId,
    uri: ListenerUri,
    config: ListenerConfig,
    // ordered, so `Allow` lists methods the same way every time
    handlers: BTreeMap<String, Box<dyn RequestHandler>>,
    fallback: Option<Box<dyn RequestHandler>>,
    stages: Vec<Box<dyn Stage>>,
}

impl HttpListener {
    /// Starts building a listener for an absolute `http` or `https` URI.
    pub fn builder(uri: &str) -> Result<HttpListenerBuilder, ListenerError> {
        Ok(HttpListenerBuilder::new(ListenerUri::parse(uri)?))
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn uri(&self) -> &ListenerUri {
        &self.uri
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Runs a request through the stages and the method dispatch.
    pub async fn handle(&self, req: Request<ReqBody>) -> Result<Response<ResponseBody>, BoxError> {
        Next::new(&self.stages, self).run(req).await
    }

    pub(crate) async fn dispatch_method(&self, req: Request<ReqBody>) -> Result<Response<ResponseBody>, BoxError> {
        if let Some(handler) = self.handlers.get(req.method().as_str()) {
            return handler.invoke(req).await;
        }

        let method = req.method().clone();
        match method {
            Method::OPTIONS => Ok(self.allow_response(StatusCode::OK)),
            Method::TRACE => Ok(trace_response(&req)),
            _ => match &self.fallback {
                Some(handler) => handler.invoke(req).await,
                None => {
                    trace!(%method, uri = %self.uri, "method not supported");
                    Ok(self.allow_response(StatusCode::METHOD_NOT_ALLOWED))
                }
            },
        }
    }

    /// The registered methods, comma separated.
    pub fn supported_methods(&self) -> String {
        self.handlers.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
    }

    fn allow_response(&self, status: StatusCode) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = status;
        if let Ok(allow) = HeaderValue::from_str(&self.supported_methods()) {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        response
    }
}

/// Echoes the request line and headers back as `message/http`.
fn trace_response(req: &Request<ReqBody>) -> Response<ResponseBody> {
    let mut echo = String::new();
    let _ = write!(echo, "{} {} {:?}\r\n", req.method(), req.uri(), req.version());
    for (name, value) in req.headers() {
        let _ = write!(echo, "{name}: {}\r\n", String::from_utf8_lossy(value.as_bytes()));
    }
    echo.push_str("\r\n");

    let mut response = Response::new(ResponseBody::from(echo));
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("message/http"));
    response
}

impl fmt::Debug for HttpListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpListener")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("methods", &self.supported_methods())
            .field("fallback", &self.fallback.is_some())
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

pub struct HttpListenerBuilder {
    uri: ListenerUri,
    config: ListenerConfig,
    handlers: BTreeMap<String, Box<dyn RequestHandler>>,
    fallback: Option<Box<dyn RequestHandler>>,
    stages: Vec<Box<dyn Stage>>,
}

impl HttpListenerBuilder {
    pub fn new(uri: ListenerUri) -> Self {
        Self { uri, config: ListenerConfig::default(), handlers: BTreeMap::new(), fallback: None, stages: Vec::new() }
    }

    /// Serves `method` with `handler`, replacing any earlier handler for it.
    #[must_use]
    pub fn support<H: RequestHandler + 'static>(mut self, method: Method, handler: H) -> Self {
        self.handlers.insert(method.as_str().to_owned(), Box::new(handler));
        self
    }

    /// Serves every method without a handler of its own.
    #[must_use]
    pub fn support_all<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Appends a stage to the pipeline.
    #[must_use]
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn config(mut self, config: ListenerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> HttpListener {
        HttpListener {
            id: ListenerId::next(),
            uri: self.uri,
            config: self.config,
            handlers: self.handlers,
            fallback: self.fallback,
            stages: self.stages,
        }
    }
}

impl fmt::Debug for HttpListenerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpListenerBuilder").field("uri", &self.uri).finish_non_exhaustive()
    }
}
