use std::fmt;

use async_trait::async_trait;
use http::{Request, Response};
use restline_http::protocol::body::ReqBody;

pub use restline_http::handler::BoxError;

use crate::body::ResponseBody;
use crate::responder::Responder;

/// Handles the requests a listener accepts for one method, or for all of them.
///
/// An `Err` is answered with `500 Internal Server Error`.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: Request<ReqBody>) -> Result<Response<ResponseBody>, BoxError>;
}

/// A [`RequestHandler`] backed by an async closure returning any [`Responder`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Wraps an async function as a [`RequestHandler`].
///
/// ```
/// use std::convert::Infallible;
/// use http::Request;
/// use restline::handler_fn;
/// use restline_http::protocol::body::ReqBody;
///
/// let handler = handler_fn(|req: Request<ReqBody>| async move {
///     Ok::<_, Infallible>(format!("you asked for {}", req.uri().path()))
/// });
/// ```
pub fn handler_fn<F, Fut, R, E>(f: F) -> FnHandler<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Responder,
    E: Into<BoxError>,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut, R, E> RequestHandler for FnHandler<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Responder,
    E: Into<BoxError>,
{
    async fn invoke(&self, req: Request<ReqBody>) -> Result<Response<ResponseBody>, BoxError> {
        match (self.f)(req).await {
            Ok(responder) => Ok(responder.into_response()),
            Err(e) => Err(e.into()),
        }
    }
}
