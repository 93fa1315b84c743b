//! The seam between a connection and application code.
//!
//! A connection hands every decoded request to a [`Handler`] and writes back
//! whatever response it returns. An `Err` becomes `500 Internal Server Error`
//! and the connection stays usable.
//!
//! [`from_fn`] adapts an async function:
//!
//! ```no_run
//! use http::{Request, Response};
//! use restline_http::handler::{BoxError, from_fn};
//! use restline_http::protocol::body::ReqBody;
//!
//! async fn hello(_req: Request<ReqBody>) -> Result<Response<String>, BoxError> {
//!     Ok(Response::new("hello".to_owned()))
//! }
//!
//! let handler = from_fn(hello);
//! ```

use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use http::{Request, Response};
use http_body::Body;

/// Error type handlers may fail with.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[async_trait]
pub trait Handler<ReqBody>: Send + Sync {
    type RespBody: Body;
    type Error: Into<BoxError> + Send;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

/// A [`Handler`] backed by an async function or closure, see [`from_fn`].
pub struct FromFn<F> {
    f: F,
}

pub fn from_fn<F, ReqBody, RespBody, Err, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request<ReqBody>) -> Fut,
    Fut: Future<Output = Result<Response<RespBody>, Err>>,
    RespBody: Body,
    Err: Into<BoxError>,
{
    FromFn { f }
}

#[async_trait]
impl<ReqBody, RespBody, Err, F, Fut> Handler<ReqBody> for FromFn<F>
where
    ReqBody: Send + 'static,
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
    RespBody: Body,
    Err: Into<BoxError> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<RespBody>, Err> {
        (self.f)(req).await
    }
}

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use http::StatusCode;

    use super::*;

    #[tokio::test]
    async fn closure_sees_the_request() {
        let handler = from_fn(|req: Request<String>| async move {
            let mut response = Response::new(req.into_body().to_uppercase());
            *response.status_mut() = StatusCode::ACCEPTED;
            Ok::<_, Infallible>(response)
        });

        let response = handler.call(Request::new("ping".to_owned())).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body(), "PING");
    }
}
