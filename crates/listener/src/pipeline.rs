//! Stages a listener runs before dispatching on the request method.
//!
//! Stages run in the order they were added. Each one either passes the request
//! on with [`Next::run`] or answers it itself, in which case later stages and
//! the method handlers never see it.

use async_trait::async_trait;
use http::{Request, Response};
use restline_http::protocol::body::ReqBody;

use crate::body::ResponseBody;
use crate::handler::BoxError;
use crate::listener::HttpListener;

#[async_trait]
pub trait Stage: Send + Sync {
    async fn handle(&self, req: Request<ReqBody>, next: Next<'_>) -> Result<Response<ResponseBody>, BoxError>;
}

/// The rest of the pipeline after the current stage.
#[derive(Debug)]
pub struct Next<'a> {
    remaining: &'a [Box<dyn Stage>],
    listener: &'a HttpListener,
}

impl<'a> Next<'a> {
    pub(crate) fn new(remaining: &'a [Box<dyn Stage>], listener: &'a HttpListener) -> Self {
        Self { remaining, listener }
    }

    pub async fn run(self, req: Request<ReqBody>) -> Result<Response<ResponseBody>, BoxError> {
        match self.remaining.split_first() {
            Some((stage, remaining)) => stage.handle(req, Next::new(remaining, self.listener)).await,
            None => self.listener.dispatch_method(req).await,
        }
    }
}

impl std::fmt::Debug for dyn Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Stage")
    }
}
