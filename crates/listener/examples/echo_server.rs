use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderValue, Method, Request, Response};
use http_body_util::BodyExt;
use restline::{BoxError, HttpListener, HttpServer, ListenerConfig, Next, ResponseBody, Stage, handler_fn};
use restline_http::protocol::MatchedPath;
use restline_http::protocol::body::ReqBody;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Tags every response with the listener path that served it.
struct ServedBy;

#[async_trait]
impl Stage for ServedBy {
    async fn handle(&self, req: Request<ReqBody>, next: Next<'_>) -> Result<Response<ResponseBody>, BoxError> {
        let matched = req.extensions().get::<MatchedPath>().map(|path| path.as_str().to_owned());
        let mut response = next.run(req).await?;
        if let Some(value) = matched.and_then(|path| HeaderValue::from_str(&path).ok()) {
            response.headers_mut().insert("x-served-by", value);
        }
        Ok(response)
    }
}

async fn echo(req: Request<ReqBody>) -> Result<String, BoxError> {
    let body = req.into_body().collect().await?.to_bytes();
    info!(len = body.len(), "echoing request body");
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
    }

    let listener = match HttpListener::builder("http://127.0.0.1:8080/echo") {
        Ok(builder) => builder
            .config(ListenerConfig::default().with_timeout(Duration::from_secs(30)))
            .stage(ServedBy)
            .support(Method::POST, handler_fn(echo))
            .support(Method::GET, handler_fn(|_req| async { Ok::<_, Infallible>("POST something to echo it back\n") }))
            .build(),
        Err(e) => {
            error!(cause = %e, "invalid listener uri");
            return;
        }
    };

    let server = HttpServer::new();
    if let Err(e) = server.register(Arc::new(listener)).await {
        error!(cause = %e, "failed to register listener");
        return;
    }
    if let Err(e) = server.start().await {
        error!(cause = %e, "failed to start server");
        return;
    }

    info!("serving http://127.0.0.1:8080/echo/, press ctrl-c to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(cause = %e, "failed to wait for ctrl-c");
    }
    server.stop().await;
}
