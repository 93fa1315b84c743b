//! The server owning every `host:port` registry and its accept loop.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use restline_http::connection::{ConnectionConfig, HttpConnection};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::ListenerConfig;
use crate::error::{ListenerError, RegistryError};
use crate::listener::{HttpListener, ListenerId};
use crate::registry::HostPortRegistry;
#[cfg(feature = "tls")]
use crate::tls::TlsConfig;

/// Accepts connections for registered listeners.
///
/// Listeners are grouped by `host:port`; each group gets one socket and one
/// [`HostPortRegistry`] when its first listener is registered. The socket is
/// bound on [`start`](Self::start), or straight away if the server is already
/// running, and stays bound until [`stop`](Self::stop).
///
/// ```no_run
/// use std::convert::Infallible;
/// use std::sync::Arc;
///
/// use http::Method;
/// use restline::{HttpListener, HttpServer, handler_fn};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = HttpListener::builder("http://localhost:8080/hello")?
///     .support(Method::GET, handler_fn(|_req| async { Ok::<_, Infallible>("hello") }))
///     .build();
///
/// let server = HttpServer::new();
/// server.register(Arc::new(listener)).await?;
/// server.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpServer {
    state: Mutex<ServerState>,
}

#[derive(Default)]
struct ServerState {
    started: bool,
    endpoints: HashMap<String, Endpoint>,
    registered: HashMap<ListenerId, Registration>,
}

struct Registration {
    listener: Arc<HttpListener>,
}

impl HttpServer {
    pub fn new() -> Self {
        Self { state: Mutex::new(ServerState::default()) }
    }

    /// Starts serving `listener` under its URI's path.
    pub async fn register(&self, listener: Arc<HttpListener>) -> Result<(), ListenerError> {
        let mut state = self.state.lock().await;
        let uri = listener.uri().clone();
        if state.registered.contains_key(&listener.id()) {
            return Err(RegistryError::already_registered(uri.path()).into());
        }

        let created = !state.endpoints.contains_key(uri.hostport());
        if created {
            let endpoint = Endpoint::new(uri.hostport(), uri.is_secure(), listener.config())?;
            state.endpoints.insert(uri.hostport().to_owned(), endpoint);
        }

        let started = state.started;
        let result = match state.endpoints.get_mut(uri.hostport()) {
            Some(endpoint) => register_on(endpoint, &listener, created && started).await,
            None => Err(RegistryError::unknown_host(uri.hostport()).into()),
        };

        if let Err(e) = result {
            if created {
                state.endpoints.remove(uri.hostport());
            }
            return Err(e);
        }

        state.registered.insert(listener.id(), Registration { listener });
        Ok(())
    }

    /// Stops serving `listener`, waiting for the requests it is handling to
    /// finish.
    pub async fn unregister(&self, listener: &HttpListener) -> Result<(), ListenerError> {
        let uri = listener.uri();
        let registry = {
            let mut state = self.state.lock().await;
            if state.registered.remove(&listener.id()).is_none() {
                return Err(RegistryError::not_registered(uri.path()).into());
            }
            match state.endpoints.get(uri.hostport()) {
                Some(endpoint) => Arc::clone(&endpoint.registry),
                None => return Err(RegistryError::unknown_host(uri.hostport()).into()),
            }
        };

        // waits for in-flight handlers without holding up other registrations
        registry.remove_listener(uri.path(), listener).await?;
        Ok(())
    }

    /// Binds every registered `host:port`.
    ///
    /// If one of them fails to bind, the ones already bound are released again.
    pub async fn start(&self) -> Result<(), ListenerError> {
        let mut state = self.state.lock().await;
        if state.started {
            return Ok(());
        }

        let mut bound = Vec::new();
        let mut failure = None;
        for (hostport, endpoint) in &mut state.endpoints {
            match endpoint.start().await {
                Ok(()) => bound.push(hostport.clone()),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            error!(cause = %e, "failed to start server");
            for hostport in bound {
                if let Some(endpoint) = state.endpoints.get_mut(&hostport) {
                    endpoint.stop().await;
                }
            }
            return Err(e);
        }

        state.started = true;
        info!(endpoints = state.endpoints.len(), "server started");
        Ok(())
    }

    /// Closes every socket and connection, answering unanswered requests with
    /// `500`, and waits for all connection tasks to finish.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if !state.started {
            return;
        }

        for endpoint in state.endpoints.values_mut() {
            endpoint.stop().await;
        }
        state.started = false;
        info!("server stopped");
    }

    /// The address `hostport` is bound to, useful after binding port `0`.
    pub async fn local_addr(&self, hostport: &str) -> Option<SocketAddr> {
        let state = self.state.lock().await;
        state.endpoints.get(hostport).and_then(|endpoint| endpoint.local_addr)
    }

    /// The listeners currently registered.
    pub async fn listeners(&self) -> Vec<Arc<HttpListener>> {
        let state = self.state.lock().await;
        state.registered.values().map(|registration| Arc::clone(&registration.listener)).collect()
    }
}

async fn register_on(endpoint: &mut Endpoint, listener: &Arc<HttpListener>, start: bool) -> Result<(), ListenerError> {
    endpoint.registry.add_listener(listener.uri().path(), Arc::clone(listener))?;
    if start && let Err(e) = endpoint.start().await {
        endpoint.registry.remove_listener(listener.uri().path(), listener).await?;
        return Err(e);
    }
    Ok(())
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer").finish_non_exhaustive()
    }
}

/// How accepted sockets are turned into byte streams.
#[derive(Clone)]
enum StreamAcceptor {
    Plain,
    #[cfg(feature = "tls")]
    Tls(TlsConfig),
}

impl StreamAcceptor {
    fn for_endpoint(hostport: &str, secure: bool, config: &ListenerConfig) -> Result<Self, ListenerError> {
        if !secure {
            return Ok(Self::Plain);
        }

        #[cfg(feature = "tls")]
        if let Some(tls) = config.tls() {
            return Ok(Self::Tls(tls.clone()));
        }

        #[cfg(not(feature = "tls"))]
        let _ = config;
        Err(ListenerError::tls_not_configured(hostport))
    }
}

/// One `host:port`: its registry, and its accept loop while started.
struct Endpoint {
    hostport: String,
    registry: Arc<HostPortRegistry>,
    acceptor: StreamAcceptor,
    connection_config: ConnectionConfig,
    running: Option<Running>,
    local_addr: Option<SocketAddr>,
}

struct Running {
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Endpoint {
    fn new(hostport: &str, secure: bool, config: &ListenerConfig) -> Result<Self, ListenerError> {
        Ok(Self {
            hostport: hostport.to_owned(),
            registry: Arc::new(HostPortRegistry::new(hostport, secure)),
            acceptor: StreamAcceptor::for_endpoint(hostport, secure, config)?,
            connection_config: config.connection_config(),
            running: None,
            local_addr: None,
        })
    }

    async fn start(&mut self) -> Result<(), ListenerError> {
        if self.running.is_some() {
            return Ok(());
        }

        let tcp_listener =
            TcpListener::bind(&self.hostport).await.map_err(|e| ListenerError::bind(&self.hostport, e))?;
        self.local_addr = tcp_listener.local_addr().ok();
        info!(hostport = %self.hostport, local_addr = ?self.local_addr, "start listening");

        let running = Running { shutdown: CancellationToken::new(), tracker: TaskTracker::new() };
        running.tracker.spawn(accept_loop(
            tcp_listener,
            Arc::clone(&self.registry),
            self.acceptor.clone(),
            self.connection_config.clone(),
            running.shutdown.clone(),
            running.tracker.clone(),
        ));
        self.running = Some(running);
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown.cancel();
        running.tracker.close();
        running.tracker.wait().await;
        self.local_addr = None;
        info!(hostport = %self.hostport, "stop listening");
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.shutdown.cancel();
        }
    }
}

async fn accept_loop(
    tcp_listener: TcpListener,
    registry: Arc<HostPortRegistry>,
    acceptor: StreamAcceptor,
    connection_config: ConnectionConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        let (tcp_stream, remote_addr) = select! {
            () = shutdown.cancelled() => break,
            accepted = tcp_listener.accept() => match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    tokio::task::yield_now().await;
                    continue;
                }
            },
        };

        debug!(%remote_addr, "accepted connection");
        tracker.spawn(serve_stream(
            tcp_stream,
            remote_addr,
            Arc::clone(&registry),
            acceptor.clone(),
            connection_config.clone(),
            shutdown.clone(),
        ));
    }
}

async fn serve_stream(
    tcp_stream: TcpStream,
    remote_addr: SocketAddr,
    registry: Arc<HostPortRegistry>,
    acceptor: StreamAcceptor,
    connection_config: ConnectionConfig,
    shutdown: CancellationToken,
) {
    match acceptor {
        StreamAcceptor::Plain => {
            let (reader, writer) = tcp_stream.into_split();
            serve_connection(reader, writer, remote_addr, registry, connection_config, shutdown).await;
        }
        #[cfg(feature = "tls")]
        StreamAcceptor::Tls(tls) => {
            let tls_stream = select! {
                () = shutdown.cancelled() => return,
                accepted = tls.accept(tcp_stream) => match accepted {
                    Ok(tls_stream) => tls_stream,
                    Err(e) => {
                        warn!(%remote_addr, cause = %e, "tls handshake failed");
                        return;
                    }
                },
            };
            let (reader, writer) = tokio::io::split(tls_stream);
            serve_connection(reader, writer, remote_addr, registry, connection_config, shutdown).await;
        }
    }
}

async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    remote_addr: SocketAddr,
    registry: Arc<HostPortRegistry>,
    connection_config: ConnectionConfig,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let connection = HttpConnection::with_config(reader, writer, connection_config);
    match connection.process_until(registry, shutdown).await {
        Ok(()) => debug!(%remote_addr, "connection finished"),
        Err(e) => warn!(%remote_addr, cause = %e, "connection closed with error"),
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use http::{Method, Request};
    use http_body_util::BodyExt;
    use indoc::indoc;
    use restline_http::protocol::body::ReqBody;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::Notify;

    use super::*;
    use crate::handler::handler_fn;

    fn ok_listener(uri: &str, body: &'static str) -> Arc<HttpListener> {
        let listener = HttpListener::builder(uri)
            .unwrap()
            .support(Method::GET, handler_fn(move |_req: Request<ReqBody>| async move { Ok::<_, Infallible>(body) }))
            .build();
        Arc::new(listener)
    }

    async fn started_server(listener: Arc<HttpListener>) -> (HttpServer, SocketAddr) {
        let hostport = listener.uri().hostport().to_owned();
        let server = HttpServer::new();
        server.register(listener).await.unwrap();
        server.start().await.unwrap();
        let local_addr = server.local_addr(&hostport).await.unwrap();
        (server, local_addr)
    }

    async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
        let mut received = Vec::new();
        let mut buf = [0; 1024];
        while !String::from_utf8_lossy(&received).contains(needle) {
            let read = stream.read(&mut buf).await.unwrap();
            assert_ne!(read, 0, "connection closed early: {}", String::from_utf8_lossy(&received));
            received.extend_from_slice(&buf[..read]);
        }
        String::from_utf8(received).unwrap()
    }

    #[tokio::test]
    async fn basic_get_reuses_connection() {
        let (server, local_addr) = started_server(ok_listener("http://127.0.0.1:0/x", "ok")).await;
        let mut stream = TcpStream::connect(local_addr).await.unwrap();

        stream.write_all(b"GET /x HTTP/1.1\r\nHost: h\r\n\r\n").await.unwrap();
        let response = read_until(&mut stream, "\r\n\r\nok").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("content-length: 2\r\n"));

        stream.write_all(b"GET /x/again HTTP/1.1\r\nHost: h\r\n\r\n").await.unwrap();
        let response = read_until(&mut stream, "\r\n\r\nok").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

        server.stop().await;
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (server, local_addr) = started_server(ok_listener("http://127.0.0.1:0/x", "ok")).await;
        let mut stream = TcpStream::connect(local_addr).await.unwrap();

        let request = indoc! {"
            GET /y HTTP/1.1\r
            Host: h\r
            \r
        "};
        stream.write_all(request.as_bytes()).await.unwrap();
        let response = read_until(&mut stream, "\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

        server.stop().await;
    }

    #[tokio::test]
    async fn registration_errors() {
        let server = HttpServer::new();
        let listener = ok_listener("http://127.0.0.1:0/p", "one");
        server.register(Arc::clone(&listener)).await.unwrap();

        let again = server.register(Arc::clone(&listener)).await;
        assert!(matches!(again, Err(ListenerError::Registry { source: RegistryError::AlreadyRegistered { .. } })));

        let same_path = server.register(ok_listener("http://127.0.0.1:0/p/", "two")).await;
        assert!(matches!(same_path, Err(ListenerError::Registry { source: RegistryError::AlreadyRegistered { .. } })));

        let https = server.register(ok_listener("https://127.0.0.1:0/q", "tls")).await;
        assert!(matches!(https, Err(ListenerError::Registry { source: RegistryError::SchemeMismatch { .. } })));

        server.unregister(&listener).await.unwrap();
        assert!(matches!(server.unregister(&listener).await, Err(ListenerError::Registry { .. })));
        assert!(server.listeners().await.is_empty());
    }

    #[cfg(not(feature = "tls"))]
    #[tokio::test]
    async fn https_needs_tls() {
        let server = HttpServer::new();
        let result = server.register(ok_listener("https://127.0.0.1:0/", "tls")).await;
        assert!(matches!(result, Err(ListenerError::TlsNotConfigured { .. })));
    }

    #[tokio::test]
    async fn failed_start_releases_bound_sockets() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = occupied.local_addr().unwrap();

        let server = HttpServer::new();
        server.register(ok_listener("http://127.0.0.1:0/", "free")).await.unwrap();
        server.register(ok_listener(&format!("http://{taken}/"), "taken")).await.unwrap();

        assert!(matches!(server.start().await, Err(ListenerError::Bind { .. })));
        assert!(server.local_addr("127.0.0.1:0").await.is_none());
    }

    #[tokio::test]
    async fn registering_on_started_server_binds_immediately() {
        let (server, _) = started_server(ok_listener("http://127.0.0.1:0/a", "a")).await;
        let late = ok_listener("http://localhost:0/b", "b");
        server.register(late).await.unwrap();
        assert!(server.local_addr("localhost:0").await.is_some());
        server.stop().await;
    }

    #[tokio::test]
    async fn stop_answers_in_flight_requests() {
        let entered = Arc::new(Notify::new());
        let signal = Arc::clone(&entered);
        let listener = HttpListener::builder("http://127.0.0.1:0/slow")
            .unwrap()
            .support(
                Method::GET,
                handler_fn(move |_req: Request<ReqBody>| {
                    let signal = Arc::clone(&signal);
                    async move {
                        signal.notify_one();
                        futures::future::pending::<()>().await;
                        Ok::<_, Infallible>("never")
                    }
                }),
            )
            .build();
        let (server, local_addr) = started_server(Arc::new(listener)).await;

        let mut stream = TcpStream::connect(local_addr).await.unwrap();
        stream.write_all(b"GET /slow HTTP/1.1\r\n\r\n").await.unwrap();
        entered.notified().await;

        tokio::time::timeout(Duration::from_secs(5), server.stop()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn unregister_waits_for_handler() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let (signal, wait) = (Arc::clone(&entered), Arc::clone(&release));
        let listener = HttpListener::builder("http://127.0.0.1:0/slow")
            .unwrap()
            .support(
                Method::POST,
                handler_fn(move |req: Request<ReqBody>| {
                    let (signal, wait) = (Arc::clone(&signal), Arc::clone(&wait));
                    async move {
                        let body = req.into_body().collect().await?.to_bytes();
                        signal.notify_one();
                        wait.notified().await;
                        Ok::<_, restline_http::protocol::ParseError>(String::from_utf8_lossy(&body).into_owned())
                    }
                }),
            )
            .build();
        let listener = Arc::new(listener);
        let (server, local_addr) = started_server(Arc::clone(&listener)).await;
        let server = Arc::new(server);

        let mut stream = TcpStream::connect(local_addr).await.unwrap();
        stream.write_all(b"POST /slow/ HTTP/1.1\r\nContent-Length: 4\r\n\r\nping").await.unwrap();
        entered.notified().await;

        let mut unregister = tokio::spawn({
            let server = Arc::clone(&server);
            let listener = Arc::clone(&listener);
            async move { server.unregister(&listener).await.is_ok() }
        });
        assert!(tokio::time::timeout(Duration::from_millis(100), &mut unregister).await.is_err());

        release.notify_one();
        let response = read_until(&mut stream, "\r\n\r\nping").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(unregister.await.unwrap());

        stream.write_all(b"GET /slow/ HTTP/1.1\r\n\r\n").await.unwrap();
        let response = read_until(&mut stream, "\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        server.stop().await;
    }
}
