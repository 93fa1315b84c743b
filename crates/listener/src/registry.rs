//! Path prefix routing for every listener sharing one `host:port`.
//!
//! Lookups take the map lock only long enough to clone out the matching
//! entry. The handler then runs under that entry's own read gate, so
//! [`HostPortRegistry::remove_listener`] can wait for its in-flight requests
//! by taking the gate for writing, without holding up any other listener.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use http::{Request, Response, StatusCode};
use restline_http::handler::Handler;
use restline_http::protocol::MatchedPath;
use restline_http::protocol::body::ReqBody;
use restline_http::protocol::path::{decode_and_split, prefix_candidates, with_trailing_slash};
use tokio::sync::RwLock as GateLock;
use tracing::{debug, info, warn};

use crate::body::ResponseBody;
use crate::error::RegistryError;
use crate::handler::BoxError;
use crate::listener::HttpListener;
use crate::responder::Responder;

struct ListenerEntry {
    listener: Arc<HttpListener>,
    gate: Arc<GateLock<()>>,
    active: AtomicBool,
}

/// The listeners served from one `host:port`, keyed by path prefix.
///
/// A registry serves either `http` or `https` listeners, never both.
pub struct HostPortRegistry {
    hostport: String,
    secure: bool,
    listeners: RwLock<HashMap<String, Arc<ListenerEntry>>>,
}

impl HostPortRegistry {
    pub fn new(hostport: impl Into<String>, secure: bool) -> Self {
        Self { hostport: hostport.into(), secure, listeners: RwLock::new(HashMap::new()) }
    }

    pub fn hostport(&self) -> &str {
        &self.hostport
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    /// Registers `listener` for every request path under `path`.
    pub fn add_listener(&self, path: &str, listener: Arc<HttpListener>) -> Result<(), RegistryError> {
        if listener.uri().is_secure() != self.secure {
            return Err(RegistryError::scheme_mismatch(&self.hostport));
        }

        let path = with_trailing_slash(path);
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        match listeners.entry(path) {
            Entry::Occupied(occupied) => Err(RegistryError::already_registered(occupied.key())),
            Entry::Vacant(vacant) => {
                info!(hostport = %self.hostport, path = %vacant.key(), "listener registered");
                let entry = ListenerEntry { listener, gate: Arc::new(GateLock::new(())), active: AtomicBool::new(true) };
                vacant.insert(Arc::new(entry));
                Ok(())
            }
        }
    }

    /// Unregisters the listener at `path` and waits for the requests it is
    /// still handling to finish.
    ///
    /// Requests that were routed to it but had not started yet get `404`.
    pub async fn remove_listener(&self, path: &str, listener: &HttpListener) -> Result<(), RegistryError> {
        let path = with_trailing_slash(path);
        let entry = {
            let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
            let owned = listeners.get(&path).is_some_and(|entry| entry.listener.id() == listener.id());
            if owned { listeners.remove(&path) } else { None }
        };
        let entry = entry.ok_or_else(|| RegistryError::not_registered(&path))?;

        entry.active.store(false, Ordering::Release);
        let _drained = entry.gate.write().await;
        info!(hostport = %self.hostport, %path, "listener unregistered");
        Ok(())
    }

    /// The registered prefix closest to `segments`, with its entry.
    fn lookup(&self, segments: &[String]) -> Option<(String, Arc<ListenerEntry>)> {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        prefix_candidates(segments).find_map(|candidate| {
            let entry = listeners.get(&candidate)?;
            Some((candidate, Arc::clone(entry)))
        })
    }
}

#[async_trait]
impl Handler<ReqBody> for HostPortRegistry {
    type RespBody = ResponseBody;
    type Error = BoxError;

    async fn call(&self, mut req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        let segments = match decode_and_split(req.uri().path()) {
            Ok(segments) => segments,
            Err(e) => {
                warn!(cause = %e, "can't decode request path");
                return Ok((StatusCode::BAD_REQUEST, e.to_string()).into_response());
            }
        };

        let Some((path, entry)) = self.lookup(&segments) else {
            debug!(hostport = %self.hostport, uri = %req.uri(), "no listener for request");
            return Ok(StatusCode::NOT_FOUND.into_response());
        };

        let _in_flight = Arc::clone(&entry.gate).read_owned().await;
        if !entry.active.load(Ordering::Acquire) {
            debug!(hostport = %self.hostport, %path, "listener went away before the request started");
            return Ok(StatusCode::NOT_FOUND.into_response());
        }

        req.extensions_mut().insert(MatchedPath::new(path));
        entry.listener.handle(req).await
    }
}

impl std::fmt::Debug for HostPortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("HostPortRegistry")
            .field("hostport", &self.hostport)
            .field("secure", &self.secure)
            .field("paths", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use http::Method;
    use http_body_util::BodyExt;
    use tokio::sync::Notify;

    use super::*;
    use crate::handler::handler_fn;

    fn request(path: &str) -> Request<ReqBody> {
        let mut request = Request::new(ReqBody::empty());
        *request.uri_mut() = path.parse().unwrap();
        request
    }

    fn named(uri: &str, name: &'static str) -> Arc<HttpListener> {
        let listener = HttpListener::builder(uri)
            .unwrap()
            .support(
                Method::GET,
                handler_fn(move |req: Request<ReqBody>| async move {
                    let matched = req.extensions().get::<MatchedPath>().map(|path| path.as_str().to_owned());
                    Ok::<_, Infallible>(format!("{name} {}", matched.unwrap_or_default()))
                }),
            )
            .build();
        Arc::new(listener)
    }

    async fn body_text(registry: &HostPortRegistry, path: &str) -> (StatusCode, String) {
        let response = registry.call(request(path)).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn longest_prefix_wins() {
        let registry = HostPortRegistry::new("localhost:80", false);
        registry.add_listener("/a/b/", named("http://localhost/a/b/", "ab")).unwrap();

        for path in ["/a/b/", "/a/b/c", "/a/b/c/d"] {
            assert_eq!(body_text(&registry, path).await, (StatusCode::OK, "ab /a/b/".to_owned()));
        }
        assert_eq!(body_text(&registry, "/a/").await.0, StatusCode::NOT_FOUND);

        registry.add_listener("/", named("http://localhost/", "root")).unwrap();
        registry.add_listener("/a/b/c", named("http://localhost/a/b/c", "abc")).unwrap();
        assert_eq!(body_text(&registry, "/a/b/c/d").await.1, "abc /a/b/c/");
        assert_eq!(body_text(&registry, "/a/b/x").await.1, "ab /a/b/");
        assert_eq!(body_text(&registry, "/elsewhere").await.1, "root /");
    }

    #[tokio::test]
    async fn percent_encoded_paths_match_decoded_prefixes() {
        let registry = HostPortRegistry::new("localhost:80", false);
        registry.add_listener("/a b/", named("http://localhost/a%20b/", "space")).unwrap();
        assert_eq!(body_text(&registry, "/a%20b/x").await.1, "space /a b/");
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_first() {
        let registry = HostPortRegistry::new("localhost:80", false);
        registry.add_listener("/p/", named("http://localhost/p/", "first")).unwrap();

        let error = registry.add_listener("/p", named("http://localhost/p/", "second")).unwrap_err();
        assert!(matches!(error, RegistryError::AlreadyRegistered { ref path } if path == "/p/"));
        assert_eq!(body_text(&registry, "/p/").await.1, "first /p/");
    }

    #[tokio::test]
    async fn scheme_mismatch_is_rejected() {
        let registry = HostPortRegistry::new("localhost:443", false);
        let error = registry.add_listener("/", named("https://localhost:443/", "tls")).unwrap_err();
        assert!(matches!(error, RegistryError::SchemeMismatch { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn removing_unknown_or_foreign_listener_fails() {
        let registry = HostPortRegistry::new("localhost:80", false);
        let registered = named("http://localhost/p/", "registered");
        let stranger = named("http://localhost/p/", "stranger");
        registry.add_listener("/p/", Arc::clone(&registered)).unwrap();

        assert!(matches!(registry.remove_listener("/q/", &registered).await, Err(RegistryError::NotRegistered { .. })));
        assert!(matches!(registry.remove_listener("/p/", &stranger).await, Err(RegistryError::NotRegistered { .. })));

        registry.remove_listener("/p", &registered).await.unwrap();
        assert_eq!(body_text(&registry, "/p/").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remove_waits_for_in_flight_handler() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let (entered_signal, release_wait) = (Arc::clone(&entered), Arc::clone(&release));
        let listener = HttpListener::builder("http://localhost/slow/")
            .unwrap()
            .support(
                Method::GET,
                handler_fn(move |_req: Request<ReqBody>| {
                    let (entered, release) = (Arc::clone(&entered_signal), Arc::clone(&release_wait));
                    async move {
                        entered.notify_one();
                        release.notified().await;
                        Ok::<_, Infallible>("slow")
                    }
                }),
            )
            .build();
        let listener = Arc::new(listener);

        let registry = Arc::new(HostPortRegistry::new("localhost:80", false));
        registry.add_listener("/slow/", Arc::clone(&listener)).unwrap();

        let in_flight = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.call(request("/slow/")).await.map(|response| response.status()) }
        });
        entered.notified().await;

        let mut removal = tokio::spawn({
            let registry = Arc::clone(&registry);
            let listener = Arc::clone(&listener);
            async move { registry.remove_listener("/slow/", &listener).await }
        });
        assert!(tokio::time::timeout(Duration::from_millis(100), &mut removal).await.is_err());

        release.notify_one();
        assert_eq!(in_flight.await.unwrap().unwrap(), StatusCode::OK);
        assert!(removal.await.unwrap().is_ok());
    }
}
