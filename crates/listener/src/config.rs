use std::time::Duration;

use restline_http::connection::ConnectionConfig;

#[cfg(feature = "tls")]
use crate::tls::TlsConfig;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for the socket a listener is served from.
///
/// Listeners sharing a `host:port` share one socket; the first listener
/// registered for it decides these settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    timeout: Duration,
    connection: ConnectionConfig,
    #[cfg(feature = "tls")]
    tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connection: ConnectionConfig::default(),
            #[cfg(feature = "tls")]
            tls: None,
        }
    }
}

impl ListenerConfig {
    /// How long a connection may sit idle between requests before it is closed.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Header limits and read sizes for accepted connections.
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    #[cfg(feature = "tls")]
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(feature = "tls")]
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }

    /// The connection settings with the idle timeout applied.
    pub fn connection_config(&self) -> ConnectionConfig {
        self.connection.clone().with_idle_timeout(Some(self.timeout))
    }
}
