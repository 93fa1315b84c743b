use std::io;

use thiserror::Error;

/// Failures while adding or removing listeners. These are reported to the
/// caller and never affect requests already being served.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("a listener is already registered at {path}")]
    AlreadyRegistered { path: String },

    #[error("no listener is registered at {path}")]
    NotRegistered { path: String },

    #[error("{hostport} can't serve http and https listeners at the same time")]
    SchemeMismatch { hostport: String },

    #[error("no listener is registered for {hostport}")]
    UnknownHost { hostport: String },
}

impl RegistryError {
    pub fn already_registered<S: ToString>(path: S) -> Self {
        Self::AlreadyRegistered { path: path.to_string() }
    }

    pub fn not_registered<S: ToString>(path: S) -> Self {
        Self::NotRegistered { path: path.to_string() }
    }

    pub fn scheme_mismatch<S: ToString>(hostport: S) -> Self {
        Self::SchemeMismatch { hostport: hostport.to_string() }
    }

    pub fn unknown_host<S: ToString>(hostport: S) -> Self {
        Self::UnknownHost { hostport: hostport.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("unsupported listener scheme {scheme:?}, expected http or https")]
    UnsupportedScheme { scheme: String },

    #[error("listener uri has no host")]
    MissingHost,

    #[error("listener uri must not have a query")]
    HasQuery,

    #[error("listener uri must not have a fragment")]
    HasFragment,

    #[error("invalid listener uri: {reason}")]
    Parse { reason: String },

    #[error("failed to bind {hostport}: {source}")]
    Bind { hostport: String, source: io::Error },

    #[error("https listener at {hostport} has no tls configuration")]
    TlsNotConfigured { hostport: String },

    #[error("registry error: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },
}

impl ListenerError {
    pub fn unsupported_scheme<S: ToString>(scheme: S) -> Self {
        Self::UnsupportedScheme { scheme: scheme.to_string() }
    }

    pub fn parse<S: ToString>(reason: S) -> Self {
        Self::Parse { reason: reason.to_string() }
    }

    pub fn bind<S: ToString>(hostport: S, source: io::Error) -> Self {
        Self::Bind { hostport: hostport.to_string(), source }
    }

    pub fn tls_not_configured<S: ToString>(hostport: S) -> Self {
        Self::TlsNotConfigured { hostport: hostport.to_string() }
    }
}
