//! The absolute URI a listener is opened on.

use std::fmt;
use std::str::FromStr;

use http::Uri;
use restline_http::protocol::path::{decode_path, with_trailing_slash};

use crate::error::ListenerError;

const HTTP_PORT: u16 = 80;
const HTTPS_PORT: u16 = 443;

/// A validated listener URI such as `http://localhost:8080/api/`.
///
/// The scheme is `http` or `https`, the host is present and there is neither a
/// query nor a fragment. A missing port falls back to the scheme's default and
/// the path is percent-decoded and always ends in `/`.
///
/// ```
/// use restline::ListenerUri;
///
/// let uri: ListenerUri = "http://localhost:8080/a%20b".parse().unwrap();
/// assert_eq!(uri.hostport(), "localhost:8080");
/// assert_eq!(uri.path(), "/a b/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerUri {
    uri: Uri,
    secure: bool,
    hostport: String,
    path: String,
}

impl ListenerUri {
    pub fn parse(raw: &str) -> Result<Self, ListenerError> {
        // http::Uri drops fragments silently, so look for one first
        if raw.contains('#') {
            return Err(ListenerError::HasFragment);
        }

        let uri = raw.parse::<Uri>().map_err(ListenerError::parse)?;
        let secure = match uri.scheme_str() {
            Some(scheme) if scheme.eq_ignore_ascii_case("http") => false,
            Some(scheme) if scheme.eq_ignore_ascii_case("https") => true,
            Some(scheme) => return Err(ListenerError::unsupported_scheme(scheme)),
            None => return Err(ListenerError::unsupported_scheme("")),
        };

        let host = uri.host().filter(|host| !host.is_empty()).ok_or(ListenerError::MissingHost)?;
        if uri.query().is_some() {
            return Err(ListenerError::HasQuery);
        }

        let port = uri.port_u16().unwrap_or(if secure { HTTPS_PORT } else { HTTP_PORT });
        let hostport = format!("{}:{port}", host.to_ascii_lowercase());
        let path = decode_path(uri.path()).map_err(ListenerError::parse)?;
        let path = with_trailing_slash(&path);

        Ok(Self { uri, secure, hostport, path })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// True for `https` listeners.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// `host:port`, with the default port filled in. Listeners sharing it share
    /// one socket.
    pub fn hostport(&self) -> &str {
        &self.hostport
    }

    /// The decoded path prefix, always ending in `/`.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for ListenerUri {
    type Err = ListenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ListenerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports() {
        let uri = ListenerUri::parse("http://example.com").unwrap();
        assert_eq!(uri.hostport(), "example.com:80");
        assert_eq!(uri.path(), "/");
        assert!(!uri.is_secure());

        let uri = ListenerUri::parse("https://Example.com/api").unwrap();
        assert_eq!(uri.hostport(), "example.com:443");
        assert_eq!(uri.path(), "/api/");
        assert!(uri.is_secure());
    }

    #[test]
    fn explicit_port_and_trailing_slash() {
        let uri = ListenerUri::parse("http://127.0.0.1:8080/a/b/").unwrap();
        assert_eq!(uri.hostport(), "127.0.0.1:8080");
        assert_eq!(uri.path(), "/a/b/");
    }

    #[test]
    fn rejects_bad_uris() {
        assert!(matches!(ListenerUri::parse("ftp://host/"), Err(ListenerError::UnsupportedScheme { .. })));
        assert!(matches!(ListenerUri::parse("/relative/path"), Err(ListenerError::UnsupportedScheme { .. })));
        assert!(matches!(ListenerUri::parse("http://host/path?x=1"), Err(ListenerError::HasQuery)));
        assert!(matches!(ListenerUri::parse("http://host/path#top"), Err(ListenerError::HasFragment)));
        assert!(matches!(ListenerUri::parse("http://host/a%zz"), Err(ListenerError::Parse { .. })));
        assert!(matches!(ListenerUri::parse("http://host name/"), Err(ListenerError::Parse { .. })));
    }
}
