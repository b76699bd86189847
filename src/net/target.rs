//! Target URL validation.
//!
//! # Responsibilities
//! - Parse an absolute URL into a [`TargetDescriptor`]
//! - Reject URLs without scheme or host, and schemes other than http/https
//! - Apply default ports (80/443) and the default path `/`

use url::Url;

use crate::forward::error::ForwardError;

/// Scheme of a forwarding target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Https)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated destination of one forwarding call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub scheme: Scheme,
    /// Host as written in the URL (IPv6 literals keep their brackets).
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Query string without the leading `?`; empty when absent.
    pub query: String,
    explicit_port: bool,
}

impl TargetDescriptor {
    /// Parse and validate an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, ForwardError> {
        let invalid = |reason: String| ForwardError::InvalidUrl {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        };

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(invalid("missing host".to_string())),
        };

        let port = url.port().unwrap_or_else(|| scheme.default_port());
        let (path, query) = match raw_path_and_query(raw.trim()) {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => {
                tracing::debug!(url = %raw, "Target path not sendable verbatim, using normalized form");
                let path = match url.path() {
                    "" => "/",
                    p => p,
                };
                (path.to_string(), url.query().unwrap_or_default().to_string())
            }
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query,
            explicit_port: url.port().is_some(),
        })
    }

    /// Path plus `?query` when a query is present.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// Value for the outbound `Host` header.
    pub fn host_header(&self) -> String {
        if self.explicit_port {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        }
    }

    /// Host suitable for socket connection and SNI (no IPv6 brackets).
    pub fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}

/// Path and query exactly as written after the authority, fragment dropped.
///
/// `None` when the text holds whitespace, control or non-ASCII bytes, which cannot go on a
/// request line unencoded.
fn raw_path_and_query(raw: &str) -> Option<(&str, &str)> {
    let (_, rest) = raw.split_once("://")?;
    let tail = match rest.find(['/', '?', '#']) {
        Some(start) => &rest[start..],
        None => "",
    };
    let tail = tail.split('#').next().unwrap_or_default();
    if tail.bytes().any(|b| b <= b' ' || b >= 0x7f) {
        return None;
    }
    let (path, query) = tail.split_once('?').unwrap_or((tail, ""));
    Some((if path.is_empty() { "/" } else { path }, query))
}

impl std::fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}:{}{}",
            self.scheme,
            self.host,
            self.port,
            self.path_and_query()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_defaults_to_443() {
        let target = TargetDescriptor::parse("https://api.example.com/v1/data?x=1").unwrap();
        assert_eq!(target.scheme, Scheme::Https);
        assert_eq!(target.host, "api.example.com");
        assert_eq!(target.port, 443);
        assert_eq!(target.path, "/v1/data");
        assert_eq!(target.query, "x=1");
        assert_eq!(target.path_and_query(), "/v1/data?x=1");
        assert_eq!(target.host_header(), "api.example.com");
    }

    #[test]
    fn http_defaults_to_80_and_root_path() {
        let target = TargetDescriptor::parse("http://example.org").unwrap();
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
        assert_eq!(target.query, "");
        assert_eq!(target.path_and_query(), "/");
    }

    #[test]
    fn path_and_query_sent_as_written() {
        let target = TargetDescriptor::parse("http://a.test/a/./../b//c?x=%7e&y=1#frag").unwrap();
        assert_eq!(target.path, "/a/./../b//c");
        assert_eq!(target.query, "x=%7e&y=1");
        assert_eq!(target.path_and_query(), "/a/./../b//c?x=%7e&y=1");

        let target = TargetDescriptor::parse("http://a.test:81?only=query").unwrap();
        assert_eq!(target.path_and_query(), "/?only=query");
    }

    #[test]
    fn unsendable_path_falls_back_to_encoded() {
        let target = TargetDescriptor::parse("http://a.test/a b").unwrap();
        assert_eq!(target.path, "/a%20b");
    }

    #[test]
    fn explicit_port_kept_in_host_header() {
        let target = TargetDescriptor::parse("http://127.0.0.1:8080/a").unwrap();
        assert_eq!(target.port, 8080);
        assert_eq!(target.host_header(), "127.0.0.1:8080");
    }

    #[test]
    fn ipv6_host_stripped_for_connect() {
        let target = TargetDescriptor::parse("http://[::1]:9000/").unwrap();
        assert_eq!(target.host, "[::1]");
        assert_eq!(target.connect_host(), "::1");
    }

    #[test]
    fn missing_scheme_rejected() {
        let err = TargetDescriptor::parse("api.example.com/v1").unwrap_err();
        assert!(matches!(err, ForwardError::InvalidUrl { .. }));
    }

    #[test]
    fn missing_host_rejected() {
        for raw in ["http://", "mailto:someone@example.com", "file:///etc/hosts", ""] {
            let err = TargetDescriptor::parse(raw).unwrap_err();
            assert!(matches!(err, ForwardError::InvalidUrl { .. }), "{raw}");
        }
    }

    #[test]
    fn websocket_scheme_is_not_a_target() {
        let err = TargetDescriptor::parse("wss://example.com/socket").unwrap_err();
        assert!(matches!(err, ForwardError::InvalidUrl { .. }));
    }
}
