//! WebSocket upgrade rejection.
//!
//! # Responsibilities
//! - Detect protocol-upgrade attempts before any connection is opened
//! - Answer them with `501 Not Implemented`
//!
//! # Design Decisions
//! - Upgrades are never tunneled; the engine only speaks request/response HTTP/1.1
//! - The scheme check runs on the raw URL so `ws://` targets are caught even though
//!   they would not pass URL validation

use std::io;

use crate::http::request::InboundRequest;
use crate::http::response::ResponseSink;

/// Body of the rejection response.
pub const REJECTION_BODY: &str = "WebSocket connections are not supported by this proxy.\n";

/// Whether the request (or its target) asks for a WebSocket upgrade.
pub fn is_upgrade_attempt<R: InboundRequest + ?Sized>(request: &R, target_url: &str) -> bool {
    let upgrade = request
        .header("upgrade")
        .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    let connection = request
        .header("connection")
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);

    (upgrade && connection) || has_websocket_scheme(target_url)
}

fn has_websocket_scheme(target_url: &str) -> bool {
    let scheme = match target_url.trim().split_once("://") {
        Some((scheme, _)) => scheme,
        None => return false,
    };
    scheme.eq_ignore_ascii_case("ws") || scheme.eq_ignore_ascii_case("wss")
}

/// Emit the `501` rejection.
pub fn reject<S: ResponseSink + ?Sized>(sink: &mut S) -> io::Result<()> {
    sink.set_status(501);
    sink.emit_header_line("Content-Type: text/plain; charset=utf-8");
    sink.emit_header_line(&format!("Content-Length: {}", REJECTION_BODY.len()));
    sink.emit_body(REJECTION_BODY.as_bytes())?;
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::ForwardRequest;
    use crate::http::response::BufferedResponse;

    #[test]
    fn upgrade_headers_detected() {
        let req = ForwardRequest::new("GET")
            .with_header("Upgrade", "WebSocket")
            .with_header("Connection", "keep-alive, Upgrade");
        assert!(is_upgrade_attempt(&req, "http://a.test/"));
    }

    #[test]
    fn upgrade_without_connection_is_not_rejected() {
        let req = ForwardRequest::new("GET").with_header("Upgrade", "websocket");
        assert!(!is_upgrade_attempt(&req, "http://a.test/"));

        let req = ForwardRequest::new("GET")
            .with_header("Upgrade", "h2c")
            .with_header("Connection", "Upgrade");
        assert!(!is_upgrade_attempt(&req, "http://a.test/"));
    }

    #[test]
    fn websocket_schemes_detected() {
        let req = ForwardRequest::new("GET");
        assert!(is_upgrade_attempt(&req, "ws://a.test/socket"));
        assert!(is_upgrade_attempt(&req, "WSS://a.test/socket"));
        assert!(!is_upgrade_attempt(&req, "https://a.test/wss"));
        assert!(!is_upgrade_attempt(&req, "not a url"));
    }

    #[test]
    fn rejection_is_plain_text_501() {
        let mut sink = BufferedResponse::new();
        reject(&mut sink).unwrap();
        assert_eq!(sink.status, Some(501));
        assert_eq!(sink.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(
            sink.header("content-length"),
            Some(REJECTION_BODY.len().to_string().as_str())
        );
        assert_eq!(sink.body, REJECTION_BODY.as_bytes());
        assert!(sink.flushed);
    }
}
