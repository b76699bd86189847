//! Inbound request access and outbound request serialization.
//!
//! # Responsibilities
//! - Narrow interface over the host framework's parsed request ([`InboundRequest`])
//! - Render the raw HTTP/1.1 message sent upstream ([`serialize_request`])
//!
//! # Design Decisions
//! - Header names and values are forwarded byte-for-byte, no case normalization
//! - The inbound `Host` header is always dropped and replaced by the target's
//! - `Connection: close` is forced since connections are never reused

use crate::net::target::TargetDescriptor;

/// Headers that describe the inbound hop rather than the message.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Returns true for hop-by-hop header names (case-insensitive).
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// The inbound request as exposed by the host framework.
pub trait InboundRequest {
    /// Request method exactly as received.
    fn method(&self) -> &str;

    /// Full raw body.
    fn body(&self) -> &[u8];

    /// Looks up any inbound header, hop-by-hop ones included (case-insensitive name).
    fn header(&self, name: &str) -> Option<&str>;

    /// Header pairs eligible for forwarding, in arrival order.
    fn forwardable_headers(&self) -> Vec<(&str, &str)>;
}

/// Owned inbound request, for hosts that hand over plain parts.
#[derive(Debug, Clone, Default)]
pub struct ForwardRequest {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ForwardRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

impl InboundRequest for ForwardRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn forwardable_headers(&self) -> Vec<(&str, &str)> {
        self.headers
            .iter()
            .filter(|(k, _)| !is_hop_by_hop(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Render the outbound request: request line, `Host`, `Connection: close`, forwarded headers,
/// blank line, raw body.
pub fn serialize_request<R: InboundRequest + ?Sized>(
    request: &R,
    target: &TargetDescriptor,
) -> Vec<u8> {
    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
        request.method(),
        target.path_and_query(),
        target.host_header()
    );

    for (name, value) in request.forwardable_headers() {
        if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("connection") {
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    let mut message = head.into_bytes();
    message.extend_from_slice(request.body());
    message
}
