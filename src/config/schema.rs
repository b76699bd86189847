//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};

/// Root configuration of the forwarding gateway binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where inbound requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Per-call forwarding behaviour.
    pub forward: ForwardConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout applied by the host server, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Upstream target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; the inbound path and query are appended to it.
    pub base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Settings of one forwarding call. Immutable for the life of the call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Connect timeout (DNS + TCP + TLS handshake) in seconds.
    pub timeout_secs: u64,

    /// Per-read deadline while receiving the response. Unset means no deadline.
    pub read_timeout_secs: Option<u64>,

    /// Domain replaced in response headers and body. Defaults to the target host.
    pub rewrite_from_domain: Option<String>,

    /// Replacement domain. Rewriting is off when unset or empty.
    pub rewrite_to_domain: Option<String>,

    /// Paths (substring match) for which the response transformer runs.
    pub allowed_body_handler_paths: Vec<String>,

    /// Accept any upstream TLS certificate. Insecure; off by default.
    pub insecure_skip_verify: bool,

    /// Fail on malformed chunked framing instead of keeping the chunks decoded so far.
    pub strict_chunked: bool,

    /// Largest inbound body the gateway buffers, in bytes.
    pub max_request_body_bytes: usize,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            read_timeout_secs: None,
            rewrite_from_domain: None,
            rewrite_to_domain: None,
            allowed_body_handler_paths: Vec::new(),
            insecure_skip_verify: false,
            strict_chunked: false,
            max_request_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
