//! Forwarding error definitions.

use thiserror::Error;

/// Boxed error returned by caller-supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which hook produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    RequestInterceptor,
    ResponseObserver,
    ResponseTransformer,
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HookStage::RequestInterceptor => "request interceptor",
            HookStage::ResponseObserver => "response observer",
            HookStage::ResponseTransformer => "response transformer",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during one forwarding call.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Target URL is unparsable or lacks a scheme or host.
    #[error("invalid target URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Socket or TLS establishment failed (refusal, DNS, handshake, connect timeout).
    #[error("connection to {host}:{port} failed: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        errno: Option<i32>,
        message: String,
    },

    /// Opt-in read deadline expired while transferring the response.
    #[error("{phase} timed out after {secs} seconds")]
    Timeout { phase: &'static str, secs: u64 },

    /// Upstream status line could not be parsed.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    /// Chunked framing broke off before the terminating zero-length chunk.
    #[error("malformed chunked body after {decoded_bytes} decoded bytes")]
    MalformedChunk { decoded_bytes: usize },

    /// A caller-supplied hook failed.
    #[error("{stage} failed: {source}")]
    Hook {
        stage: HookStage,
        #[source]
        source: BoxError,
    },

    /// Socket I/O failed after the connection was established.
    #[error("upstream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing to the caller's response sink failed.
    #[error("response sink error: {0}")]
    Sink(#[source] std::io::Error),
}

impl ForwardError {
    pub(crate) fn hook(stage: HookStage, source: BoxError) -> Self {
        Self::Hook { stage, source }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::InvalidUrl { .. } => "invalid_url",
            ForwardError::ConnectionFailed { .. } => "connection_failed",
            ForwardError::Timeout { .. } => "timeout",
            ForwardError::MalformedResponse(_) => "malformed_response",
            ForwardError::MalformedChunk { .. } => "malformed_chunk",
            ForwardError::Hook { .. } => "hook",
            ForwardError::Io(_) => "io",
            ForwardError::Sink(_) => "sink",
        }
    }
}
