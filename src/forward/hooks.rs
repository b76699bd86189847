//! Caller-supplied extension points.
//!
//! # Data Flow
//! ```text
//! serialized request ──▶ RequestInterceptor ──┬─▶ Forward(message) ──▶ upstream
//!                                             └─▶ Respond(body)    ──▶ caller (short-circuit)
//! response headers   ──▶ ResponseObserver (side effects only)
//! decoded body       ──▶ ResponseTransformer (only for allow-listed paths)
//! any failure        ──▶ ErrorHandler (instead of propagating)
//! ```

use crate::forward::error::{BoxError, ForwardError};
use crate::net::target::TargetDescriptor;

/// What the request interceptor decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Send this (possibly rewritten) message upstream.
    Forward(Vec<u8>),
    /// Answer the caller with this body without touching the upstream socket.
    /// An empty body means "no short-circuit": the original message is forwarded.
    Respond(Vec<u8>),
}

pub type RequestInterceptor =
    Box<dyn Fn(Vec<u8>, &TargetDescriptor) -> Result<Interception, BoxError> + Send + Sync>;

pub type ResponseObserver = Box<dyn Fn(&[String]) -> Result<(), BoxError> + Send + Sync>;

pub type ResponseTransformer =
    Box<dyn Fn(Vec<u8>, &str) -> Result<Vec<u8>, BoxError> + Send + Sync>;

pub type ErrorHandler = Box<dyn Fn(&ForwardError) + Send + Sync>;

/// The four optional hook slots of one forwarder.
#[derive(Default)]
pub struct Hooks {
    pub interceptor: Option<RequestInterceptor>,
    pub observer: Option<ResponseObserver>,
    pub transformer: Option<ResponseTransformer>,
    pub error_handler: Option<ErrorHandler>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("interceptor", &self.interceptor.is_some())
            .field("observer", &self.observer.is_some())
            .field("transformer", &self.transformer.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Whether the transformer runs for `path`: the allow-list must be non-empty and one of its
/// entries must occur in the path as a substring.
pub fn transformer_selected(allowed_paths: &[String], path: &str) -> bool {
    allowed_paths
        .iter()
        .any(|allowed| !allowed.is_empty() && path.contains(allowed.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_substring_match() {
        let allowed = vec!["/v1/".to_string()];
        assert!(transformer_selected(&allowed, "/v1/data"));
        assert!(transformer_selected(&allowed, "/api/v1/data"));
        assert!(!transformer_selected(&allowed, "/v2/data"));
    }

    #[test]
    fn empty_allow_list_selects_nothing() {
        assert!(!transformer_selected(&[], "/v1/data"));
        assert!(!transformer_selected(&[String::new()], "/v1/data"));
    }

    #[test]
    fn debug_shows_installed_slots() {
        let hooks = Hooks {
            observer: Some(Box::new(|_| Ok(()))),
            ..Default::default()
        };
        let rendered = format!("{hooks:?}");
        assert!(rendered.contains("observer: true"));
        assert!(rendered.contains("interceptor: false"));
    }
}
