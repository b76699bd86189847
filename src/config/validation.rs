//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the upstream base URL is a usable forwarding target
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::{ForwardConfig, GatewayConfig};
use crate::net::target::TargetDescriptor;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a full gateway configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if let Err(e) = TargetDescriptor::parse(&config.upstream.base_url) {
        errors.push(ValidationError::new("upstream.base_url", e.to_string()));
    }

    errors.extend(forward_errors(&config.forward));

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "not a socket address: {:?}",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate forwarding settings on their own (used by the CLI as well).
pub fn validate_forward(config: &ForwardConfig) -> Result<(), Vec<ValidationError>> {
    let errors = forward_errors(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn forward_errors(config: &ForwardConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.timeout_secs == 0 {
        errors.push(ValidationError::new("forward.timeout_secs", "must be greater than 0"));
    }
    if config.read_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "forward.read_timeout_secs",
            "must be greater than 0 when set",
        ));
    }
    if config
        .allowed_body_handler_paths
        .iter()
        .any(|p| p.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "forward.allowed_body_handler_paths",
            "entries must not be empty",
        ));
    }
    if config.max_request_body_bytes == 0 {
        errors.push(ValidationError::new(
            "forward.max_request_body_bytes",
            "must be greater than 0",
        ));
    }

    errors
}
