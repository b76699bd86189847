//! Gateway and forwarding configuration.
//!
//! ```text
//! gateway.toml ──▶ loader::load_config ──▶ toml + serde defaults ──▶ validation::validate_config
//!                                                                        └─▶ GatewayConfig
//! GatewayConfig.forward (ForwardConfig) is cloned into every Forwarder the gateway builds;
//! library callers construct ForwardConfig directly or through the Forwarder builder.
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ForwardConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, UpstreamConfig};
