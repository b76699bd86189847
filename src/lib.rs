//! Single-request HTTP forwarding engine.
//!
//! Takes an inbound request already parsed by a host framework, replays it over a fresh
//! HTTP/1.1 connection to a target URL and writes the upstream response back through a
//! [`ResponseSink`], optionally rewriting domains and transforming the body on the way.

pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::{ForwardConfig, GatewayConfig};
pub use forward::{ForwardError, ForwardOutcome, Forwarder, Interception};
pub use http::{BufferedResponse, ForwardRequest, GatewayServer, InboundRequest, ResponseSink};
pub use lifecycle::Shutdown;
pub use net::TargetDescriptor;
