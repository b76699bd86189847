//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! host framework request
//!     → request.rs (InboundRequest view, outbound serialization)
//!     → websocket.rs (upgrade detection and 501 rejection)
//!     → [forwarding engine]
//!     → response.rs (ResponseSink the engine writes into)
//!     → Send to client
//!
//! server.rs mounts the engine behind an axum catch-all route.
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{ForwardRequest, InboundRequest};
pub use response::{BufferedResponse, ResponseSink};
pub use server::GatewayServer;
