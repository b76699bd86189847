//! Forwarding pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → http/websocket.rs (upgrade guard, 501 short-circuit)
//!     → net/target.rs (URL validation)
//!     → net/connection.rs (plain/TLS connect, timeout)
//!     → http/request.rs (raw HTTP/1.1 serialization)
//!     → hooks.rs (request interceptor, may short-circuit)
//!     → socket write
//!     → reader.rs (status, headers, body; observer + transformer)
//!     → body.rs (chunk decode, gunzip, rewrite, gzip)
//!     → ResponseSink
//! ```
//!
//! # Design Decisions
//! - Every call owns its connection; no pooling or reuse
//! - Errors either propagate from `send()` or go to the error handler, never both

pub mod body;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod reader;

pub use engine::{ForwardOutcome, Forwarder};
pub use error::{BoxError, ForwardError, HookStage};
pub use hooks::Interception;
