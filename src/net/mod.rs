//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! target URL string
//!     → target.rs (parse & validate into TargetDescriptor)
//!     → connection.rs (TCP connect, bounded by timeout)
//!     → tls.rs (rustls client config for https targets)
//!     → OutboundConnection handed to the forwarding engine
//! ```
//!
//! # Design Decisions
//! - One connection per forwarding call, closed on every exit path
//! - Certificate verification can only be disabled explicitly

pub mod connection;
pub mod target;
pub mod tls;

pub use connection::{ConnectOptions, OutboundConnection};
pub use target::{Scheme, TargetDescriptor};
