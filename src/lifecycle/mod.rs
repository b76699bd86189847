//! Process lifecycle for the gateway binary.
//!
//! ```text
//! SIGINT / SIGTERM ──▶ signals::wait_for_termination
//!                          └─▶ Shutdown::trigger ──▶ broadcast ──▶ GatewayServer::run drains and returns
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
