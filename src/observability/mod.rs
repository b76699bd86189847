//! Logs and metrics.
//!
//! Every `Forwarder::send` runs inside a `forward` span carrying a UUID `forward_id`, and records
//! its outcome through the `metrics` facade. Nothing is exported until the gateway installs the
//! subscriber (`logging`) and, when enabled, the Prometheus recorder (`metrics`).

pub mod logging;
pub mod metrics;
