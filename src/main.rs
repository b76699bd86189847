//! forward-gateway: single-request HTTP forwarding behind an axum listener.
//!
//! ```text
//!     Client ──▶ axum (trace, timeout) ──▶ Forwarder::send ──▶ upstream (HTTP/1.1, TLS)
//!        ◀────────── BufferedResponse ◀── chunked / gzip / rewrite / transform
//! ```
//!
//! Configuration comes from the TOML file named by the first argument or by
//! `FORWARD_CONFIG`; without either the built-in defaults are used.

use std::path::PathBuf;

use tokio::net::TcpListener;

use http_forward::config::{load_config, GatewayConfig};
use http_forward::lifecycle::Shutdown;
use http_forward::observability::{logging, metrics};
use http_forward::GatewayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FORWARD_CONFIG").ok())
        .map(PathBuf::from);

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_tracing(
        &config.observability.log_level,
        config.observability.json_logs,
    );

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "forward-gateway starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        timeout_secs = config.forward.timeout_secs,
        rewrite_to = ?config.forward.rewrite_to_domain,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    GatewayServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
