//! Gateway host: mounts the forwarding engine behind an axum catch-all route.
//!
//! # Responsibilities
//! - Create the axum Router and wire middleware (tracing, request timeout)
//! - Buffer the inbound body and adapt axum parts to [`InboundRequest`]
//! - Build one [`Forwarder`] per request against `upstream.base_url` + path and query
//! - Turn the engine's [`BufferedResponse`] into the axum response, minus hop-by-hop headers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ForwardConfig, GatewayConfig};
use crate::forward::Forwarder;
use crate::http::request::{is_hop_by_hop, ForwardRequest};
use crate::http::response::BufferedResponse;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub base_url: Arc<str>,
    pub forward: Arc<ForwardConfig>,
}

/// HTTP server that forwards every request upstream.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState {
            base_url: Arc::from(config.upstream.base_url.as_str()),
            forward: Arc::new(config.forward.clone()),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "Gateway starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.forward.max_request_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Inbound body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let target_url = join_target(&state.base_url, &parts);
    let inbound = inbound_from_parts(&parts, body);
    let forwarder = Forwarder::with_config(target_url, ForwardConfig::clone(&state.forward));

    let mut sink = BufferedResponse::new();
    match forwarder.send(&inbound, &mut sink).await {
        Ok(_) => {
            sink.headers.retain(|(name, _)| !is_hop_by_hop(name));
            sink.into_response()
        }
        Err(e) => {
            (StatusCode::BAD_GATEWAY, format!("Upstream request failed: {e}\n")).into_response()
        }
    }
}

/// `base_url` with its trailing slash dropped, followed by the inbound path and query.
pub fn join_target(base_url: &str, parts: &Parts) -> String {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{}{}", base_url.trim_end_matches('/'), path_and_query)
}

/// Copy axum request parts into an owned [`ForwardRequest`].
///
/// The body is already fully buffered, so the inbound framing headers are replaced by a
/// `Content-Length` matching the bytes actually forwarded.
pub fn inbound_from_parts(parts: &Parts, body: Bytes) -> ForwardRequest {
    let mut headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter(|(name, _)| **name != header::CONTENT_LENGTH && **name != header::TRANSFER_ENCODING)
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    if !body.is_empty() {
        headers.push(("Content-Length".to_string(), body.len().to_string()));
    }

    ForwardRequest {
        method: parts.method.as_str().to_string(),
        headers,
        body: body.to_vec(),
    }
}
