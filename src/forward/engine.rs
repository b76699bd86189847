//! The forwarding engine: one inbound request, one upstream exchange.
//!
//! # Responsibilities
//! - Reject WebSocket upgrades before touching the network
//! - Validate the target, connect, serialize and (optionally) intercept the request
//! - Hand the upstream stream to the response reader
//! - Route every failure to the error handler when one is installed
//!
//! # Design Decisions
//! - One call is a strictly linear sequence of awaits; nothing is shared between calls
//! - The outbound connection is owned by `send()` and released on every exit path

use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ForwardConfig;
use crate::forward::body::DomainRewrite;
use crate::forward::error::{BoxError, ForwardError, HookStage};
use crate::forward::hooks::{transformer_selected, Hooks, Interception};
use crate::forward::reader::{read_response, ReaderSettings};
use crate::http::request::{serialize_request, InboundRequest};
use crate::http::response::ResponseSink;
use crate::http::websocket;
use crate::net::connection::{self, ConnectOptions};
use crate::net::target::TargetDescriptor;
use crate::observability::metrics;

/// How a forwarding call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Upstream response relayed to the caller.
    Forwarded {
        status: u16,
        body_bytes: usize,
        streamed: bool,
    },
    /// The request interceptor answered on the upstream's behalf.
    Intercepted { body_bytes: usize },
    /// WebSocket upgrade refused with `501`.
    Rejected,
    /// An error occurred and was handed to the error handler.
    Failed,
}

impl ForwardOutcome {
    fn label(&self) -> &'static str {
        match self {
            ForwardOutcome::Forwarded { .. } => "forwarded",
            ForwardOutcome::Intercepted { .. } => "intercepted",
            ForwardOutcome::Rejected => "rejected",
            ForwardOutcome::Failed => "failed",
        }
    }
}

/// Forwards a single request to a target URL.
///
/// ```no_run
/// # async fn demo() -> Result<(), http_forward::ForwardError> {
/// use http_forward::{BufferedResponse, ForwardRequest, Forwarder};
///
/// let request = ForwardRequest::new("GET").with_header("Accept", "text/html");
/// let mut sink = BufferedResponse::new();
/// Forwarder::new("https://api.example.com/v1/data?x=1", "proxy.local")
///     .timeout(10)
///     .send(&request, &mut sink)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Forwarder {
    target_url: String,
    config: ForwardConfig,
    hooks: Hooks,
}

impl Forwarder {
    /// New forwarder for `target_url`, rewriting the target host to `rewrite_to_domain` in
    /// the response (pass an empty string to disable rewriting). Timeout defaults to 30s.
    pub fn new(target_url: impl Into<String>, rewrite_to_domain: impl Into<String>) -> Self {
        let rewrite_to = rewrite_to_domain.into();
        let config = ForwardConfig {
            rewrite_to_domain: (!rewrite_to.is_empty()).then_some(rewrite_to),
            ..ForwardConfig::default()
        };
        Self::with_config(target_url, config)
    }

    /// New forwarder with explicit settings.
    pub fn with_config(target_url: impl Into<String>, config: ForwardConfig) -> Self {
        Self {
            target_url: target_url.into(),
            config,
            hooks: Hooks::default(),
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn config(&self) -> &ForwardConfig {
        &self.config
    }

    /// Connect timeout in seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Per-read deadline while receiving the response.
    pub fn read_timeout(mut self, secs: u64) -> Self {
        self.config.read_timeout_secs = Some(secs);
        self
    }

    /// Domain to replace; defaults to the target host.
    pub fn rewrite_from(mut self, domain: impl Into<String>) -> Self {
        self.config.rewrite_from_domain = Some(domain.into());
        self
    }

    /// Accept any upstream TLS certificate.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.config.insecure_skip_verify = skip;
        self
    }

    pub fn strict_chunked(mut self, strict: bool) -> Self {
        self.config.strict_chunked = strict;
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ForwardError) + Send + Sync + 'static,
    {
        self.hooks.error_handler = Some(Box::new(handler));
        self
    }

    pub fn intercept_request<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(Vec<u8>, &TargetDescriptor) -> Result<Interception, BoxError> + Send + Sync + 'static,
    {
        self.hooks.interceptor = Some(Box::new(interceptor));
        self
    }

    pub fn observe_response<F>(mut self, observer: F) -> Self
    where
        F: Fn(&[String]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.observer = Some(Box::new(observer));
        self
    }

    /// Body transformer, run only for paths containing one of `allowed_paths`.
    pub fn transform_response<F, I, P>(mut self, allowed_paths: I, transformer: F) -> Self
    where
        F: Fn(Vec<u8>, &str) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.config.allowed_body_handler_paths = allowed_paths.into_iter().map(Into::into).collect();
        self.hooks.transformer = Some(Box::new(transformer));
        self
    }

    /// Run the whole pipeline, returning once the response has been emitted into `sink`.
    ///
    /// With an error handler installed, failures are passed to it and `Ok(Failed)` is
    /// returned; whatever was already emitted into `sink` stays there.
    pub async fn send<R, S>(&self, request: &R, sink: &mut S) -> Result<ForwardOutcome, ForwardError>
    where
        R: InboundRequest + Sync + ?Sized,
        S: ResponseSink + Send + ?Sized,
    {
        let start = Instant::now();
        let span = tracing::info_span!(
            "forward",
            forward_id = %Uuid::new_v4(),
            method = %request.method(),
            target = %self.target_url,
        );

        let result = self.run(request, sink).instrument(span.clone()).await;
        let _entered = span.enter();

        match result {
            Ok(outcome) => {
                metrics::record_forward(outcome.label(), start);
                tracing::info!(outcome = outcome.label(), elapsed_ms = start.elapsed().as_millis() as u64, "Forwarding finished");
                Ok(outcome)
            }
            Err(err) => {
                metrics::record_forward("failed", start);
                match &self.hooks.error_handler {
                    Some(handler) => {
                        tracing::warn!(error = %err, kind = err.kind(), "Forwarding failed, passing to error handler");
                        handler(&err);
                        Ok(ForwardOutcome::Failed)
                    }
                    None => {
                        tracing::error!(error = %err, kind = err.kind(), "Forwarding failed");
                        Err(err)
                    }
                }
            }
        }
    }

    async fn run<R, S>(&self, request: &R, sink: &mut S) -> Result<ForwardOutcome, ForwardError>
    where
        R: InboundRequest + Sync + ?Sized,
        S: ResponseSink + Send + ?Sized,
    {
        if websocket::is_upgrade_attempt(request, &self.target_url) {
            tracing::info!("Rejecting WebSocket upgrade");
            websocket::reject(sink).map_err(ForwardError::Sink)?;
            return Ok(ForwardOutcome::Rejected);
        }

        let target = TargetDescriptor::parse(&self.target_url)?;

        let mut conn = connection::connect(
            &target,
            ConnectOptions {
                timeout: Duration::from_secs(self.config.timeout_secs),
                insecure_skip_verify: self.config.insecure_skip_verify,
            },
        )
        .await?;

        let mut message = serialize_request(request, &target);

        if let Some(interceptor) = &self.hooks.interceptor {
            match interceptor(message.clone(), &target)
                .map_err(|e| ForwardError::hook(HookStage::RequestInterceptor, e))?
            {
                Interception::Respond(body) if !body.is_empty() => {
                    tracing::debug!(bytes = body.len(), "Request interceptor answered directly");
                    conn.close().await;
                    sink.emit_body(&body).map_err(ForwardError::Sink)?;
                    sink.flush().map_err(ForwardError::Sink)?;
                    return Ok(ForwardOutcome::Intercepted {
                        body_bytes: body.len(),
                    });
                }
                Interception::Respond(_) => {}
                Interception::Forward(rewritten) => message = rewritten,
            }
        }

        tracing::debug!(
            connection_id = %conn.id(),
            request = %String::from_utf8_lossy(&message),
            "Sending upstream request"
        );
        conn.write_all(&message).await?;
        conn.flush().await?;

        let rewrite = self.domain_rewrite(&target);
        let transformer = self
            .hooks
            .transformer
            .as_ref()
            .filter(|_| transformer_selected(&self.config.allowed_body_handler_paths, &target.path));

        let settings = ReaderSettings {
            rewrite: rewrite.as_ref(),
            observer: self.hooks.observer.as_ref(),
            transformer,
            path: &target.path,
            strict_chunked: self.config.strict_chunked,
            read_timeout: self.config.read_timeout_secs.map(Duration::from_secs),
            head_request: request.method().eq_ignore_ascii_case("HEAD"),
        };

        let summary = read_response(&mut conn, sink, &settings).await?;
        conn.close().await;

        metrics::record_upstream(summary.status, summary.body_bytes);
        Ok(ForwardOutcome::Forwarded {
            status: summary.status,
            body_bytes: summary.body_bytes,
            streamed: summary.streamed,
        })
    }

    fn domain_rewrite(&self, target: &TargetDescriptor) -> Option<DomainRewrite> {
        let to = self.config.rewrite_to_domain.as_deref()?;
        let from = self
            .config
            .rewrite_from_domain
            .as_deref()
            .unwrap_or(&target.host);
        DomainRewrite::new(from, to)
    }
}
