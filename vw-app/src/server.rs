//! Visual Workshop HTTP server.

use crate::config::WorkshopConfig;
use crate::gateway::Gateway;
use crate::routes;
use crate::session::SessionManager;
use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use axum::response::Response;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use vw_llm::{BackendFactory, HttpBackendFactory, PROVIDERS};

pub struct AppState {
    pub config: WorkshopConfig,
    pub sessions: SessionManager,
    pub gateway: Gateway,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: WorkshopConfig, factory: Arc<dyn BackendFactory>) -> Self {
        let sessions = SessionManager::new(config.session_idle_ttl());
        Self {
            config,
            sessions,
            gateway: Gateway::new(factory),
            started_at: Instant::now(),
        }
    }
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, path) = WorkshopConfig::load_with_path(config_path).await?;
    let text = cfg.provider_config(&cfg.defaults.text_provider, "")?;
    let vision = cfg.provider_config(&cfg.defaults.vision_provider, "")?;
    tracing::info!(
        config_path = ?path,
        bind_addr = %cfg.server.bind_addr,
        text_provider = %text.name,
        text_model = %text.text_model,
        vision_provider = %vision.name,
        vision_model = ?vision.vision_model,
        output_mode = ?cfg.defaults.output_mode,
        upstream_timeout_seconds = cfg.upstream.timeout_seconds,
        "config ok"
    );
    Ok(())
}

pub async fn print_providers(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = WorkshopConfig::load(config_path).await?;
    for descriptor in PROVIDERS {
        let resolved = cfg.provider_config(descriptor.id, "")?;
        println!(
            "{:<12} {:<56} text={} vision={}",
            resolved.name,
            resolved.endpoint_base(),
            resolved.text_model,
            resolved.vision_model.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, cfg_path) = WorkshopConfig::load_with_path(config_path).await?;
    let addr = cfg.bind_addr()?;
    tracing::info!(
        config_path = ?cfg_path,
        bind_addr = %addr,
        request_timeout_seconds = cfg.server.request_timeout_seconds,
        max_in_flight = cfg.server.max_in_flight,
        max_upload_bytes = cfg.server.max_upload_bytes,
        cors_origins = cfg.server.cors_origins.len(),
        upstream_timeout_seconds = cfg.upstream.timeout_seconds,
        session_idle_ttl_seconds = cfg.session.idle_ttl_seconds,
        text_provider = %cfg.defaults.text_provider,
        vision_provider = %cfg.defaults.vision_provider,
        output_mode = ?cfg.defaults.output_mode,
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;

    let factory = Arc::new(HttpBackendFactory::new(cfg.upstream_timeout()));
    let state = Arc::new(AppState::new(cfg, factory));
    let app = app(state.clone())?;

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.child_token();
        async move {
            let every = state.sessions.sweep_interval();
            state.sessions.run_sweeper(every, shutdown).await;
        }
    });

    tracing::info!(%addr, "visual workshop serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!("http server shutdown completed");

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "session sweeper task failed");
    }
    Ok(())
}

/// Full application router with middleware.
pub fn app(state: Arc<AppState>) -> Result<Router> {
    let cfg = &state.config;
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    let mut router = routes::router()
        .layer(DefaultBodyLimit::max(cfg.server.max_upload_bytes))
        .layer(Extension(state.clone()));

    let origins = cfg.cors_origins()?;
    if !origins.is_empty() {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE])
                .max_age(Duration::from_secs(3600)),
        );
    }

    Ok(router
        .layer(GlobalConcurrencyLimitLayer::new(cfg.server.max_in_flight))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(cfg.server.request_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
    shutdown.cancel();
}
