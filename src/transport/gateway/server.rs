use super::handlers::{
    handle_approve, handle_health, handle_list_proposals, handle_not_found, handle_reject,
    handle_run, handle_shutdown, handle_status,
};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Bind `host:port` and serve the runtime API until `shutdown` resolves.
pub async fn run_gateway(
    host: &str,
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse runtime API bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind runtime API socket")?;

    run_gateway_with_listener(listener, state, shutdown).await
}

/// Serve the runtime API from a pre-bound listener.
pub async fn run_gateway_with_listener(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let local = listener
        .local_addr()
        .context("get runtime API listener local address")?;
    tracing::info!(
        addr = %local,
        auth = state.auth_token.is_some(),
        "runtime API listening"
    );

    let app = build_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serve runtime API")?;

    tracing::info!("runtime API stopped");
    Ok(())
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/proposals", get(handle_list_proposals))
        .route("/approve/{id}", post(handle_approve))
        .route("/reject/{id}", post(handle_reject))
        .route("/run", post(handle_run))
        .route("/shutdown", post(handle_shutdown))
        .fallback(handle_not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}
