//! Runtime administration API over axum.
//!
//! Routes (all behind the optional bearer token):
//! - `GET  /health`, `GET /status`, `GET /proposals`
//! - `POST /approve/{id}`, `POST /reject/{id}` (body `{ "reason"?: string }`)
//! - `POST /run` (202, runs the mission in the background)
//! - `POST /shutdown`
//!
//! Every response is an envelope: `{ "ok": true, "data": .. }` or
//! `{ "ok": false, "error": { "code", "message" } }`.

mod handlers;
mod server;

pub use server::{build_app, run_gateway, run_gateway_with_listener};

use crate::core::runtime_service::RuntimeService;
use crate::platform::ShutdownHandle;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RuntimeService>,
    pub auth_token: Option<Arc<str>>,
    pub shutdown: Option<ShutdownHandle>,
}

impl AppState {
    pub fn new(service: Arc<RuntimeService>) -> Self {
        Self {
            service,
            auth_token: None,
            shutdown: None,
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty()).map(Arc::from);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    BadRequest,
    Conflict,
    InternalError,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error half of the envelope; renders with the matching HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let body = serde_json::json!({ "ok": false, "error": self });
        (status, Json(body)).into_response()
    }
}

/// Success half of the envelope.
pub(crate) fn ok_response<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(serde_json::json!({ "ok": true, "data": data }))).into_response()
}

/// Body accepted by `POST /reject/{id}`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: Option<String>,
}
