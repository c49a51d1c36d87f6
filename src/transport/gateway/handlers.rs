use super::{ApiError, AppState, ErrorCode, RejectBody, ok_response};
use crate::platform::ShutdownReason;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Open when no token is configured; otherwise the bearer must match.
pub(super) fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.auth_token.as_deref() else {
        return Ok(());
    };
    match bearer_token(headers) {
        Some(presented) if constant_time_eq(presented, expected) => Ok(()),
        _ => {
            tracing::warn!("runtime API request rejected: missing or invalid bearer");
            Err(ApiError::new(ErrorCode::Unauthorized, "Unauthorized"))
        }
    }
}

fn proposal_not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "Proposal not found")
}

/// GET /health
pub(super) async fn handle_health(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Ok(ok_response(
        StatusCode::OK,
        serde_json::json!({ "status": "ok" }),
    ))
}

/// GET /status
pub(super) async fn handle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Ok(ok_response(StatusCode::OK, state.service.status()))
}

/// GET /proposals
pub(super) async fn handle_list_proposals(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Ok(ok_response(
        StatusCode::OK,
        serde_json::json!({ "proposals": state.service.list_proposals() }),
    ))
}

/// POST /approve/{id}
pub(super) async fn handle_approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let proposal = state
        .service
        .approve_proposal(&id)
        .ok_or_else(proposal_not_found)?;
    Ok(ok_response(StatusCode::OK, proposal))
}

/// POST /reject/{id}; an empty body means no reason.
pub(super) async fn handle_reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let RejectBody { reason } = if body.iter().all(u8::is_ascii_whitespace) {
        RejectBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::new(ErrorCode::BadRequest, format!("Invalid JSON body: {e}")))?
    };

    let proposal = state
        .service
        .reject_proposal(&id, reason)
        .ok_or_else(proposal_not_found)?;
    Ok(ok_response(StatusCode::OK, proposal))
}

/// POST /run
pub(super) async fn handle_run(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    if state.service.status().running {
        return Err(ApiError::new(ErrorCode::Conflict, "Mission already running"));
    }

    let service = state.service.clone();
    tokio::spawn(async move {
        match service.run().await {
            Ok(Some(summary)) => {
                tracing::info!(steps = summary.steps, stop_reason = %summary.stop_reason, "API-started run finished");
            }
            Ok(None) => {}
            Err(error) => tracing::error!(error = %error, "API-started run failed"),
        }
    });

    Ok(ok_response(
        StatusCode::ACCEPTED,
        serde_json::json!({ "status": "started" }),
    ))
}

/// POST /shutdown
pub(super) async fn handle_shutdown(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let delivered = state
        .shutdown
        .as_ref()
        .is_some_and(|shutdown| shutdown.request(ShutdownReason::Requested));
    if !delivered {
        return Err(ApiError::new(
            ErrorCode::InternalError,
            "Shutdown is not available",
        ));
    }
    Ok(ok_response(
        StatusCode::OK,
        serde_json::json!({ "status": "shutting-down" }),
    ))
}

/// Anything unrouted.
pub(super) async fn handle_not_found(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Err(ApiError::new(ErrorCode::NotFound, "Not found"))
}
