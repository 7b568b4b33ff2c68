use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::AppState;

/// Query string as ordered pairs, so repeated parameters never reject.
pub type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// First `domain` value, if present and non-empty. An unparsable query
/// string counts as no domain.
fn first_domain(query: &QueryPairs) -> Option<&str> {
    let Ok(Query(pairs)) = query else {
        return None;
    };
    pairs
        .iter()
        .find(|(k, _)| k == "domain")
        .map(|(_, v)| v.as_str())
        .filter(|d| !d.is_empty())
}

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Ask (set membership) ──────────────────────────────────────────────────────

/// `200` when `domain` is in the configured set, `404` otherwise. Store
/// errors also answer `404`.
pub async fn ask(State(state): State<AppState>, query: QueryPairs) -> StatusCode {
    let (Some(module), Some(domain)) = (state.ask_redis.as_deref(), first_domain(&query)) else {
        return StatusCode::NOT_FOUND;
    };

    if module.is_member(domain).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

// ── Permission (on-demand TLS) ────────────────────────────────────────────────

pub async fn permission(State(state): State<AppState>, query: QueryPairs) -> Response {
    let Some(module) = state.permission.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(domain) = first_domain(&query) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing 'domain' query parameter"})),
        )
            .into_response();
    };

    match module.certificate_allowed(domain).await {
        Ok(()) => {
            info!(domain, "audit: certificate.allowed");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            info!(domain, key = %e.key(), reason = %e, "audit: certificate.denied");
            (StatusCode::FORBIDDEN, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}
