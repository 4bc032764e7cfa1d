//! Endpoint handlers.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::dispatch::FormatRequest;
use crate::http::request::{decode_body, request_id, required_path, FormatParams, PathParams};
use crate::http::response;
use crate::http::server::AppState;
use crate::lifecycle::DaemonState;
use crate::rules::TextEncoding;

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct DaemonStatus {
    pub version: &'static str,
    pub state: DaemonState,
    pub rule_sets: usize,
    pub warm_rule_sets: usize,
    pub in_flight: usize,
    pub queued_cold_starts: usize,
}

/// `POST /?path=...&dryrun`
pub async fn format(
    State(state): State<AppState>,
    Query(params): Query<FormatParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let dry_run = params.dry_run();
    let Some(path) = required_path(params.path) else {
        return response::missing_path();
    };

    tracing::debug!(
        request_id = %request_id(&headers),
        path = %path,
        dry_run,
        bytes = body.len(),
        "Format request"
    );

    let content = if dry_run {
        String::new()
    } else {
        let fallback = state.service.encoding(&path).unwrap_or(TextEncoding::Utf8);
        decode_body(&headers, &body, fallback)
    };
    state
        .service
        .format(FormatRequest {
            path,
            content,
            dry_run,
        })
        .await
        .into_response()
}

/// `GET /`
pub async fn liveness() -> &'static str {
    "Format daemon is running"
}

/// `GET /encoding?path=...`
pub async fn encoding(State(state): State<AppState>, Query(params): Query<PathParams>) -> Response {
    let Some(path) = required_path(params.path) else {
        return response::missing_path();
    };
    match state.service.encoding(&path) {
        Some(encoding) => response::encoded_text(StatusCode::OK, encoding.encode(encoding.name()), encoding),
        None => {
            tracing::info!(path = %path, "Encoding query for uncovered file");
            response::not_covered(&path)
        }
    }
}

/// `POST /stop`
pub async fn stop(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.begin_draining("stop requested");
    (StatusCode::OK, "Stopping")
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<DaemonStatus> {
    let stats = state.service.stats();
    Json(DaemonStatus {
        version: env!("CARGO_PKG_VERSION"),
        state: state.controller.state(),
        rule_sets: stats.rule_sets,
        warm_rule_sets: stats.warm_rule_sets,
        in_flight: state.controller.in_flight_count(),
        queued_cold_starts: stats.queued_cold_starts,
    })
}
