//! HTTP boundary: snapshot and status endpoints plus the static frontend.

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use repocache::sync::{SyncEngine, SyncError, SyncOutcome};

use crate::commands::status::StatusReport;

/// Shared state for request handlers.
#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub(crate) fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }
}

/// Build the application router.
///
/// Unmatched paths fall through to files under `public_dir`.
pub(crate) fn router(state: AppState, public_dir: &Path) -> Router {
    Router::new()
        .route("/api/repos", get(get_repos))
        .route("/api/status", get(get_status))
        .route("/internal/update", post(trigger_update))
        .fallback_service(ServeDir::new(public_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_body(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn get_repos(State(state): State<AppState>) -> Response {
    match state.engine.store().read().await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => error_body(
            StatusCode::NOT_FOUND,
            json!({ "error": "Cache not found. Run initial fetch." }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Failed reading snapshot");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed reading cache", "details": e.to_string() }),
            )
        }
    }
}

async fn get_status(State(state): State<AppState>) -> Response {
    match StatusReport::collect(&state.engine).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Failed to get status", "details": e.to_string() }),
        ),
    }
}

/// Response body for a cycle that did not fail.
fn update_body(outcome: &SyncOutcome) -> Value {
    match outcome {
        SyncOutcome::Skipped { reason, rate } => json!({
            "status": "ok",
            "skipped": true,
            "reason": reason,
            "rate": rate,
        }),
        SyncOutcome::Succeeded(stats) => json!({
            "status": "ok",
            "skipped": false,
            "count": stats.fetched_count,
            "merged_count": stats.merged_count,
            "pages": stats.pages,
            "strategy": stats.strategy,
            "stopped_early": stats.stopped_early,
        }),
    }
}

async fn trigger_update(State(state): State<AppState>) -> Response {
    match state.engine.run_once().await {
        Ok(outcome) => Json(update_body(&outcome)).into_response(),
        Err(e) => {
            let status = match e {
                SyncError::AlreadyRunning => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status == StatusCode::CONFLICT {
                tracing::info!("Manual update rejected, sync already running");
            } else {
                tracing::error!(error = %e, kind = %e.kind(), "Manual update failed");
            }
            error_body(
                status,
                json!({ "error": "Update failed", "kind": e.kind(), "details": e.to_string() }),
            )
        }
    }
}
