//! Health check endpoint
//!
//! Reports uptime plus a small view of session, library and upload state.
//! Status turns `degraded` once a background failure has been recorded.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::ingest::UploadStatus;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub signed_in: bool,
    /// Initial identity check still pending
    pub session_loading: bool,
    /// Tracks in the current list
    pub tracks: usize,
    pub uploads_in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;
    let uploads_in_flight = state
        .pipeline
        .tasks()
        .list()
        .iter()
        .filter(|t| t.status == UploadStatus::Uploading)
        .count();
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: if last_error.is_some() { "degraded" } else { "ok" },
        service: "mvault",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        signed_in: state.session.current().is_some(),
        session_loading: state.session.is_loading(),
        tracks: state.library.tracks().len(),
        uploads_in_flight,
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
