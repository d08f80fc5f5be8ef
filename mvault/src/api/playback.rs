//! Playback slot endpoints
//!
//! GET /playback, POST /playback/events

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::playback::{OutputEvent, PlaybackState};
use crate::AppState;

/// POST /playback/events request, reported by the audio element
#[derive(Debug, Deserialize)]
pub struct OutputEventRequest {
    pub event: OutputEvent,
}

/// GET /playback
pub async fn get_playback(State(state): State<AppState>) -> Json<PlaybackState> {
    Json(state.library.playback().state())
}

/// POST /playback/events
pub async fn report_output_event(
    State(state): State<AppState>,
    Json(request): Json<OutputEventRequest>,
) -> Json<PlaybackState> {
    Json(state.library.playback().on_output_event(request.event))
}

/// Build playback routes
pub fn playback_routes() -> Router<AppState> {
    Router::new()
        .route("/playback", get(get_playback))
        .route("/playback/events", post(report_output_event))
}
