//! Track library endpoints
//!
//! GET /tracks, POST /tracks/refresh, GET /tracks/stats,
//! POST /tracks/:id/play, GET /tracks/:id/download, DELETE /tracks/:id

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::library::{DeleteOutcome, LibrarySnapshot, LibraryStats};
use crate::playback::PlaybackState;
use crate::AppState;

/// POST /tracks/refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

/// DELETE /tracks/:id query
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

/// DELETE /tracks/:id response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub track_id: String,
    pub outcome: DeleteOutcome,
}

/// GET /tracks
pub async fn list_tracks(State(state): State<AppState>) -> ApiResult<Json<LibrarySnapshot>> {
    state.session.require_identity()?;
    Ok(Json(state.library.snapshot()))
}

/// POST /tracks/refresh
pub async fn refresh_tracks(State(state): State<AppState>) -> ApiResult<Json<RefreshResponse>> {
    let identity = state.session.require_identity()?;
    let count = state.library.load_tracks(&identity).await?;
    Ok(Json(RefreshResponse { count }))
}

/// GET /tracks/stats
pub async fn track_stats(State(state): State<AppState>) -> ApiResult<Json<LibraryStats>> {
    let identity = state.session.require_identity()?;
    Ok(Json(state.library.stats(&identity)))
}

/// POST /tracks/:id/play
///
/// Toggles: pauses the playing track, otherwise loads and plays `id`.
pub async fn play_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> ApiResult<Json<PlaybackState>> {
    state.session.require_identity()?;
    Ok(Json(state.library.play(&track_id)?))
}

/// GET /tracks/:id/download
pub async fn download_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> ApiResult<Response> {
    state.session.require_identity()?;
    let download = state.library.download(&track_id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace(['"', '\\'], "_")
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type)
        .header(header::CONTENT_LENGTH, download.bytes.len())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(download.bytes))
        .map_err(|e| ApiError::Internal(format!("Building download response failed: {}", e)))
}

/// DELETE /tracks/:id?confirm=true
///
/// Without confirmation nothing is removed and 409 is returned.
pub async fn delete_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Response> {
    let identity = state.session.require_identity()?;

    match state.library.delete(&identity, &track_id, &query.confirm).await {
        Ok(DeleteOutcome::Deleted) => Ok(Json(DeleteResponse {
            track_id,
            outcome: DeleteOutcome::Deleted,
        })
        .into_response()),
        Ok(DeleteOutcome::Cancelled) => Ok((
            StatusCode::CONFLICT,
            Json(DeleteResponse {
                track_id,
                outcome: DeleteOutcome::Cancelled,
            }),
        )
            .into_response()),
        Err(e) => {
            state.record_error(e.to_string()).await;
            Err(e.into())
        }
    }
}

/// Build track routes
pub fn track_routes() -> Router<AppState> {
    Router::new()
        .route("/tracks", get(list_tracks))
        .route("/tracks/refresh", post(refresh_tracks))
        .route("/tracks/stats", get(track_stats))
        .route("/tracks/:id/play", post(play_track))
        .route("/tracks/:id/download", get(download_track))
        .route("/tracks/:id", delete(delete_track))
}
