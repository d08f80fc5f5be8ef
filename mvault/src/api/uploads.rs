//! Upload endpoints
//!
//! POST /uploads, GET /uploads, DELETE /uploads/:id

use std::path::Path as FsPath;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::ingest::{SourceFile, UploadTask};
use crate::AppState;

/// POST /uploads request
#[derive(Debug, Deserialize)]
pub struct StartUploadRequest {
    /// Local file paths, as selected or dropped by the user
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedFile {
    pub task_id: Uuid,
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct RejectedFile {
    pub path: String,
    pub reason: String,
}

/// POST /uploads response
#[derive(Debug, Serialize)]
pub struct StartUploadResponse {
    pub accepted: Vec<AcceptedFile>,
    pub rejected: Vec<RejectedFile>,
}

/// POST /uploads
///
/// Filters the candidates, registers one task per accepted file and runs
/// the ingest in the background. Returns 202 Accepted immediately.
pub async fn start_upload(
    State(state): State<AppState>,
    Json(request): Json<StartUploadRequest>,
) -> ApiResult<(StatusCode, Json<StartUploadResponse>)> {
    let identity = state.session.require_identity()?;

    if request.paths.is_empty() {
        return Err(ApiError::BadRequest("No files given".to_string()));
    }

    let mut rejected = Vec::new();
    let mut candidates = Vec::new();
    for path in request.paths {
        match SourceFile::open(FsPath::new(&path)) {
            Ok(file) => candidates.push(file),
            Err(e) => rejected.push(RejectedFile {
                path,
                reason: e.to_string(),
            }),
        }
    }

    let selection = state.filter.select(candidates);
    rejected.extend(selection.rejected.into_iter().map(|file| RejectedFile {
        path: file.path.display().to_string(),
        reason: "Not an audio file".to_string(),
    }));

    let registered = state.pipeline.register(selection.accepted);
    let accepted = registered
        .iter()
        .map(|(task_id, file)| AcceptedFile {
            task_id: *task_id,
            file_name: file.name.clone(),
        })
        .collect::<Vec<_>>();

    tracing::info!(
        user_id = %identity.id,
        accepted = accepted.len(),
        rejected = rejected.len(),
        "Upload batch started"
    );

    if !registered.is_empty() {
        let state_clone = state.clone();
        tokio::spawn(async move {
            let outcomes = state_clone.pipeline.run(&identity, registered).await;
            if let Some(failed) = outcomes.iter().rev().find_map(|o| o.result.as_ref().err()) {
                state_clone.record_error(failed.to_string()).await;
            }
        });
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(StartUploadResponse { accepted, rejected }),
    ))
}

/// GET /uploads
pub async fn list_uploads(State(state): State<AppState>) -> Json<Vec<UploadTask>> {
    Json(state.pipeline.tasks().list())
}

/// DELETE /uploads/:id
///
/// Hides the card; an in-flight transfer keeps running.
pub async fn dismiss_upload(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.pipeline.tasks().dismiss(task_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Upload task {}", task_id)))
    }
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", get(list_uploads).post(start_upload))
        .route("/uploads/:id", delete(dismiss_upload))
}
