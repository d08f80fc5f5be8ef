//! Session endpoints
//!
//! GET /session, POST /session/sign-in, POST /session/sign-out

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use mvault_common::Identity;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::session::SessionSnapshot;
use crate::AppState;

/// POST /session/sign-in request
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

/// POST /session/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Json<Identity>> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let identity = state.session.sign_in(request.email.trim(), &request.password).await?;
    info!(user_id = %identity.id, "Signed in");
    Ok(Json(identity))
}

/// POST /session/sign-out
///
/// The local identity is cleared even when the backend call fails.
pub async fn sign_out(State(state): State<AppState>) -> Json<SessionSnapshot> {
    if let Err(e) = state.session.sign_out().await {
        warn!(error = %e, "Backend sign-out failed, local session cleared anyway");
        state.record_error(format!("Sign-out failed: {}", e)).await;
    }
    Json(state.session.snapshot())
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/sign-in", post(sign_in))
        .route("/session/sign-out", post(sign_out))
}
