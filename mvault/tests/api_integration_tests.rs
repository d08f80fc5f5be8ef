//! Integration tests for mvault API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use helpers::{eventually, TestVault, PASSWORD};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

/// Test helper: create test app backed by the in-memory backend
async fn create_test_app() -> (Router, TestVault) {
    let vault = TestVault::new().await;
    let app = mvault::build_router(vault.state.clone());
    (app, vault)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn sign_in(app: &Router, vault: &TestVault, email: &str) -> Value {
    vault.backend.register_user(email, PASSWORD);
    let (status, body) = send(
        app,
        "POST",
        "/session/sign-in",
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

/// Upload one WAV through the API and wait for its task to finish
async fn upload_one(app: &Router, vault: &TestVault, name: &str) -> String {
    let path = vault.wav(name, 2.0);
    let (status, body) = send(
        app,
        "POST",
        "/uploads",
        Some(json!({ "paths": [path.display().to_string()] })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = body["accepted"][0]["task_id"].as_str().unwrap().to_string();

    let tasks = vault.state.pipeline.tasks().clone();
    let id = task_id.parse().unwrap();
    assert!(
        eventually(|| tasks
            .get(id)
            .map(|t| t.status == mvault::ingest::UploadStatus::Completed)
            .unwrap_or(false))
        .await
    );

    let (status, _) = send(app, "POST", "/tracks/refresh", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, tracks) = send(app, "GET", "/tracks", None).await;
    tracks["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["title"] == name.trim_end_matches(".wav"))
        .map(|t| t["id"].as_str().unwrap().to_string())
        .expect("uploaded track not listed")
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _vault) = create_test_app().await;

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "mvault");
    assert!(body["uptime_seconds"].is_u64());
    assert_eq!(body["signed_in"], false);
    assert_eq!(body["session_loading"], false);
    assert_eq!(body["tracks"], 0);
    assert_eq!(body["uploads_in_flight"], 0);
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_library_requires_sign_in() {
    let (app, _vault) = create_test_app().await;

    let (status, body) = send(&app, "GET", "/tracks", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_sign_in_flow() {
    let (app, vault) = create_test_app().await;

    let (status, body) = send(&app, "GET", "/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["identity"].is_null());
    assert_eq!(body["loading"], false);

    vault.backend.register_user("u1@example.test", PASSWORD);
    let (status, _) = send(
        &app,
        "POST",
        "/session/sign-in",
        Some(json!({ "email": "u1@example.test", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, identity) = send(
        &app,
        "POST",
        "/session/sign-in",
        Some(json!({ "email": "u1@example.test", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(identity["email"], "u1@example.test");

    let (_, body) = send(&app, "GET", "/session", None).await;
    assert_eq!(body["identity"]["id"], identity["id"]);

    let (status, body) = send(&app, "POST", "/session/sign-out", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["identity"].is_null());
}

#[tokio::test]
async fn test_sign_in_rejects_blank_fields() {
    let (app, _vault) = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/session/sign-in",
        Some(json!({ "email": " ", "password": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_upload_accepts_audio_and_rejects_others() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;
    let song = vault.wav("song.wav", 1.0);
    let notes = vault.file("notes.txt", b"not audio");

    let (status, body) = send(
        &app,
        "POST",
        "/uploads",
        Some(json!({
            "paths": [
                song.display().to_string(),
                notes.display().to_string(),
                "/definitely/missing.mp3",
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"].as_array().unwrap().len(), 1);
    assert_eq!(body["accepted"][0]["file_name"], "song.wav");
    assert_eq!(body["rejected"].as_array().unwrap().len(), 2);

    let (status, tasks) = send(&app, "GET", "/uploads", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_requires_paths() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;

    let (status, _) = send(&app, "POST", "/uploads", Some(json!({ "paths": [] }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dismiss_upload_task() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;
    upload_one(&app, &vault, "song.wav").await;

    let (_, tasks) = send(&app, "GET", "/uploads", None).await;
    let task_id = tasks[0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "DELETE", &format!("/uploads/{}", task_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &format!("/uploads/{}", task_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uploaded_track_is_listed_with_stats() {
    let (app, vault) = create_test_app().await;
    let identity = sign_in(&app, &vault, "u1@example.test").await;
    upload_one(&app, &vault, "song.wav").await;

    let (status, body) = send(&app, "GET", "/tracks", None).await;
    assert_eq!(status, StatusCode::OK);
    let track = &body["tracks"][0];
    assert_eq!(track["title"], "song");
    assert_eq!(track["artist"], "Unknown Artist");
    assert_eq!(track["duration"], 2);
    assert_eq!(track["user_id"], identity["id"]);

    let (status, stats) = send(&app, "GET", "/tracks/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_tracks"], 1);
    assert_eq!(stats["total_duration"], "0:02");
}

#[tokio::test]
async fn test_play_toggle_and_output_events() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;
    let track_id = upload_one(&app, &vault, "song.wav").await;

    let (status, state) = send(&app, "POST", &format!("/tracks/{}/play", track_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["state"], "playing");
    assert_eq!(state["track_id"], track_id.as_str());

    let (_, state) = send(&app, "POST", &format!("/tracks/{}/play", track_id), None).await;
    assert_eq!(state["state"], "paused");

    let (_, state) = send(
        &app,
        "POST",
        "/playback/events",
        Some(json!({ "event": "playing" })),
    )
    .await;
    assert_eq!(state["state"], "playing");

    let (_, state) = send(
        &app,
        "POST",
        "/playback/events",
        Some(json!({ "event": "ended" })),
    )
    .await;
    assert_eq!(state["state"], "idle");

    let (_, state) = send(&app, "GET", "/playback", None).await;
    assert_eq!(state["state"], "idle");
}

#[tokio::test]
async fn test_download_sets_attachment_name() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;
    let track_id = upload_one(&app, &vault, "song.wav").await;

    let request = Request::builder()
        .uri(format!("/tracks/{}/download", track_id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"song\""
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..4], b"RIFF");
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;
    let track_id = upload_one(&app, &vault, "song.wav").await;

    let (status, body) = send(&app, "DELETE", &format!("/tracks/{}", track_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["outcome"], "cancelled");
    assert_eq!(vault.backend.all_rows().len(), 1);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/tracks/{}?confirm=true", track_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "deleted");

    let (_, body) = send(&app, "GET", "/tracks", None).await;
    assert!(body["tracks"].as_array().unwrap().is_empty());
    assert!(vault.backend.all_rows().is_empty());
}

#[tokio::test]
async fn test_failed_deletion_is_reported_and_recorded() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;
    let track_id = upload_one(&app, &vault, "song.wav").await;
    vault.backend.fail_removes(true);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/tracks/{}?confirm=true", track_id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "DELETION_FAILED");
    assert_eq!(vault.backend.all_rows().len(), 1);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["signed_in"], true);
    assert_eq!(health["tracks"], 1);
    assert!(health["last_error"].as_str().unwrap().contains("Deletion failed"));
}

#[tokio::test]
async fn test_unknown_track_is_not_found() {
    let (app, vault) = create_test_app().await;
    sign_in(&app, &vault, "u1@example.test").await;

    let (status, body) = send(&app, "POST", "/tracks/nope/play", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_event_stream_forwards_events() {
    let (app, vault) = create_test_app().await;

    let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    vault.events.emit_lossy(mvault_common::events::VaultEvent::Alert {
        message: "Failed to delete track".to_string(),
        timestamp: chrono::Utc::now(),
    });

    let mut body = response.into_body();
    let frame = tokio::time::timeout(std::time::Duration::from_secs(2), body.frame())
        .await
        .expect("no SSE frame")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: Alert"));
    assert!(text.contains("Failed to delete track"));
}
