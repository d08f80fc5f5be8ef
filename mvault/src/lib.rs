//! mvault library interface
//!
//! Personal music library service: sign in, upload audio files to blob
//! storage with a metadata row each, then list, play, download and delete
//! them. Exposed over HTTP + SSE for a browser front end.

pub mod api;
pub mod backend;
pub mod error;
pub mod ingest;
pub mod library;
pub mod playback;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use mvault_common::events::EventBus;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::backend::Backend;
use crate::ingest::{FileFilter, IngestPipeline, UploadTasks};
use crate::library::LibraryView;
use crate::playback::{AudioOutput, BroadcastOutput, PlaybackSlot};
use crate::session::SessionProvider;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub session: SessionProvider,
    pub pipeline: IngestPipeline,
    pub library: LibraryView,
    pub filter: FileFilter,
    /// Event bus for SSE broadcasting and component notifications
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire the components with playback rendered by the browser
    pub fn new(backend: Backend, event_bus: EventBus) -> Self {
        let output = Arc::new(BroadcastOutput::new(event_bus.clone()));
        Self::with_output(backend, event_bus, output)
    }

    pub fn with_output(backend: Backend, event_bus: EventBus, output: Arc<dyn AudioOutput>) -> Self {
        let session = SessionProvider::new(backend.identity.clone(), event_bus.clone());
        let playback = PlaybackSlot::new(output, event_bus.clone());
        let library = LibraryView::new(backend.clone(), playback, event_bus.clone());
        let pipeline = IngestPipeline::new(
            backend.clone(),
            UploadTasks::new(event_bus.clone()),
            event_bus.clone(),
        );

        Self {
            backend,
            session,
            pipeline,
            library,
            filter: FileFilter::new(),
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::session_routes())
        .merge(api::upload_routes())
        .merge(api::track_routes())
        .merge(api::playback_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
