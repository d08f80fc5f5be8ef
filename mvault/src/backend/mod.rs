//! Backend client abstraction
//!
//! The hosted platform provides three capabilities, each behind its own
//! trait so the ingest pipeline and library view never depend on a concrete
//! client:
//!
//! | Trait | Capability |
//! |-------|------------|
//! | [`IdentityProvider`] | session-based identity |
//! | [`ObjectStore`] | path-addressed blob storage |
//! | [`RowStore`] | owner-scoped track rows |
//!
//! Implementations: [`supabase::SupabaseClient`] (HTTP) and
//! [`memory::InMemoryBackend`] (process-local, failure injection for tests).

pub mod memory;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mvault_common::{Identity, NewTrack, Track};
use thiserror::Error;
use tokio::sync::watch;

/// Backend call failures
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connect, TLS, body stream)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Call needs a signed-in session
    #[error("Not authenticated")]
    Unauthenticated,

    /// Sign-in rejected
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request refused before reaching storage (quota, content type)
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Response body did not match the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Upload progress callback, called with `(loaded, total)` byte counts
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Session-based identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current signed-in identity, `None` when signed out
    async fn current_identity(&self) -> BackendResult<Option<Identity>>;

    /// Password sign-in; on success the backend session is replaced
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Identity>;

    /// Invalidate the backend session
    async fn sign_out(&self) -> BackendResult<()>;

    /// Identity-change notifications
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// Path-addressed blob storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, reporting transfer progress
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        progress: ProgressCallback,
    ) -> BackendResult<()>;

    /// Publicly resolvable address of the blob at `path`
    fn public_url(&self, path: &str) -> String;

    /// Remove every blob in `paths`
    async fn remove(&self, paths: &[String]) -> BackendResult<()>;

    /// Fetch blob contents
    async fn download(&self, path: &str) -> BackendResult<Bytes>;
}

/// Track rows, always scoped by owner
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Every row owned by `owner`, newest `created_at` first
    async fn select_tracks(&self, owner: &str) -> BackendResult<Vec<Track>>;

    /// Insert one row; id and timestamps are assigned by the store
    async fn insert_track(&self, row: &NewTrack) -> BackendResult<Track>;

    /// Delete the row `id` if it belongs to `owner`
    async fn delete_track(&self, owner: &str, id: &str) -> BackendResult<()>;
}

/// Cloneable bundle of the three backend capabilities
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub objects: Arc<dyn ObjectStore>,
    pub rows: Arc<dyn RowStore>,
}

impl Backend {
    /// Build a bundle from a single client implementing all capabilities
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: IdentityProvider + ObjectStore + RowStore + 'static,
    {
        Self {
            identity: client.clone(),
            objects: client.clone(),
            rows: client,
        }
    }
}
