//! In-memory backend for tests and offline development.
//!
//! Keeps users, blobs and rows in `HashMap`/`Vec` behind `std::sync::RwLock`.
//! Row access is checked against the signed-in identity the same way the
//! hosted store's row-level policies do, so cross-identity isolation can be
//! exercised without a network. Each capability has a failure switch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use mvault_common::{Identity, NewTrack, Track};
use tokio::sync::watch;
use uuid::Uuid;

use super::{BackendError, BackendResult, IdentityProvider, ObjectStore, ProgressCallback, RowStore};

/// Progress granularity for simulated transfers
const PROGRESS_CHUNK: usize = 64 * 1024;

struct UserRecord {
    identity: Identity,
    password: String,
}

#[derive(Default)]
struct FailureSwitches {
    upload: AtomicBool,
    insert: AtomicBool,
    select: AtomicBool,
    remove: AtomicBool,
    delete: AtomicBool,
}

/// Process-local backend implementing identity, objects and rows
pub struct InMemoryBackend {
    bucket: String,
    users: RwLock<Vec<UserRecord>>,
    session: watch::Sender<Option<Identity>>,
    objects: RwLock<HashMap<String, Bytes>>,
    rows: RwLock<Vec<Track>>,
    last_created: RwLock<Option<DateTime<Utc>>>,
    failures: FailureSwitches,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            bucket: mvault_common::config::DEFAULT_BUCKET.to_string(),
            users: RwLock::new(Vec::new()),
            session,
            objects: RwLock::new(HashMap::new()),
            rows: RwLock::new(Vec::new()),
            last_created: RwLock::new(None),
            failures: FailureSwitches::default(),
        }
    }

    /// Register an account that can later sign in
    pub fn register_user(&self, email: &str, password: &str) -> Identity {
        let identity = Identity::new(Uuid::new_v4().to_string()).with_email(email);
        self.users.write().unwrap().push(UserRecord {
            identity: identity.clone(),
            password: password.to_string(),
        });
        identity
    }

    /// Replace the signed-in identity without a password round trip
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.session.send_replace(identity);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.failures.upload.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.failures.insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_selects(&self, fail: bool) {
        self.failures.select.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.failures.remove.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.failures.delete.store(fail, Ordering::SeqCst);
    }

    pub fn has_object(&self, path: &str) -> bool {
        self.objects.read().unwrap().contains_key(path)
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    /// All rows regardless of owner, insertion order
    pub fn all_rows(&self) -> Vec<Track> {
        self.rows.read().unwrap().clone()
    }

    fn signed_in(&self) -> BackendResult<Identity> {
        self.session
            .borrow()
            .clone()
            .ok_or(BackendError::Unauthenticated)
    }

    /// Strictly increasing creation timestamps so newest-first is total
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.last_created.write().unwrap();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    fn injected(switch: &AtomicBool, what: &str) -> BackendResult<()> {
        if switch.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                message: format!("{} unavailable", what),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryBackend {
    async fn current_identity(&self) -> BackendResult<Option<Identity>> {
        Ok(self.session.borrow().clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Identity> {
        let identity = self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.identity.email.as_deref() == Some(email) && u.password == password)
            .map(|u| u.identity.clone())
            .ok_or(BackendError::InvalidCredentials)?;

        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.session.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.session.subscribe()
    }
}

#[async_trait]
impl ObjectStore for InMemoryBackend {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        _content_type: &str,
        progress: ProgressCallback,
    ) -> BackendResult<()> {
        self.signed_in()?;
        Self::injected(&self.failures.upload, "storage")?;

        if self.objects.read().unwrap().contains_key(path) {
            return Err(BackendError::Status {
                status: 409,
                message: format!("The resource already exists: {}", path),
            });
        }

        let total = bytes.len() as u64;
        let mut loaded = 0u64;
        for chunk in bytes.chunks(PROGRESS_CHUNK) {
            loaded += chunk.len() as u64;
            progress(loaded, total);
            tokio::task::yield_now().await;
        }
        if total == 0 {
            progress(0, 0);
        }

        self.objects.write().unwrap().insert(path.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/{}", self.bucket, path)
    }

    async fn remove(&self, paths: &[String]) -> BackendResult<()> {
        self.signed_in()?;
        Self::injected(&self.failures.remove, "storage")?;

        let mut objects = self.objects.write().unwrap();
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn download(&self, path: &str) -> BackendResult<Bytes> {
        self.objects
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl RowStore for InMemoryBackend {
    async fn select_tracks(&self, owner: &str) -> BackendResult<Vec<Track>> {
        let current = self.signed_in()?;
        Self::injected(&self.failures.select, "database")?;

        // Row policy: a session only ever sees its own rows
        if current.id != owner {
            return Ok(Vec::new());
        }

        let mut tracks: Vec<Track> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect();
        tracks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tracks)
    }

    async fn insert_track(&self, row: &NewTrack) -> BackendResult<Track> {
        let current = self.signed_in()?;
        Self::injected(&self.failures.insert, "database")?;

        if current.id != row.owner {
            return Err(BackendError::Status {
                status: 403,
                message: "new row violates row-level security policy".to_string(),
            });
        }

        let track = row
            .clone()
            .into_track(Uuid::new_v4().to_string(), self.next_timestamp());
        self.rows.write().unwrap().push(track.clone());
        Ok(track)
    }

    async fn delete_track(&self, owner: &str, id: &str) -> BackendResult<()> {
        let current = self.signed_in()?;
        Self::injected(&self.failures.delete, "database")?;

        // Row-level security: other owners' rows never match
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        if current.id == owner {
            rows.retain(|t| !(t.id == id && t.owner == owner));
        }
        if rows.len() == before {
            return Err(BackendError::NotFound(format!("Track row {}", id)));
        }
        Ok(())
    }
}
