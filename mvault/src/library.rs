//! Library view
//!
//! Owns the signed-in user's track list and the playback slot. The list is
//! replaced wholesale on every successful fetch; a failed fetch is logged
//! and leaves the previous list in place.
//!
//! Re-fetches are driven by [`LibraryView::spawn_refresh_listener`], which
//! follows `UploadCompleted` and `SessionChanged` on the event bus.

use std::sync::{Arc, RwLock, Weak};

use bytes::Bytes;
use chrono::{DateTime, Datelike, Utc};
use mvault_common::events::{EventBus, VaultEvent};
use mvault_common::{format_duration, format_file_size, Error, Identity, Result, Track};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::ingest::accept::{content_type_for_extension, FALLBACK_CONTENT_TYPE};
use crate::ingest::naming::storage_path;
use crate::playback::{PlaybackSlot, PlaybackState};
use crate::session::SessionProvider;

/// Interactive confirmation for destructive operations
pub trait Confirmation: Send + Sync {
    fn confirm(&self, track: &Track) -> bool;
}

/// Pre-answered confirmation (e.g. a `confirm=true` query flag)
impl Confirmation for bool {
    fn confirm(&self, _track: &Track) -> bool {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteOutcome {
    Deleted,
    /// Confirmation declined, nothing touched
    Cancelled,
}

/// Blob contents offered for saving under the track title
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibrarySnapshot {
    pub tracks: Vec<Track>,
    /// True until the first fetch for the current identity resolves
    pub loading: bool,
}

/// Dashboard summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryStats {
    pub total_tracks: usize,
    pub total_bytes: u64,
    pub total_size: String,
    pub total_duration_secs: u64,
    pub total_duration: String,
    pub uploads_this_month: usize,
}

impl LibraryStats {
    pub fn from_tracks(tracks: &[Track], now: DateTime<Utc>) -> Self {
        let total_bytes: u64 = tracks.iter().map(|t| t.file_size).sum();
        let total_duration_secs: u64 = tracks.iter().filter_map(|t| t.duration).map(u64::from).sum();
        let uploads_this_month = tracks
            .iter()
            .filter(|t| t.created_at.year() == now.year() && t.created_at.month() == now.month())
            .count();

        Self {
            total_tracks: tracks.len(),
            total_bytes,
            total_size: format_file_size(total_bytes),
            total_duration_secs,
            total_duration: format_duration(u32::try_from(total_duration_secs).unwrap_or(u32::MAX)),
            uploads_this_month,
        }
    }
}

struct LibraryState {
    tracks: Vec<Track>,
    /// Identity the list belongs to
    owner: Option<String>,
    loading: bool,
}

struct Inner {
    backend: Backend,
    events: EventBus,
    playback: PlaybackSlot,
    state: RwLock<LibraryState>,
}

/// Cloneable library handle
#[derive(Clone)]
pub struct LibraryView {
    inner: Arc<Inner>,
}

impl LibraryView {
    pub fn new(backend: Backend, playback: PlaybackSlot, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                events,
                playback,
                state: RwLock::new(LibraryState {
                    tracks: Vec::new(),
                    owner: None,
                    loading: true,
                }),
            }),
        }
    }

    pub fn playback(&self) -> &PlaybackSlot {
        &self.inner.playback
    }

    /// Fetch every track owned by `identity`, newest first
    ///
    /// On failure the error is logged and the previous list stays. A list
    /// belonging to a different identity is dropped before fetching.
    pub async fn load_tracks(&self, identity: &Identity) -> Result<usize> {
        {
            let mut state = self.inner.state.write().unwrap();
            if state.owner.as_deref() != Some(identity.id.as_str()) {
                state.tracks.clear();
                state.owner = Some(identity.id.clone());
                state.loading = true;
            }
        }

        let result = self.inner.backend.rows.select_tracks(&identity.id).await;

        let mut state = self.inner.state.write().unwrap();
        state.loading = false;
        match result {
            Ok(tracks) => {
                // Identity changed while fetching
                if state.owner.as_deref() != Some(identity.id.as_str()) {
                    debug!(user_id = %identity.id, "Discarding stale track list");
                    return Ok(state.tracks.len());
                }
                let count = tracks.len();
                state.tracks = tracks;
                drop(state);

                debug!(user_id = %identity.id, count, "Track list loaded");
                self.inner.events.emit_lossy(VaultEvent::LibraryLoaded {
                    count,
                    timestamp: Utc::now(),
                });
                Ok(count)
            }
            Err(e) => {
                error!(user_id = %identity.id, error = %e, "Error loading tracks");
                Err(Error::Fetch(e.to_string()))
            }
        }
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.inner.state.read().unwrap().tracks.clone()
    }

    pub fn snapshot(&self) -> LibrarySnapshot {
        let state = self.inner.state.read().unwrap();
        LibrarySnapshot {
            tracks: state.tracks.clone(),
            loading: state.loading,
        }
    }

    pub fn find(&self, track_id: &str) -> Option<Track> {
        self.inner
            .state
            .read()
            .unwrap()
            .tracks
            .iter()
            .find(|t| t.id == track_id)
            .cloned()
    }

    fn require(&self, track_id: &str) -> Result<Track> {
        self.find(track_id)
            .ok_or_else(|| Error::NotFound(format!("Track {}", track_id)))
    }

    /// Play/pause toggle on the shared slot
    pub fn play(&self, track_id: &str) -> Result<PlaybackState> {
        let track = self.require(track_id)?;
        Ok(self.inner.playback.toggle(&track))
    }

    /// Fetch the blob for saving under the track's title
    pub async fn download(&self, track_id: &str) -> Result<Download> {
        let track = self.require(track_id)?;
        let path = storage_path(&track.owner, &track.file_name);

        let bytes = self
            .inner
            .backend
            .objects
            .download(&path)
            .await
            .map_err(|e| {
                error!(track_id = %track.id, error = %e, "Error downloading track");
                Error::Fetch(format!("Downloading {} failed: {}", track.title, e))
            })?;

        let content_type = track
            .file_name
            .rsplit_once('.')
            .and_then(|(_, ext)| content_type_for_extension(&ext.to_lowercase()))
            .unwrap_or(FALLBACK_CONTENT_TYPE);

        Ok(Download {
            file_name: track.title,
            content_type,
            bytes,
        })
    }

    /// Remove the blob, then the row
    ///
    /// A failed blob removal aborts before the row is touched. Failures are
    /// surfaced as an `Alert` event.
    pub async fn delete(
        &self,
        identity: &Identity,
        track_id: &str,
        confirmation: &dyn Confirmation,
    ) -> Result<DeleteOutcome> {
        let track = self.require(track_id)?;
        // The list may still hold a previous identity's rows
        if track.owner != identity.id {
            return Err(Error::NotFound(format!("Track {}", track_id)));
        }

        if !confirmation.confirm(&track) {
            info!(track_id = %track.id, "Deletion cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        let path = storage_path(&identity.id, &track.file_name);
        if let Err(e) = self.inner.backend.objects.remove(&[path]).await {
            return Err(self.deletion_failed(&track, e.to_string()));
        }

        if let Err(e) = self
            .inner
            .backend
            .rows
            .delete_track(&identity.id, &track.id)
            .await
        {
            warn!(track_id = %track.id, "Blob removed but track row remains");
            return Err(self.deletion_failed(&track, e.to_string()));
        }

        self.inner
            .state
            .write()
            .unwrap()
            .tracks
            .retain(|t| t.id != track.id);
        self.inner.playback.stop_if_current(&track.id);

        info!(track_id = %track.id, title = %track.title, "Track deleted");
        self.inner.events.emit_lossy(VaultEvent::TrackDeleted {
            track_id: track.id,
            timestamp: Utc::now(),
        });
        Ok(DeleteOutcome::Deleted)
    }

    fn deletion_failed(&self, track: &Track, message: String) -> Error {
        error!(track_id = %track.id, error = %message, "Error deleting track");
        let error = Error::Deletion(message);
        self.inner.events.emit_lossy(VaultEvent::Alert {
            message: format!("Failed to delete track: {}", error),
            timestamp: Utc::now(),
        });
        error
    }

    /// Summary over the tracks owned by `identity`
    pub fn stats(&self, identity: &Identity) -> LibraryStats {
        let state = self.inner.state.read().unwrap();
        let owned: Vec<Track> = state
            .tracks
            .iter()
            .filter(|t| t.owner == identity.id)
            .cloned()
            .collect();
        LibraryStats::from_tracks(&owned, Utc::now())
    }

    /// Forget the list and stop playback (sign-out)
    pub fn clear(&self) {
        {
            let mut state = self.inner.state.write().unwrap();
            state.tracks.clear();
            state.owner = None;
            state.loading = false;
        }
        self.inner.playback.clear();
    }

    /// Re-fetch on completed uploads and identity changes
    pub fn spawn_refresh_listener(&self, session: SessionProvider) -> JoinHandle<()> {
        let mut rx = self.inner.events.subscribe();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let identity = match rx.recv().await {
                    Ok(VaultEvent::UploadCompleted { .. }) => session.current(),
                    Ok(VaultEvent::SessionChanged { identity, .. }) => identity,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Library refresh listener lagged, reloading");
                        session.current()
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(inner) = weak.upgrade() else { break };
                let library = LibraryView { inner };
                match identity {
                    Some(identity) => {
                        // Failure is already logged
                        let _ = library.load_tracks(&identity).await;
                    }
                    None => library.clear(),
                }
            }
            debug!("Library refresh listener stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mvault_common::NewTrack;

    fn track(id: &str, size: u64, duration: Option<u32>, created_at: DateTime<Utc>) -> Track {
        NewTrack {
            title: id.to_string(),
            artist: "Unknown Artist".to_string(),
            genre: None,
            duration,
            file_url: format!("https://cdn.example.test/{}.mp3", id),
            file_name: format!("{}.mp3", id),
            file_size: size,
            owner: "u1".to_string(),
        }
        .into_track(id.to_string(), created_at)
    }

    #[test]
    fn test_stats_summary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let tracks = vec![
            track("a", 1024, Some(125), now),
            track("b", 512, None, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            track("c", 1024 * 1024, Some(59), Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()),
            track("d", 0, Some(1), Utc.with_ymd_and_hms(2023, 3, 10, 0, 0, 0).unwrap()),
        ];

        let stats = LibraryStats::from_tracks(&tracks, now);
        assert_eq!(stats.total_tracks, 4);
        assert_eq!(stats.total_bytes, 1024 + 512 + 1024 * 1024);
        assert_eq!(stats.total_duration_secs, 185);
        assert_eq!(stats.total_duration, "3:05");
        assert_eq!(stats.uploads_this_month, 2);
    }

    #[test]
    fn test_empty_stats() {
        let stats = LibraryStats::from_tracks(&[], Utc::now());
        assert_eq!(stats.total_tracks, 0);
        assert_eq!(stats.total_size, "0 B");
        assert_eq!(stats.total_duration, "0:00");
    }

    #[test]
    fn test_bool_confirmation() {
        let t = track("a", 1, None, Utc::now());
        assert!(true.confirm(&t));
        assert!(!false.confirm(&t));
    }
}
