//! Event types for the MusicVault event system
//!
//! Provides the shared event definitions and the EventBus that connects the
//! ingest pipeline, the library view, the playback slot and the SSE stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Identity, Track};

/// MusicVault event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
    /// Signed-in identity changed (sign-in, sign-out, backend notification)
    ///
    /// Triggers:
    /// - Library View: re-fetch or clear the track list
    /// - SSE: swap the UI between sign-in form and dashboard
    SessionChanged {
        identity: Option<Identity>,
        timestamp: DateTime<Utc>,
    },

    /// A file entered the ingest pipeline
    UploadStarted {
        task_id: Uuid,
        file_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Transfer progress for one file (0.0 - 100.0)
    UploadProgress {
        task_id: Uuid,
        progress: f64,
        timestamp: DateTime<Utc>,
    },

    /// Blob stored and row inserted; emitted exactly once per successful file
    ///
    /// Triggers:
    /// - Library View: re-fetch the track list
    UploadCompleted {
        task_id: Uuid,
        track: Track,
        timestamp: DateTime<Utc>,
    },

    /// Ingest failed for one file
    UploadFailed {
        task_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Upload card removed from view (transfer is not cancelled)
    UploadDismissed {
        task_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Track list replaced after a successful fetch
    LibraryLoaded {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Track removed from blob storage and row store
    TrackDeleted {
        track_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Playback slot changed state
    PlaybackStateChanged {
        track_id: Option<String>,
        playing: bool,
        timestamp: DateTime<Utc>,
    },

    /// Instruction for the audio element that renders the playback slot
    PlaybackCommand {
        command: PlaybackCommand,
        timestamp: DateTime<Utc>,
    },

    /// User-facing failure that needs a modal (deletion errors)
    Alert {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Commands sent to the audio output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlaybackCommand {
    Load { url: String },
    Play,
    Pause,
    Stop,
}

impl VaultEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            VaultEvent::SessionChanged { .. } => "SessionChanged",
            VaultEvent::UploadStarted { .. } => "UploadStarted",
            VaultEvent::UploadProgress { .. } => "UploadProgress",
            VaultEvent::UploadCompleted { .. } => "UploadCompleted",
            VaultEvent::UploadFailed { .. } => "UploadFailed",
            VaultEvent::UploadDismissed { .. } => "UploadDismissed",
            VaultEvent::LibraryLoaded { .. } => "LibraryLoaded",
            VaultEvent::TrackDeleted { .. } => "TrackDeleted",
            VaultEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            VaultEvent::PlaybackCommand { .. } => "PlaybackCommand",
            VaultEvent::Alert { .. } => "Alert",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mvault_common::events::{EventBus, VaultEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(VaultEvent::Alert {
///     message: "Deletion failed".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(VaultEvent::Alert { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VaultEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VaultEvent) {
        let _ = self.tx.send(event);
    }
}
