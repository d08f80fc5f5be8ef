//! Single playback slot
//!
//! At most one track is loaded at a time. The slot is a three-state machine
//! so a "playing" flag without a loaded track cannot be represented:
//!
//! ```text
//! Idle ──toggle(A)──▶ Playing(A) ──toggle(A)──▶ Paused(A) ──toggle(A)──▶ Playing(A)
//!                        │  ▲                      │
//!                  toggle(B) └──── toggle(B) ──────┘ (loads B)
//!                        │
//!                  Ended / stop_if_current(A) ──▶ Idle
//! ```
//!
//! The slot drives an [`AudioOutput`]; the output reports back through
//! [`PlaybackSlot::on_output_event`].

use std::sync::{Arc, Mutex};

use chrono::Utc;
use mvault_common::events::{EventBus, PlaybackCommand, VaultEvent};
use mvault_common::Track;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Paused { track_id: String, url: String },
    Playing { track_id: String, url: String },
}

impl PlaybackState {
    /// Id of the loaded track, if any
    pub fn current_track(&self) -> Option<&str> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Paused { track_id, .. } | PlaybackState::Playing { track_id, .. } => {
                Some(track_id)
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }
}

/// Notifications from the audio element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEvent {
    Playing,
    Paused,
    /// Natural end of the loaded track
    Ended,
}

/// The one audio element the slot controls
pub trait AudioOutput: Send + Sync {
    /// Replace the loaded source
    fn load(&self, url: &str);
    fn play(&self);
    fn pause(&self);
    /// Unload the current source
    fn stop(&self);
}

/// Publishes output instructions as `PlaybackCommand` events for the
/// browser's audio element
pub struct BroadcastOutput {
    events: EventBus,
}

impl BroadcastOutput {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    fn send(&self, command: PlaybackCommand) {
        self.events.emit_lossy(VaultEvent::PlaybackCommand {
            command,
            timestamp: Utc::now(),
        });
    }
}

impl AudioOutput for BroadcastOutput {
    fn load(&self, url: &str) {
        self.send(PlaybackCommand::Load {
            url: url.to_string(),
        });
    }

    fn play(&self) {
        self.send(PlaybackCommand::Play);
    }

    fn pause(&self) {
        self.send(PlaybackCommand::Pause);
    }

    fn stop(&self) {
        self.send(PlaybackCommand::Stop);
    }
}

/// Cloneable handle to the shared slot
#[derive(Clone)]
pub struct PlaybackSlot {
    state: Arc<Mutex<PlaybackState>>,
    output: Arc<dyn AudioOutput>,
    events: EventBus,
}

impl PlaybackSlot {
    pub fn new(output: Arc<dyn AudioOutput>, events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlaybackState::Idle)),
            output,
            events,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state.lock().unwrap().clone()
    }

    /// Play/pause toggle for `track`
    ///
    /// Pauses when `track` is the one playing, otherwise loads it from the
    /// start in place of whatever was loaded (a paused track included).
    pub fn toggle(&self, track: &Track) -> PlaybackState {
        self.transition(|state, output| match state {
            PlaybackState::Playing { track_id, url } if *track_id == track.id => {
                output.pause();
                Some(PlaybackState::Paused {
                    track_id: track_id.clone(),
                    url: url.clone(),
                })
            }
            _ => {
                output.load(&track.file_url);
                output.play();
                Some(PlaybackState::Playing {
                    track_id: track.id.clone(),
                    url: track.file_url.clone(),
                })
            }
        })
    }

    /// Follow the audio element's own state reports
    pub fn on_output_event(&self, event: OutputEvent) -> PlaybackState {
        self.transition(|state, _| match (event, state) {
            (OutputEvent::Playing, PlaybackState::Paused { track_id, url }) => {
                Some(PlaybackState::Playing {
                    track_id: track_id.clone(),
                    url: url.clone(),
                })
            }
            (OutputEvent::Paused, PlaybackState::Playing { track_id, url }) => {
                Some(PlaybackState::Paused {
                    track_id: track_id.clone(),
                    url: url.clone(),
                })
            }
            (OutputEvent::Ended, PlaybackState::Playing { .. } | PlaybackState::Paused { .. }) => {
                Some(PlaybackState::Idle)
            }
            _ => None,
        })
    }

    /// Stop and unload when `track_id` is the loaded track
    pub fn stop_if_current(&self, track_id: &str) -> bool {
        let mut stopped = false;
        self.transition(|state, output| {
            if state.current_track() == Some(track_id) {
                output.stop();
                stopped = true;
                Some(PlaybackState::Idle)
            } else {
                None
            }
        });
        stopped
    }

    /// Stop and unload whatever is loaded
    pub fn clear(&self) {
        self.transition(|state, output| match state {
            PlaybackState::Idle => None,
            _ => {
                output.stop();
                Some(PlaybackState::Idle)
            }
        });
    }

    /// Apply `step` under the lock; `None` means no change
    fn transition(
        &self,
        step: impl FnOnce(&PlaybackState, &dyn AudioOutput) -> Option<PlaybackState>,
    ) -> PlaybackState {
        let next = {
            let mut state = self.state.lock().unwrap();
            match step(&*state, self.output.as_ref()) {
                Some(next) if next != *state => {
                    *state = next.clone();
                    Some(next)
                }
                _ => None,
            }
        };

        match next {
            Some(next) => {
                debug!(state = ?next, "Playback state changed");
                self.events.emit_lossy(VaultEvent::PlaybackStateChanged {
                    track_id: next.current_track().map(str::to_string),
                    playing: next.is_playing(),
                    timestamp: Utc::now(),
                });
                next
            }
            None => self.state(),
        }
    }
}
