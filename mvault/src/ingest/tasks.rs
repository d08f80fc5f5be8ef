//! Upload task registry
//!
//! One transient record per file in the pipeline, keyed by a generated id
//! so files sharing a name never overwrite each other's progress. Tasks are
//! never removed automatically; `dismiss` hides a card without stopping the
//! transfer.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use mvault_common::events::{EventBus, VaultEvent};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadTask {
    pub id: Uuid,
    pub file_name: String,
    /// Percent in [0, 100]
    pub progress: f64,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Shared, append-only list of upload tasks
#[derive(Clone)]
pub struct UploadTasks {
    tasks: Arc<RwLock<Vec<UploadTask>>>,
    events: EventBus,
}

impl UploadTasks {
    pub fn new(events: EventBus) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    /// Add a task in `uploading` state at 0%
    pub fn register(&self, file_name: &str) -> Uuid {
        let task = UploadTask {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            progress: 0.0,
            status: UploadStatus::Uploading,
            error: None,
            started_at: Utc::now(),
        };
        let id = task.id;
        self.tasks.write().unwrap().push(task);

        self.events.emit_lossy(VaultEvent::UploadStarted {
            task_id: id,
            file_name: file_name.to_string(),
            timestamp: Utc::now(),
        });
        id
    }

    /// Update progress of an uploading task; clamped to [0, 100]
    pub fn set_progress(&self, id: Uuid, percent: f64) {
        let progress = percent.clamp(0.0, 100.0);
        let updated = self.update(id, |task| {
            if task.status == UploadStatus::Uploading {
                task.progress = progress;
                true
            } else {
                false
            }
        });

        if updated {
            self.events.emit_lossy(VaultEvent::UploadProgress {
                task_id: id,
                progress,
                timestamp: Utc::now(),
            });
        }
    }

    /// Mark completed at 100%
    ///
    /// The `UploadCompleted` notification carries the inserted track and is
    /// emitted by the pipeline, so it fires even for dismissed cards.
    pub fn complete(&self, id: Uuid) {
        self.update(id, |task| {
            task.status = UploadStatus::Completed;
            task.progress = 100.0;
            task.error = None;
            true
        });
    }

    pub fn fail(&self, id: Uuid, message: &str) {
        let updated = self.update(id, |task| {
            task.status = UploadStatus::Error;
            task.error = Some(message.to_string());
            true
        });

        if updated {
            self.events.emit_lossy(VaultEvent::UploadFailed {
                task_id: id,
                message: message.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Remove a card from view; returns false for unknown ids
    pub fn dismiss(&self, id: Uuid) -> bool {
        let removed = {
            let mut tasks = self.tasks.write().unwrap();
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            tasks.len() != before
        };

        if removed {
            self.events.emit_lossy(VaultEvent::UploadDismissed {
                task_id: id,
                timestamp: Utc::now(),
            });
        }
        removed
    }

    pub fn get(&self, id: Uuid) -> Option<UploadTask> {
        self.tasks.read().unwrap().iter().find(|t| t.id == id).cloned()
    }

    /// Tasks in registration order
    pub fn list(&self) -> Vec<UploadTask> {
        self.tasks.read().unwrap().clone()
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut UploadTask) -> bool) -> bool {
        let mut tasks = self.tasks.write().unwrap();
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => apply(task),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_tasks_are_independent() {
        let tasks = UploadTasks::new(EventBus::new(16));
        let a = tasks.register("song.mp3");
        let b = tasks.register("song.mp3");

        tasks.set_progress(a, 40.0);
        tasks.fail(b, "quota exceeded");

        let a = tasks.get(a).unwrap();
        let b = tasks.get(b).unwrap();
        assert_eq!(a.status, UploadStatus::Uploading);
        assert_eq!(a.progress, 40.0);
        assert_eq!(b.status, UploadStatus::Error);
        assert_eq!(b.progress, 0.0);
        assert_eq!(b.error.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_progress_clamped_and_frozen_after_terminal() {
        let tasks = UploadTasks::new(EventBus::new(16));
        let id = tasks.register("a.wav");

        tasks.set_progress(id, 140.0);
        assert_eq!(tasks.get(id).unwrap().progress, 100.0);

        tasks.fail(id, "network");
        tasks.set_progress(id, 10.0);
        assert_eq!(tasks.get(id).unwrap().progress, 100.0);
    }

    #[test]
    fn test_complete_sets_full_progress() {
        let tasks = UploadTasks::new(EventBus::new(16));
        let id = tasks.register("a.wav");
        tasks.set_progress(id, 55.0);
        tasks.complete(id);

        let task = tasks.get(id).unwrap();
        assert_eq!(task.status, UploadStatus::Completed);
        assert_eq!(task.progress, 100.0);
    }

    #[test]
    fn test_dismiss_only_hides() {
        let tasks = UploadTasks::new(EventBus::new(16));
        let id = tasks.register("a.wav");

        assert!(tasks.dismiss(id));
        assert!(!tasks.dismiss(id));
        assert!(tasks.list().is_empty());

        // Late updates for a dismissed card are ignored
        tasks.set_progress(id, 80.0);
        tasks.complete(id);
        assert!(tasks.get(id).is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let tasks = UploadTasks::new(EventBus::new(16));
        tasks.register("a.wav");
        let json = serde_json::to_value(tasks.list()).unwrap();
        assert_eq!(json[0]["status"], "uploading");
        assert!(json[0].get("error").is_none());
    }
}
