//! Ingest pipeline
//!
//! Per file: register task → upload blob with progress → resolve public
//! address → decode duration → insert row → complete and notify.
//!
//! All files of one call run concurrently on the calling task with no cap
//! and no retry; a failure only affects its own file. A failed row insert
//! triggers a compensating blob removal so no orphaned blob is left behind.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use mvault_common::events::{EventBus, VaultEvent};
use mvault_common::models::UNKNOWN_ARTIST;
use mvault_common::{Error, Identity, NewTrack, Result, Track};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::accept::SourceFile;
use super::duration::probe_duration;
use super::naming::{storage_path, title_from_file_name, unique_file_name};
use super::tasks::UploadTasks;
use crate::backend::{Backend, ProgressCallback};

/// Terminal result for one file
#[derive(Debug)]
pub struct IngestOutcome {
    pub task_id: Uuid,
    pub file_name: String,
    pub result: Result<Track>,
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Transfer percentage; an empty file counts as fully sent
pub fn percent(loaded: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        loaded as f64 / total as f64 * 100.0
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    backend: Backend,
    tasks: UploadTasks,
    events: EventBus,
}

impl IngestPipeline {
    pub fn new(backend: Backend, tasks: UploadTasks, events: EventBus) -> Self {
        Self {
            backend,
            tasks,
            events,
        }
    }

    pub fn tasks(&self) -> &UploadTasks {
        &self.tasks
    }

    /// Register one task per file without starting any transfer
    pub fn register(&self, files: Vec<SourceFile>) -> Vec<(Uuid, SourceFile)> {
        files
            .into_iter()
            .map(|file| (self.tasks.register(&file.name), file))
            .collect()
    }

    /// Register and run every file
    pub async fn ingest(&self, identity: &Identity, files: Vec<SourceFile>) -> Vec<IngestOutcome> {
        let registered = self.register(files);
        self.run(identity, registered).await
    }

    /// Run already-registered files concurrently
    pub async fn run(
        &self,
        identity: &Identity,
        registered: Vec<(Uuid, SourceFile)>,
    ) -> Vec<IngestOutcome> {
        join_all(
            registered
                .into_iter()
                .map(|(task_id, file)| self.ingest_one(identity, task_id, file)),
        )
        .await
    }

    async fn ingest_one(&self, identity: &Identity, task_id: Uuid, file: SourceFile) -> IngestOutcome {
        let result = self.process(identity, task_id, &file).await;

        match &result {
            Ok(track) => {
                self.tasks.complete(task_id);
                info!(
                    task_id = %task_id,
                    track_id = %track.id,
                    file = %file.name,
                    "Upload completed"
                );
                self.events.emit_lossy(VaultEvent::UploadCompleted {
                    task_id,
                    track: track.clone(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                error!(task_id = %task_id, file = %file.name, error = %e, "Upload error");
                self.tasks.fail(task_id, &e.to_string());
            }
        }

        IngestOutcome {
            task_id,
            file_name: file.name,
            result,
        }
    }

    async fn process(&self, identity: &Identity, task_id: Uuid, file: &SourceFile) -> Result<Track> {
        let file_name = unique_file_name(&file.name);
        let path = storage_path(&identity.id, &file_name);

        let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
            Error::UploadTransfer(format!("Reading {} failed: {}", file.path.display(), e))
        })?;
        let bytes = Bytes::from(bytes);
        let file_size = bytes.len() as u64;

        let tasks = self.tasks.clone();
        let progress: ProgressCallback = Arc::new(move |loaded, total| {
            tasks.set_progress(task_id, percent(loaded, total));
        });

        self.backend
            .objects
            .upload(&path, bytes.clone(), file.upload_content_type(), progress)
            .await
            .map_err(|e| Error::UploadTransfer(e.to_string()))?;

        let file_url = self.backend.objects.public_url(&path);
        let duration = probe_duration(bytes).await;

        let row = NewTrack {
            title: title_from_file_name(&file.name),
            artist: UNKNOWN_ARTIST.to_string(),
            genre: None,
            duration,
            file_url,
            file_name,
            file_size,
            owner: identity.id.clone(),
        };

        match self.backend.rows.insert_track(&row).await {
            Ok(track) => Ok(track),
            Err(e) => {
                self.remove_orphan(&path).await;
                Err(Error::MetadataInsert(e.to_string()))
            }
        }
    }

    /// Compensating step for a failed row insert
    async fn remove_orphan(&self, path: &str) {
        match self.backend.objects.remove(&[path.to_string()]).await {
            Ok(()) => info!(path = %path, "Removed blob after failed metadata insert"),
            Err(e) => warn!(path = %path, error = %e, "Orphaned blob left in storage"),
        }
    }
}
