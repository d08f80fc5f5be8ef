//! Ingest pipeline: local audio files → blob storage + track rows

pub mod accept;
pub mod duration;
pub mod naming;
pub mod pipeline;
pub mod tasks;

pub use accept::{FileFilter, Selection, SourceFile};
pub use pipeline::{IngestOutcome, IngestPipeline};
pub use tasks::{UploadStatus, UploadTask, UploadTasks};
