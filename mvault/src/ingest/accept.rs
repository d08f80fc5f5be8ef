//! Drop/selection surface: which local files may enter the pipeline
//!
//! A file is accepted when it is sniffed (or declared) as `audio/*`, or
//! when its extension is one of the recognized audio extensions. Rejected
//! files never get an upload task.

use std::path::{Path, PathBuf};

use mvault_common::{Error, Result};
use serde::Serialize;
use tracing::debug;

/// Recognized audio extensions (lowercase, without dot)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac"];

/// Content type sent to storage when nothing better is known
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// MIME type for a recognized extension
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "flac" => Some("audio/flac"),
        "m4a" => Some("audio/mp4"),
        "aac" => Some("audio/aac"),
        _ => None,
    }
}

/// A local file handle offered for upload
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Original file name (final path component)
    pub name: String,
    pub size: u64,
    /// Sniffed from the file header, else derived from the extension
    pub content_type: Option<String>,
}

impl SourceFile {
    /// Stat the file and determine its content type
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::InvalidInput(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("Unusable file name: {}", path.display())))?
            .to_string();

        let sniffed = infer::get_from_path(path)?.map(|kind| kind.mime_type().to_string());
        let content_type = sniffed.or_else(|| {
            extension_of(&name)
                .and_then(|ext| content_type_for_extension(&ext))
                .map(String::from)
        });

        debug!(file = %path.display(), content_type = ?content_type, "Opened source file");

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            content_type,
        })
    }

    /// Lowercase extension without the dot
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    pub fn upload_content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(FALLBACK_CONTENT_TYPE)
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Result of running a batch of candidates through the filter
#[derive(Debug, Default)]
pub struct Selection {
    pub accepted: Vec<SourceFile>,
    pub rejected: Vec<SourceFile>,
}

/// Audio type/extension filter
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
}

impl FileFilter {
    pub fn new() -> Self {
        Self {
            extensions: AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn is_accepted(&self, file: &SourceFile) -> bool {
        let audio_type = file
            .content_type
            .as_deref()
            .map(|t| t.starts_with("audio/"))
            .unwrap_or(false);
        let known_extension = file
            .extension()
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false);

        audio_type || known_extension
    }

    pub fn select(&self, candidates: Vec<SourceFile>) -> Selection {
        let (accepted, rejected) = candidates.into_iter().partition(|f| self.is_accepted(f));
        Selection { accepted, rejected }
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new()
    }
}
