//! Common error types for MusicVault

use thiserror::Error;

/// Common result type for MusicVault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the ingest pipeline, library view and service
#[derive(Error, Debug)]
pub enum Error {
    /// Required endpoint or credential missing, or config file unreadable.
    /// Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob transfer to the object store failed (per file, not retried)
    #[error("Upload failed: {0}")]
    UploadTransfer(String),

    /// Row insert failed after a successful blob upload
    #[error("Saving track metadata failed: {0}")]
    MetadataInsert(String),

    /// Listing the library failed
    #[error("Loading tracks failed: {0}")]
    Fetch(String),

    /// Blob or row removal failed
    #[error("Deletion failed: {0}")]
    Deletion(String),

    /// Operation requires an authenticated identity
    #[error("Not signed in")]
    NotSignedIn,

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
