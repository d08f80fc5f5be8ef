//! Library data model
//!
//! Field names on the wire follow the `tracks` table columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Artist placeholder for freshly uploaded tracks
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// An authenticated user as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend-assigned user id; every track row is scoped by it
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// One persisted row per uploaded audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque id assigned by the row store on insert
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub genre: Option<String>,
    /// Whole seconds; absent when the container could not be decoded
    #[serde(default)]
    pub duration: Option<u32>,
    /// Publicly resolvable address of the stored blob
    pub file_url: String,
    /// Unique name of the blob inside the owner's storage folder
    pub file_name: String,
    pub file_size: u64,
    #[serde(rename = "user_id")]
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row payload sent to the store; id and timestamps are assigned there
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub duration: Option<u32>,
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    #[serde(rename = "user_id")]
    pub owner: String,
}

impl NewTrack {
    /// Materialize the row the way a store does on insert
    pub fn into_track(self, id: String, now: DateTime<Utc>) -> Track {
        Track {
            id,
            title: self.title,
            artist: self.artist,
            genre: self.genre,
            duration: self.duration,
            file_url: self.file_url,
            file_name: self.file_name,
            file_size: self.file_size,
            owner: self.owner,
            created_at: now,
            updated_at: now,
        }
    }
}
