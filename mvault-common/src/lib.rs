//! # MusicVault Common Library
//!
//! Shared code for the MusicVault library service:
//! - Error taxonomy
//! - Event types (VaultEvent enum) and the EventBus
//! - Track / identity data model
//! - Configuration loading
//! - Human-readable size and duration formatting

pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod models;

pub use error::{Error, Result};
pub use format::{format_duration, format_file_size};
pub use models::{Identity, NewTrack, Track};
