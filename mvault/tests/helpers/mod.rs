//! Shared test helpers for mvault integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mvault::backend::memory::InMemoryBackend;
use mvault::backend::Backend;
use mvault::AppState;
use mvault_common::events::{EventBus, VaultEvent};
use mvault_common::Identity;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub const PASSWORD: &str = "correct horse";

/// Write a silent mono WAV of exactly `seconds` at 8 kHz / 16 bit
pub fn write_wav(dir: &Path, name: &str, seconds: f64) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("Failed to create WAV");
    let samples = (seconds * 8000.0) as u32;
    for _ in 0..samples {
        writer.write_sample(0i16).expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
    path
}

/// Write arbitrary bytes under `name`
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write test file");
    path
}

/// In-memory backend, wired app state and a temp dir for source files
pub struct TestVault {
    pub backend: Arc<InMemoryBackend>,
    pub state: AppState,
    pub events: EventBus,
    pub dir: TempDir,
}

impl TestVault {
    pub async fn new() -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let events = EventBus::new(4096);
        let state = AppState::new(Backend::from_client(backend.clone()), events.clone());
        state.session.start().await;

        Self {
            backend,
            state,
            events,
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Register `email` and sign in through the session provider
    pub async fn sign_in_new_user(&self, email: &str) -> Identity {
        self.backend.register_user(email, PASSWORD);
        self.state
            .session
            .sign_in(email, PASSWORD)
            .await
            .expect("Sign-in failed")
    }

    pub fn wav(&self, name: &str, seconds: f64) -> PathBuf {
        write_wav(self.dir.path(), name, seconds)
    }

    pub fn file(&self, name: &str, contents: &[u8]) -> PathBuf {
        write_file(self.dir.path(), name, contents)
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Everything already queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<VaultEvent>) -> Vec<VaultEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
