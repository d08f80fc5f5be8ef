//! Audio duration extraction
//!
//! Decodes the container headers with lofty, entirely from the in-memory
//! upload bytes. A file that cannot be decoded still ingests with an absent
//! duration.

use std::io::Cursor;

use bytes::Bytes;
use lofty::file::AudioFile;
use lofty::probe::Probe;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DurationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown container or corrupt headers
    #[error("Failed to decode audio: {0}")]
    Decode(String),
}

/// Duration in whole seconds, rounded to nearest
pub fn decode_duration(bytes: &[u8]) -> Result<u32, DurationError> {
    let tagged_file = Probe::new(Cursor::new(bytes))
        .guess_file_type()?
        .read()
        .map_err(|e| DurationError::Decode(e.to_string()))?;

    let seconds = tagged_file.properties().duration().as_secs_f64();
    Ok(seconds.round() as u32)
}

/// Decode on a blocking thread; `None` when decoding fails
pub async fn probe_duration(bytes: Bytes) -> Option<u32> {
    let result = tokio::task::spawn_blocking(move || decode_duration(&bytes)).await;

    match result {
        Ok(Ok(seconds)) => {
            debug!(duration_s = seconds, "Decoded audio duration");
            Some(seconds)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Audio decode failed, storing track without duration");
            None
        }
        Err(e) => {
            warn!(error = %e, "Duration task aborted, storing track without duration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(seconds: f64, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let samples = (seconds * sample_rate as f64) as u32;
            for _ in 0..samples {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_wav_duration_whole_seconds() {
        assert_eq!(decode_duration(&wav_bytes(3.0, 8000)).unwrap(), 3);
    }

    #[test]
    fn test_duration_rounds_to_nearest() {
        assert_eq!(decode_duration(&wav_bytes(2.6, 8000)).unwrap(), 3);
        assert_eq!(decode_duration(&wav_bytes(2.4, 8000)).unwrap(), 2);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(decode_duration(b"definitely not audio").is_err());
    }

    #[tokio::test]
    async fn test_probe_swallows_failures() {
        assert_eq!(probe_duration(Bytes::from_static(b"junk")).await, None);
        assert_eq!(probe_duration(Bytes::from(wav_bytes(1.0, 8000))).await, Some(1));
    }
}
