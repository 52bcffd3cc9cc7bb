use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::audio::CaptureFormat;
use crate::realtime::{
    AudioFormat, NoiseReduction, NoiseReductionSetting, SessionUpdate, TranscriptionParams,
    TurnDetection, TurnDetectionSetting,
};

/// Configuration for a transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Transcription language code
    pub language: String,

    /// Transcription model identifier
    pub model: String,

    /// Domain prompt to bias the transcription vocabulary
    pub prompt: String,

    /// Server-side noise reduction profile
    pub noise_reduction: NoiseReduction,

    /// Server-side turn detection mode
    pub turn_detection: TurnDetection,

    /// Outbound pacing interval in milliseconds
    pub poll_interval_ms: u64,

    /// Audio chunk size in bytes requested per poll tick
    pub chunk_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            model: "gpt-4o-mini-transcribe".to_string(),
            prompt: "expect words related to technology".to_string(),
            noise_reduction: NoiseReduction::FarField,
            turn_detection: TurnDetection::SemanticVad,
            poll_interval_ms: 500,
            chunk_bytes: 4096,
        }
    }
}

impl SessionConfig {
    /// Outbound pacing interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject chunk sizes that would split a sample frame.
    pub fn validate(&self, capture: &CaptureFormat) -> Result<()> {
        ensure!(self.chunk_bytes > 0, "chunk_bytes must be positive");
        ensure!(
            self.chunk_bytes % capture.frame_bytes() == 0,
            "chunk_bytes ({}) must be a multiple of the sample frame size ({})",
            self.chunk_bytes,
            capture.frame_bytes()
        );
        ensure!(self.poll_interval_ms > 0, "poll_interval_ms must be positive");
        Ok(())
    }

    /// Handshake message body for this configuration.
    pub fn to_session_update(&self) -> SessionUpdate {
        SessionUpdate {
            input_audio_format: AudioFormat::Pcm16,
            input_audio_noise_reduction: NoiseReductionSetting {
                mode: self.noise_reduction,
            },
            input_audio_transcription: TranscriptionParams {
                language: self.language.clone(),
                model: self.model.clone(),
                prompt: self.prompt.clone(),
            },
            turn_detection: TurnDetectionSetting {
                mode: self.turn_detection,
            },
        }
    }
}
