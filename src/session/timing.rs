use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Wall-clock marks used to derive elapsed durations from event ordering.
///
/// Absence of a mark is a valid state (the corresponding server event was
/// never seen); it yields a warning and an omitted metric, not a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingMarks {
    speech_started_at: Option<Instant>,
    audio_committed_at: Option<Instant>,
}

impl TimingMarks {
    pub fn mark_speech_start(&mut self, now: Instant) {
        self.speech_started_at = Some(now);
    }

    /// Elapsed time since the speech-start mark, consuming the mark.
    ///
    /// `None` when no speech-start event was seen.
    pub fn take_speech_duration(&mut self, now: Instant) -> Option<Duration> {
        self.speech_started_at
            .take()
            .map(|start| now.saturating_duration_since(start))
    }

    pub fn mark_commit(&mut self, now: Instant) {
        self.audio_committed_at = Some(now);
    }

    /// Elapsed time since the commit mark, or `None` if never committed.
    pub fn transcription_duration(&self, now: Instant) -> Option<Duration> {
        self.audio_committed_at
            .map(|start| now.saturating_duration_since(start))
    }
}

/// Statistics about a transcription session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Number of audio chunks sent to the endpoint
    pub chunks_sent: usize,

    /// Number of partial transcript fragments received
    pub partial_count: usize,

    /// Duration of the most recent utterance, if speech boundaries were seen
    pub last_speech_duration: Option<Duration>,

    /// Commit-to-transcript latency of the most recent utterance
    pub last_transcription_duration: Option<Duration>,

    /// Final transcript text, once the server completed the turn
    pub final_transcript: Option<String>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            chunks_sent: 0,
            partial_count: 0,
            last_speech_duration: None,
            last_transcription_duration: None,
            final_transcript: None,
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}
