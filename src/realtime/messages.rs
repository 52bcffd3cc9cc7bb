use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input audio encoding advertised in the session handshake.
///
/// Only raw PCM is used here; audio bytes are passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Pcm16,
}

/// Server-side noise reduction profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseReduction {
    /// Distant microphone (laptop/room mic)
    FarField,
    /// Close-talking microphone (headset)
    NearField,
}

/// Server-side turn detection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDetection {
    /// Segmentation on semantic/linguistic cues
    SemanticVad,
    /// Segmentation on silence thresholds
    ServerVad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseReductionSetting {
    #[serde(rename = "type")]
    pub mode: NoiseReduction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetectionSetting {
    #[serde(rename = "type")]
    pub mode: TurnDetection,
}

/// Transcription parameters sent in the session handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionParams {
    pub language: String,
    pub model: String,
    pub prompt: String,
}

/// Body of the `transcription_session.update` handshake message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub input_audio_format: AudioFormat,
    pub input_audio_noise_reduction: NoiseReductionSetting,
    pub input_audio_transcription: TranscriptionParams,
    pub turn_detection: TurnDetectionSetting,
}

/// Outbound protocol message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Session configuration handshake; sent exactly once, before any audio.
    #[serde(rename = "transcription_session.update")]
    SessionUpdate { session: SessionUpdate },

    /// One base64-encoded chunk of raw PCM bytes.
    #[serde(rename = "input_audio_buffer.append")]
    AudioAppend { audio: String },
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize outbound message")
    }
}

/// Inbound protocol event, identified by its `type` tag.
///
/// Tags outside the consumed set are preserved as `Other` with the raw payload
/// so the dispatcher can log them; they are never a parse failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `transcription_session.created`
    SessionCreated,
    /// `transcription_session.updated` — the configuration acknowledgement
    SessionUpdated,
    /// `conversation.item.created`
    ItemCreated,
    /// `input_audio_buffer.speech_started`
    SpeechStarted,
    /// `input_audio_buffer.speech_stopped`
    SpeechStopped,
    /// `input_audio_buffer.committed`
    Committed,
    /// `conversation.item.input_audio_transcription.delta`
    TranscriptDelta { delta: String },
    /// `conversation.item.input_audio_transcription.completed`
    TranscriptCompleted { transcript: String, raw: Value },
    /// Anything else
    Other { event_type: String, raw: Value },
}

/// Parse one inbound text frame.
///
/// Fails only on invalid JSON or a missing/non-string `type` field.
pub fn parse_server_event(text: &str) -> Result<ServerEvent> {
    let raw: Value = serde_json::from_str(text).context("Invalid JSON in inbound frame")?;
    let tag = raw
        .get("type")
        .and_then(Value::as_str)
        .context("Inbound frame has no \"type\" field")?
        .to_string();

    let event = match tag.as_str() {
        "transcription_session.created" => ServerEvent::SessionCreated,
        "transcription_session.updated" => ServerEvent::SessionUpdated,
        "conversation.item.created" => ServerEvent::ItemCreated,
        "input_audio_buffer.speech_started" => ServerEvent::SpeechStarted,
        "input_audio_buffer.speech_stopped" => ServerEvent::SpeechStopped,
        "input_audio_buffer.committed" => ServerEvent::Committed,
        "conversation.item.input_audio_transcription.delta" => ServerEvent::TranscriptDelta {
            delta: raw
                .get("delta")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        "conversation.item.input_audio_transcription.completed" => {
            ServerEvent::TranscriptCompleted {
                transcript: raw
                    .get("transcript")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                raw,
            }
        }
        other => ServerEvent::Other {
            event_type: other.to_string(),
            raw,
        },
    };

    Ok(event)
}
