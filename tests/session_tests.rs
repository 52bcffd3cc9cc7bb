// Tests for the session state machine: handshake gating, dispatch side
// effects, timing metrics, pacing, and shutdown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use mic_scribe::audio::{AudioSource, ByteQueue};
use mic_scribe::realtime::{ServerEvent, Transport};
use mic_scribe::{SessionConfig, SessionState, TranscriptionSession};

/// Transport fake: hands out a scripted list of inbound frames (with a small
/// delay each, so pacing ticks can interleave) and records everything sent.
struct ScriptedTransport {
    incoming: VecDeque<String>,
    sent: Arc<Mutex<Vec<String>>>,
    recv_delay: Duration,
    // Deadline for the next frame; kept across cancelled polls so the pacing
    // loop cannot starve delivery.
    next_frame_at: Option<tokio::time::Instant>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn new(incoming: &[&str]) -> (Self, Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            incoming: incoming.iter().map(|s| s.to_string()).collect(),
            sent: Arc::clone(&sent),
            recv_delay: Duration::from_millis(10),
            next_frame_at: None,
            closes: Arc::clone(&closes),
        };
        (transport, sent, closes)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        let deadline = *self
            .next_frame_at
            .get_or_insert_with(|| tokio::time::Instant::now() + self.recv_delay);
        tokio::time::sleep_until(deadline).await;
        self.next_frame_at = None;
        self.incoming.pop_front().map(Ok)
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Audio fake backed by the real `ByteQueue`.
struct ScriptedAudio {
    queue: ByteQueue,
    closes: Arc<AtomicUsize>,
}

impl ScriptedAudio {
    fn with_bytes(data: &[u8]) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut queue = ByteQueue::new();
        queue.push(data);
        (
            Self {
                queue,
                closes: Arc::clone(&closes),
            },
            closes,
        )
    }

    fn empty() -> (Self, Arc<AtomicUsize>) {
        Self::with_bytes(&[])
    }
}

impl AudioSource for ScriptedAudio {
    fn read(&mut self, max_bytes: usize) -> Option<Vec<u8>> {
        self.queue.take(max_bytes)
    }

    fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval_ms: 5,
        ..SessionConfig::default()
    }
}

fn appends(sent: &[String]) -> Vec<String> {
    sent.iter()
        .filter(|m| m.contains("input_audio_buffer.append"))
        .cloned()
        .collect()
}

// Scenario A: a full turn ends in Done with both timing metrics and the final
// transcript captured.
#[tokio::test]
async fn test_full_turn_reaches_done_with_metrics() {
    let (transport, sent, _) = ScriptedTransport::new(&[
        r#"{"type":"transcription_session.created"}"#,
        r#"{"type":"transcription_session.updated"}"#,
        r#"{"type":"input_audio_buffer.speech_started"}"#,
        r#"{"type":"input_audio_buffer.speech_stopped"}"#,
        r#"{"type":"input_audio_buffer.committed"}"#,
        r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":"hello world"}"#,
    ]);
    let (audio, _) = ScriptedAudio::with_bytes(&[0u8; 64 * 1024]);

    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));
    let stats = session.run().await.unwrap();

    assert_eq!(session.state(), SessionState::Done);
    assert!(stats.last_speech_duration.is_some());
    assert!(stats.last_transcription_duration.is_some());
    assert_eq!(stats.final_transcript.as_deref(), Some("hello world"));

    let sent = sent.lock().unwrap();
    assert!(sent[0].contains("transcription_session.update"));
}

// Scenario B: partial deltas keep the session in ReadyForAudio; no completion.
#[tokio::test]
async fn test_partial_deltas_keep_audio_flowing() {
    let (transport, _, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    session.handle_event(ServerEvent::SessionUpdated);
    assert_eq!(session.state(), SessionState::ReadyForAudio);

    session.handle_event(ServerEvent::TranscriptDelta {
        delta: "hel".to_string(),
    });
    assert_eq!(session.state(), SessionState::ReadyForAudio);

    session.handle_event(ServerEvent::TranscriptDelta {
        delta: "hello".to_string(),
    });
    assert_eq!(session.state(), SessionState::ReadyForAudio);

    assert_eq!(session.stats().partial_count, 2);
    assert!(session.stats().final_transcript.is_none());
}

// Scenario C: an under-filled capture buffer is a silent skip, tick after tick.
#[tokio::test]
async fn test_empty_audio_source_sends_nothing() {
    let (transport, sent, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    session.handle_event(ServerEvent::SessionUpdated);
    for _ in 0..3 {
        session.poll_audio().await.unwrap();
    }

    assert!(appends(&sent.lock().unwrap()).is_empty());
}

// Scenario D: speech_stopped with no prior speech_started is a warning, not a
// failure, and computes no duration.
#[tokio::test]
async fn test_speech_stop_without_start_omits_duration() {
    let (transport, _, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    session.handle_event(ServerEvent::SessionUpdated);
    session.handle_event(ServerEvent::SpeechStopped);

    assert!(session.stats().last_speech_duration.is_none());
    assert_eq!(session.state(), SessionState::ReadyForAudio);
}

// P1: no audio is framed before the configuration acknowledgement, no matter
// how many pacing ticks fire or what other events arrive.
#[tokio::test]
async fn test_no_audio_before_config_ack() {
    let (transport, sent, _) = ScriptedTransport::new(&[
        r#"{"type":"transcription_session.created"}"#,
        r#"{"type":"conversation.item.created"}"#,
    ]);
    let (audio, _) = ScriptedAudio::with_bytes(&[0u8; 64 * 1024]);

    let config = SessionConfig {
        poll_interval_ms: 1,
        ..SessionConfig::default()
    };
    let mut session = TranscriptionSession::new(config, Box::new(transport), Box::new(audio));

    // The scripted transport runs out of frames, which reads as a transport
    // closure before completion: fatal by design.
    let err = session.run().await.unwrap_err();
    assert!(err.to_string().contains("closed"));

    let sent = sent.lock().unwrap();
    assert!(appends(&sent).is_empty());
    assert_eq!(sent.len(), 1, "only the handshake should have been sent");
}

#[tokio::test]
async fn test_poll_audio_is_gated_on_state() {
    let (transport, sent, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::with_bytes(&[0u8; 64 * 1024]);
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    // Initializing: gate closed even though audio is buffered.
    session.poll_audio().await.unwrap();
    assert!(sent.lock().unwrap().is_empty());

    session.handle_event(ServerEvent::SessionUpdated);
    session.poll_audio().await.unwrap();
    assert_eq!(appends(&sent.lock().unwrap()).len(), 1);
}

// P2: state only moves forward through the table; terminal Done absorbs
// everything.
#[tokio::test]
async fn test_state_progression_is_monotonic() {
    let (transport, _, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    assert_eq!(session.state(), SessionState::Initializing);

    // Non-ack events do not advance the handshake.
    session.handle_event(ServerEvent::SessionCreated);
    session.handle_event(ServerEvent::ItemCreated);
    session.handle_event(ServerEvent::SpeechStarted);
    assert_eq!(session.state(), SessionState::Initializing);

    session.handle_event(ServerEvent::SessionUpdated);
    assert_eq!(session.state(), SessionState::ReadyForAudio);

    // A duplicate ack is harmless.
    session.handle_event(ServerEvent::SessionUpdated);
    assert_eq!(session.state(), SessionState::ReadyForAudio);

    session.handle_event(ServerEvent::TranscriptCompleted {
        transcript: "done".to_string(),
        raw: serde_json::json!({}),
    });
    assert_eq!(session.state(), SessionState::Done);

    // Done is terminal and irreversible.
    session.handle_event(ServerEvent::SessionUpdated);
    session.handle_event(ServerEvent::TranscriptDelta {
        delta: "late".to_string(),
    });
    assert_eq!(session.state(), SessionState::Done);
}

// P3: every append carries exactly the bytes the source returned, frame
// aligned, untruncated and unpadded.
#[tokio::test]
async fn test_chunk_integrity() {
    let pattern: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let (transport, sent, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::with_bytes(&pattern);
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    session.handle_event(ServerEvent::SessionUpdated);
    for _ in 0..3 {
        session.poll_audio().await.unwrap();
    }

    let sent = sent.lock().unwrap();
    let appends = appends(&sent);
    // 10_000 bytes buffered: two full 4096-byte chunks, then an under-run.
    assert_eq!(appends.len(), 2);

    for (i, message) in appends.iter().enumerate() {
        let value: serde_json::Value = serde_json::from_str(message).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value["audio"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded.len(), 4096);
        assert_eq!(decoded.len() % 2, 0);
        assert_eq!(decoded, &pattern[i * 4096..(i + 1) * 4096]);
    }

    assert_eq!(session.stats().chunks_sent, 2);
}

// P4: timing metrics are derived from event ordering with an explicit clock.
#[tokio::test]
async fn test_timing_metrics_from_event_ordering() {
    let (transport, _, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    let t0 = Instant::now();
    session.handle_event_at(ServerEvent::SessionUpdated, t0);
    session.handle_event_at(ServerEvent::SpeechStarted, t0);
    session.handle_event_at(ServerEvent::SpeechStopped, t0 + Duration::from_millis(2500));
    assert_eq!(
        session.stats().last_speech_duration,
        Some(Duration::from_millis(2500))
    );

    session.handle_event_at(ServerEvent::Committed, t0 + Duration::from_millis(3000));
    session.handle_event_at(
        ServerEvent::TranscriptCompleted {
            transcript: "hi".to_string(),
            raw: serde_json::json!({}),
        },
        t0 + Duration::from_millis(4200),
    );
    assert_eq!(
        session.stats().last_transcription_duration,
        Some(Duration::from_millis(1200))
    );
}

#[tokio::test]
async fn test_completion_without_commit_omits_latency() {
    let (transport, _, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    session.handle_event(ServerEvent::SessionUpdated);
    session.handle_event(ServerEvent::TranscriptCompleted {
        transcript: "hi".to_string(),
        raw: serde_json::json!({}),
    });

    assert!(session.stats().last_transcription_duration.is_none());
    assert_eq!(session.stats().final_transcript.as_deref(), Some("hi"));
    assert_eq!(session.state(), SessionState::Done);
}

// P5: shutdown after Done is single-pass; repeating it has no further effect.
#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (transport, _, transport_closes) = ScriptedTransport::new(&[
        r#"{"type":"transcription_session.updated"}"#,
        r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":"hi"}"#,
    ]);
    let (audio, audio_closes) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    session.run().await.unwrap();
    session.shutdown().await.unwrap();
    session.shutdown().await.unwrap();

    assert_eq!(audio_closes.load(Ordering::SeqCst), 1);
    assert_eq!(transport_closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_event_changes_nothing() {
    let (transport, _, _) = ScriptedTransport::new(&[]);
    let (audio, _) = ScriptedAudio::empty();
    let mut session =
        TranscriptionSession::new(fast_config(), Box::new(transport), Box::new(audio));

    session.handle_event(ServerEvent::SessionUpdated);
    session.handle_event(ServerEvent::Other {
        event_type: "rate_limits.updated".to_string(),
        raw: serde_json::json!({"type": "rate_limits.updated"}),
    });

    assert_eq!(session.state(), SessionState::ReadyForAudio);
    assert_eq!(session.stats().partial_count, 0);
}
