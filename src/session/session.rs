use std::time::Instant;

use anyhow::{bail, Context, Result};
use base64::Engine;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::state::SessionState;
use super::timing::{SessionStats, TimingMarks};
use crate::audio::AudioSource;
use crate::realtime::{parse_server_event, ClientEvent, ServerEvent, Transport};

/// A live transcription session over one persistent connection.
///
/// Owns the protocol state machine, the configuration handshake, outbound
/// audio pacing, inbound event dispatch, and the derived timing metrics. Two
/// activities interleave on one task: a fixed-interval poll that forwards
/// audio chunks while the state allows it, and inbound events that drive the
/// state machine. Neither blocks the other; the loop ends when the state
/// machine reaches `Done`.
pub struct TranscriptionSession {
    config: SessionConfig,
    state: SessionState,
    marks: TimingMarks,
    stats: SessionStats,
    transport: Box<dyn Transport>,
    audio: Box<dyn AudioSource>,
    closed: bool,
}

impl TranscriptionSession {
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn Transport>,
        audio: Box<dyn AudioSource>,
    ) -> Self {
        Self {
            config,
            state: SessionState::Initializing,
            marks: TimingMarks::default(),
            stats: SessionStats::new(),
            transport,
            audio,
            closed: false,
        }
    }

    /// Current state of the session state machine.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Run the session to completion.
    ///
    /// Sends the handshake, then interleaves the pacing loop with inbound
    /// dispatch until the state machine reaches `Done`, and shuts down. A
    /// transport closure before completion is a fatal anomaly.
    pub async fn run(&mut self) -> Result<SessionStats> {
        self.send_handshake().await?;

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.state.is_terminal() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_audio().await?;
                }
                frame = self.transport.recv() => match frame {
                    Some(Ok(text)) => self.dispatch_frame(&text),
                    Some(Err(e)) => {
                        self.shutdown().await?;
                        return Err(e);
                    }
                    None => {
                        self.shutdown().await?;
                        bail!("Connection closed before the transcript completed");
                    }
                },
            }
        }

        self.shutdown().await?;
        Ok(self.stats.clone())
    }

    /// Send the one-time configuration handshake.
    ///
    /// No audio may be sent until this configuration is acknowledged; the
    /// gate is the state machine, not the connection being open.
    async fn send_handshake(&mut self) -> Result<()> {
        let handshake = ClientEvent::SessionUpdate {
            session: self.config.to_session_update(),
        };
        self.transport
            .send(handshake.to_json()?)
            .await
            .context("Failed to send the session configuration")?;

        self.state = self.state.after_handshake();
        debug!("Session configuration sent, awaiting acknowledgement");
        Ok(())
    }

    /// One outbound pacing tick.
    ///
    /// Forwards a full chunk when the state allows audio and enough bytes are
    /// buffered; an under-filled capture buffer is a normal, silent skip.
    pub async fn poll_audio(&mut self) -> Result<()> {
        if !self.state.accepts_audio() {
            return Ok(());
        }

        let Some(chunk) = self.audio.read(self.config.chunk_bytes) else {
            return Ok(());
        };

        let message = ClientEvent::AudioAppend {
            audio: base64::engine::general_purpose::STANDARD.encode(&chunk),
        };
        self.transport
            .send(message.to_json()?)
            .await
            .context("Failed to send audio chunk")?;

        self.stats.chunks_sent += 1;
        debug!("Sent audio chunk ({} bytes)", chunk.len());
        Ok(())
    }

    fn dispatch_frame(&mut self, text: &str) {
        match parse_server_event(text) {
            Ok(event) => self.handle_event(event),
            Err(e) => warn!("Dropping unparseable inbound frame: {e:#}"),
        }
    }

    /// Dispatch one inbound event at the current time.
    pub fn handle_event(&mut self, event: ServerEvent) {
        self.handle_event_at(event, Instant::now());
    }

    /// Dispatch one inbound event with an explicit clock reading.
    ///
    /// Side effects follow the transition table; the state change itself is
    /// delegated to `SessionState::on_event` so all mutation goes through one
    /// transition function.
    pub fn handle_event_at(&mut self, event: ServerEvent, now: Instant) {
        match &event {
            ServerEvent::SessionCreated | ServerEvent::ItemCreated => {}
            ServerEvent::SessionUpdated => {
                info!("Session configuration acknowledged");
            }
            ServerEvent::SpeechStarted => {
                self.marks.mark_speech_start(now);
            }
            ServerEvent::SpeechStopped => match self.marks.take_speech_duration(now) {
                Some(elapsed) => {
                    info!(
                        "User stopped speaking after {:.2} seconds",
                        elapsed.as_secs_f64()
                    );
                    self.stats.last_speech_duration = Some(elapsed);
                }
                None => warn!("Speech stopped without a preceding speech_started event"),
            },
            ServerEvent::Committed => {
                self.marks.mark_commit(now);
            }
            ServerEvent::TranscriptDelta { delta } => {
                info!("delta: {delta}");
                self.stats.partial_count += 1;
            }
            ServerEvent::TranscriptCompleted { transcript, raw } => {
                match self.marks.transcription_duration(now) {
                    Some(elapsed) => {
                        info!("Transcription took {:.2} seconds", elapsed.as_secs_f64());
                        self.stats.last_transcription_duration = Some(elapsed);
                    }
                    None => warn!("Transcript completed without a preceding committed event"),
                }
                info!("Transcript: {transcript}");
                debug!("Completion payload: {raw}");
                self.stats.final_transcript = Some(transcript.clone());
            }
            ServerEvent::Other { event_type, raw } => {
                warn!("Unhandled event {event_type}: {raw}");
            }
        }

        self.state = self.state.on_event(&event);
    }

    /// Release the audio source and close the connection.
    ///
    /// Single-pass and idempotent; repeated calls change nothing.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.audio.close() {
            warn!("Failed to release the audio source: {e:#}");
        }
        self.transport
            .close()
            .await
            .context("Failed to close the connection")?;

        info!("Session shut down");
        Ok(())
    }
}
