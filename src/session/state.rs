use serde::{Deserialize, Serialize};

use crate::realtime::ServerEvent;

/// Session lifecycle state.
///
/// Progression is strictly forward: `Initializing → AwaitingConfigAck →
/// ReadyForAudio → Done`. `Done` is terminal; no event moves a session back to
/// an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Connection established, handshake not yet sent
    Initializing,
    /// Handshake sent, waiting for the configuration acknowledgement
    AwaitingConfigAck,
    /// Configuration acknowledged; audio may flow
    ReadyForAudio,
    /// Final transcript received; session is over
    Done,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Done
    }

    /// Whether outbound audio framing is allowed in this state.
    pub fn accepts_audio(self) -> bool {
        self == SessionState::ReadyForAudio
    }

    /// Transition taken after the handshake message has been sent.
    pub fn after_handshake(self) -> SessionState {
        match self {
            SessionState::Initializing => SessionState::AwaitingConfigAck,
            other => other,
        }
    }

    /// The single transition function for inbound events.
    ///
    /// All state mutation funnels through here so the transition table lives
    /// in one place. Events received after `Done` change nothing.
    pub fn on_event(self, event: &ServerEvent) -> SessionState {
        if self.is_terminal() {
            return self;
        }

        match event {
            ServerEvent::SessionUpdated => match self {
                SessionState::Initializing | SessionState::AwaitingConfigAck => {
                    SessionState::ReadyForAudio
                }
                other => other,
            },
            // Partial transcripts re-open the audio gate so streaming is never
            // blocked by transcription of a previous utterance. They never
            // open it early: before the config ack the state is unchanged.
            ServerEvent::TranscriptDelta { .. } => match self {
                SessionState::ReadyForAudio => SessionState::ReadyForAudio,
                other => other,
            },
            ServerEvent::TranscriptCompleted { .. } => SessionState::Done,
            _ => self,
        }
    }
}
