//! Transcription session management
//!
//! This module provides the `TranscriptionSession` abstraction that manages:
//! - The configuration handshake with the realtime endpoint
//! - Outbound audio pacing (fixed-interval polling of the capture source)
//! - Inbound event dispatch and the session state machine
//! - Derived timing metrics (speech duration, transcription latency)

mod config;
mod session;
mod state;
mod timing;

pub use config::SessionConfig;
pub use session::TranscriptionSession;
pub use state::SessionState;
pub use timing::{SessionStats, TimingMarks};
