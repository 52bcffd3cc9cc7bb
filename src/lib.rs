pub mod audio;
pub mod config;
pub mod realtime;
pub mod session;

pub use audio::{AudioSource, ByteQueue, CaptureFormat, ParecSource};
pub use config::Config;
pub use realtime::{
    ClientEvent, NoiseReduction, ServerEvent, Transport, TurnDetection, WsTransport,
};
pub use session::{SessionConfig, SessionState, SessionStats, TimingMarks, TranscriptionSession};
