//! Wire protocol for the realtime transcription endpoint
//!
//! Outbound messages are JSON text frames built with serde; inbound frames are
//! parsed into `ServerEvent` values, keeping unknown tags around for
//! diagnostics instead of rejecting them.

mod messages;
mod transport;

pub use messages::{
    parse_server_event, AudioFormat, ClientEvent, NoiseReduction, NoiseReductionSetting,
    ServerEvent, SessionUpdate, TranscriptionParams, TurnDetection, TurnDetectionSetting,
};
pub use transport::{Transport, WsTransport};
