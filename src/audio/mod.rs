//! Microphone capture
//!
//! Capture is delegated to a `parec` subprocess producing a continuous stream
//! of signed 16-bit little-endian mono PCM on stdout. The session only ever
//! sees the `AudioSource` contract: a non-blocking read of a fixed-size chunk
//! and an idempotent close.

mod mic;

pub use mic::ParecSource;

use std::collections::VecDeque;

use anyhow::Result;
use serde::Deserialize;

/// PCM capture format requested from `parec`.
///
/// The realtime transcription endpoint expects 16-bit PCM at 24 kHz, single
/// channel, little-endian.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono)
    pub channels: u16,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
        }
    }
}

impl CaptureFormat {
    /// Size in bytes of one sample frame (all channels, 16-bit samples).
    pub fn frame_bytes(&self) -> usize {
        2 * self.channels as usize
    }

    /// Arguments for the `parec` capture subprocess.
    pub fn parec_args(&self) -> Vec<String> {
        vec![
            "--format=s16le".to_string(),
            format!("--rate={}", self.sample_rate),
            format!("--channels={}", self.channels),
        ]
    }
}

/// Byte-producing capture source.
///
/// `read` never blocks: it returns exactly `max_bytes` bytes when that much is
/// buffered, and `None` otherwise. `close` releases the underlying capture
/// process and may be called more than once.
pub trait AudioSource: Send {
    fn read(&mut self, max_bytes: usize) -> Option<Vec<u8>>;

    fn close(&mut self) -> Result<()>;
}

/// FIFO of captured PCM bytes shared between the capture task and the reader.
#[derive(Debug, Default)]
pub struct ByteQueue {
    bytes: VecDeque<u8>,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append captured bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend(data);
    }

    /// Take exactly `max_bytes` bytes, or nothing if fewer are buffered.
    ///
    /// Returning nothing is the normal under-run condition, not an error;
    /// the caller simply tries again on its next tick.
    pub fn take(&mut self, max_bytes: usize) -> Option<Vec<u8>> {
        if max_bytes == 0 || self.bytes.len() < max_bytes {
            return None;
        }
        Some(self.bytes.drain(..max_bytes).collect())
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
