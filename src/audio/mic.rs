use std::process::Stdio;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AudioSource, ByteQueue, CaptureFormat};

/// Live microphone source backed by a `parec` subprocess.
///
/// A background task pumps the subprocess stdout into a shared byte queue so
/// that `read` can stay non-blocking for the session's pacing loop.
pub struct ParecSource {
    child: Option<Child>,
    pump: Option<JoinHandle<()>>,
    buffer: Arc<Mutex<ByteQueue>>,
}

impl ParecSource {
    /// Spawn the capture subprocess and start pumping its output.
    pub fn spawn(format: &CaptureFormat) -> Result<Self> {
        let mut child = Command::new("parec")
            .args(format.parec_args())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn parec (is PulseAudio/PipeWire running?)")?;

        let stdout = child
            .stdout
            .take()
            .context("parec spawned without a stdout pipe")?;

        info!(
            "Capturing microphone audio at {} Hz, {} channel(s)",
            format.sample_rate, format.channels
        );

        let buffer = Arc::new(Mutex::new(ByteQueue::new()));
        let pump_buffer = Arc::clone(&buffer);

        let pump = tokio::spawn(async move {
            let mut stdout = stdout;
            let mut chunk = [0u8; 4096];

            loop {
                match stdout.read(&mut chunk).await {
                    Ok(0) => {
                        warn!("parec closed its output stream");
                        break;
                    }
                    Ok(n) => {
                        let mut queue = pump_buffer.lock().unwrap_or_else(|e| e.into_inner());
                        queue.push(&chunk[..n]);
                    }
                    Err(e) => {
                        warn!("Failed to read from parec: {}", e);
                        break;
                    }
                }
            }

            debug!("Capture pump task stopped");
        });

        Ok(Self {
            child: Some(child),
            pump: Some(pump),
            buffer,
        })
    }
}

impl AudioSource for ParecSource {
    fn read(&mut self, max_bytes: usize) -> Option<Vec<u8>> {
        let mut queue = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        queue.take(max_bytes)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        if let Some(mut child) = self.child.take() {
            child
                .start_kill()
                .context("Failed to stop the parec subprocess")?;
            info!("Capture subprocess released");
        }

        Ok(())
    }
}

impl Drop for ParecSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
