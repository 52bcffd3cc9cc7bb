use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::CaptureFormat;
use crate::session::SessionConfig;

/// Environment variable holding the OpenAI API credential.
///
/// Required; startup aborts before any connection attempt when it is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Realtime transcription endpoint
    pub realtime_url: String,

    /// Microphone capture format (must match what the endpoint expects)
    pub capture: CaptureFormat,

    /// Transcription session parameters and pacing
    pub session: SessionConfig,

    /// API credential; filled from the environment, never from config files
    #[serde(skip)]
    pub api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            realtime_url: "wss://api.openai.com/v1/realtime?intent=transcription".to_string(),
            capture: CaptureFormat::default(),
            session: SessionConfig::default(),
            api_key: String::new(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then an optional config file, then
    /// `MIC_SCRIBE__`-prefixed environment overrides. The API key is read
    /// separately from `OPENAI_API_KEY` and is required.
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MIC_SCRIBE")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: Config = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        cfg.api_key = std::env::var(API_KEY_ENV)
            .with_context(|| format!("environment variable {API_KEY_ENV} is required"))?;

        cfg.session.validate(&cfg.capture)?;

        Ok(cfg)
    }
}
