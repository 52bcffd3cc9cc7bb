use anyhow::Result;
use clap::{Parser, ValueEnum};
use mic_scribe::{
    Config, NoiseReduction, ParecSource, TranscriptionSession, TurnDetection, WsTransport,
};
use tracing::info;

/// Stream live microphone audio to the OpenAI realtime transcription API.
#[derive(Debug, Parser)]
#[command(name = "mic-scribe", version)]
struct Cli {
    /// Path to a config file (TOML); environment variables override it
    #[arg(long)]
    config: Option<String>,

    /// Transcription language code
    #[arg(long)]
    language: Option<String>,

    /// Transcription model identifier
    #[arg(long)]
    model: Option<String>,

    /// Domain prompt to bias the transcription vocabulary
    #[arg(long)]
    prompt: Option<String>,

    /// Server-side noise reduction profile
    #[arg(long, value_enum)]
    noise_reduction: Option<NoiseReductionArg>,

    /// Server-side turn detection mode
    #[arg(long, value_enum)]
    turn_detection: Option<TurnDetectionArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NoiseReductionArg {
    FarField,
    NearField,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TurnDetectionArg {
    SemanticVad,
    ServerVad,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(language) = cli.language {
        cfg.session.language = language;
    }
    if let Some(model) = cli.model {
        cfg.session.model = model;
    }
    if let Some(prompt) = cli.prompt {
        cfg.session.prompt = prompt;
    }
    if let Some(mode) = cli.noise_reduction {
        cfg.session.noise_reduction = match mode {
            NoiseReductionArg::FarField => NoiseReduction::FarField,
            NoiseReductionArg::NearField => NoiseReduction::NearField,
        };
    }
    if let Some(mode) = cli.turn_detection {
        cfg.session.turn_detection = match mode {
            TurnDetectionArg::SemanticVad => TurnDetection::SemanticVad,
            TurnDetectionArg::ServerVad => TurnDetection::ServerVad,
        };
    }

    info!(
        "Transcribing with model {} (language {})",
        cfg.session.model, cfg.session.language
    );

    let transport = WsTransport::connect(&cfg.realtime_url, &cfg.api_key).await?;
    let audio = ParecSource::spawn(&cfg.capture)?;

    let mut session =
        TranscriptionSession::new(cfg.session, Box::new(transport), Box::new(audio));
    let stats = session.run().await?;

    info!(
        "Session finished: {} chunk(s) sent, {} partial(s)",
        stats.chunks_sent, stats.partial_count
    );
    if let Some(transcript) = stats.final_transcript {
        println!("{transcript}");
    }

    Ok(())
}
