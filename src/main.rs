use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sprout_gateway::voice::{SpeechRecognizer, SpeechSynthesizer, SpeechToText, TextToSpeech};
use sprout_gateway::{api, db, ChatModel, Config, DeviceRepo, Error, LanguageModel};

/// Sprout - conversational voice backend for smart plant pots
#[derive(Parser)]
#[command(name = "sprout", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "SPROUT_PORT", default_value = "8000")]
    port: u16,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the bundled species profiles into the database
    SeedSpecies,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,sprout_gateway=info",
        1 => "info,sprout_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    if let Some(Command::SeedSpecies) = cli.command {
        return seed_species(&config);
    }

    tracing::info!(port = cli.port, db = %config.database.display(), "starting sprout gateway");

    let pool = db::init(&config.database)?;
    let model = build_model(&config)?;
    let synthesizer = build_synthesizer(&config)?;
    let recognizer = build_recognizer(&config);
    if recognizer.is_none() {
        tracing::warn!("no STT provider configured, audio queries will ask for a repeat");
    }

    let state = api::ApiState::new(pool, model, recognizer, synthesizer, config.pacing);

    tracing::info!("sprout gateway ready");
    api::serve(state, cli.port).await?;

    Ok(())
}

fn seed_species(config: &Config) -> anyhow::Result<()> {
    let pool = db::init(&config.database)?;
    let inserted = DeviceRepo::new(pool).seed_species()?;
    println!("Seeded {inserted} species profile(s).");
    Ok(())
}

fn build_model(config: &Config) -> Result<Arc<dyn LanguageModel>, Error> {
    let api_key = config
        .api_keys
        .openai
        .clone()
        .ok_or_else(|| Error::Config("OPENAI_API_KEY required for the chat model".to_string()))?;
    let model = ChatModel::new(
        config.llm.base_url.clone(),
        api_key,
        config.llm.model.clone(),
    )?;
    Ok(Arc::new(model))
}

fn build_synthesizer(config: &Config) -> Result<Arc<dyn SpeechSynthesizer>, Error> {
    if let Some(key) = config.api_keys.elevenlabs.clone() {
        let tts = TextToSpeech::elevenlabs(
            key,
            "eleven_monolingual_v1".to_string(),
            config.voice.tts_voice.clone(),
        )?;
        return Ok(Arc::new(tts));
    }

    let key = config.api_keys.openai.clone().ok_or_else(|| {
        Error::Config("OPENAI_API_KEY or ELEVENLABS_API_KEY required for TTS".to_string())
    })?;
    let tts = TextToSpeech::openai(
        key,
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    )?;
    Ok(Arc::new(tts))
}

fn build_recognizer(config: &Config) -> Option<Arc<dyn SpeechRecognizer>> {
    if let Some(key) = config.api_keys.deepgram.clone() {
        if let Ok(stt) = SpeechToText::deepgram(key, config.voice.stt_model.clone()) {
            return Some(Arc::new(stt));
        }
    }

    let key = config.api_keys.openai.clone()?;
    SpeechToText::whisper(key, config.voice.stt_model.clone())
        .ok()
        .map(|stt| Arc::new(stt) as Arc<dyn SpeechRecognizer>)
}
