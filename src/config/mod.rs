//! Configuration management for the sprout gateway
//!
//! Precedence is env > TOML file > default throughout.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::audio::PacingConfig;
use crate::Result;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Database file path
    pub database: PathBuf,

    /// Path to data directory
    pub data_dir: PathBuf,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Stream pacing configuration
    pub pacing: PacingConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f64,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat model identifier
    pub model: String,

    /// OpenAI-compatible base URL
    pub base_url: String,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat, Whisper, and TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,
}

impl Config {
    /// Load configuration from env, config file, and defaults
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();

        let data_dir = std::env::var("SPROUT_DATA_DIR").map_or_else(
            |_| {
                directories::BaseDirs::new()
                    .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("sprout"))
            },
            PathBuf::from,
        );
        std::fs::create_dir_all(&data_dir)?;

        let database = std::env::var("SPROUT_DB")
            .ok()
            .or(fc.server.database)
            .map_or_else(|| data_dir.join("sprout.db"), PathBuf::from);

        let port = std::env::var("SPROUT_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(8000);

        let voice = VoiceConfig {
            stt_model: std::env::var("SPROUT_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: std::env::var("SPROUT_TTS_MODEL")
                .ok()
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: std::env::var("SPROUT_TTS_VOICE")
                .ok()
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "nova".to_string()),
            tts_speed: std::env::var("SPROUT_TTS_SPEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.voice.tts_speed)
                .unwrap_or(crate::voice::TextToSpeech::DEFAULT_SPEED),
        };

        let llm = LlmConfig {
            model: std::env::var("SPROUT_LLM_MODEL")
                .ok()
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: std::env::var("SPROUT_LLM_BASE_URL")
                .ok()
                .or(fc.llm.base_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        };

        let defaults = PacingConfig::default();
        let pacing = PacingConfig {
            chunk_bytes: fc.audio.chunk_bytes.unwrap_or(defaults.chunk_bytes),
            chunk_delay: fc
                .audio
                .chunk_delay_ms
                .map_or(defaults.chunk_delay, Duration::from_millis),
            sentence_gap: fc
                .audio
                .sentence_gap_ms
                .map_or(defaults.sentence_gap, Duration::from_millis),
        };

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
        };

        Ok(Self {
            port,
            database,
            data_dir,
            voice,
            llm,
            pacing,
            api_keys,
        })
    }
}
