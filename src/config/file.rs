//! TOML configuration file loading
//!
//! Supports `~/.config/sprout/config.toml` (or `./sprout.toml` for dev) as a
//! persistent config source. All fields are optional — the file is a partial
//! overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SproutConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Stream pacing configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// Database file path override
    pub database: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// OpenAI-compatible base URL
    pub base_url: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,
}

/// Stream pacing configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Bytes per emitted chunk
    pub chunk_bytes: Option<usize>,

    /// Delay between chunks, in milliseconds
    pub chunk_delay_ms: Option<u64>,

    /// Extra pause between sentences, in milliseconds
    pub sentence_gap_ms: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Candidate config file paths, in precedence order
fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(p) = std::env::var("SPROUT_CONFIG") {
        paths.push(PathBuf::from(p));
    }

    if let Some(dirs) = directories::BaseDirs::new() {
        paths.push(dirs.config_dir().join("sprout").join("config.toml"));
    }

    paths.push(PathBuf::from("sprout.toml"));
    paths
}

/// Load the first readable config file, or defaults if none exists
#[must_use]
pub fn load_config_file() -> SproutConfigFile {
    for path in config_paths() {
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded config file");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to parse config file, using defaults"
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read config file"
                );
            }
        }
    }

    SproutConfigFile::default()
}
