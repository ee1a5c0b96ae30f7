//! Sprout Gateway - Conversational voice backend for smart plant pots
//!
//! This library turns periodic sensor telemetry and the occasional spoken
//! question into a short, personality-flavored spoken reply, streamed as one
//! continuous MP3 bitstream to a resource-constrained pot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Pot / Simulator                      │
//! │   POST /v1/ingest   GET /v1/stream   GET .../poll   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Sprout Gateway                       │
//! │   Router → Sensors → Knowledge → Generate → Final   │
//! │          │ stream channel │ audio assembler         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            External collaborators                    │
//! │   Chat LLM  │  STT (Whisper)  │  TTS (MP3)          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod stream;
pub mod turn;
pub mod voice;

pub use audio::{AudioStreamer, PacingConfig, StreamEnd};
pub use config::Config;
pub use db::{DbConn, DbPool, DeviceRepo, TurnRepo};
pub use error::{Error, Result};
pub use llm::{ChatModel, LanguageModel};
pub use stream::{StreamConsumer, StreamPublisher, StreamRegistry, TurnEvent};
pub use turn::{Intent, Mood, Pipeline, Priority, SensorSnapshot, TurnState};
pub use voice::{SpeechRecognizer, SpeechSynthesizer, SpeechToText, TextToSpeech};
