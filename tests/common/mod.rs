//! Shared test utilities: in-memory DB and scripted collaborators

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sprout_gateway::api::ApiState;
use sprout_gateway::voice::{SpeechRecognizer, SpeechSynthesizer};
use sprout_gateway::{db, DbPool, Error, LanguageModel, PacingConfig, Result};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Language model that replays scripted completions in call order
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Llm("script exhausted".to_string())))
    }
}

/// Synthesizer that emits a tiny fake MP3 segment for any text
pub struct FakeSynthesizer;

/// One fake MP3 frame: valid sync marker plus recognizable payload
#[must_use]
pub fn fake_segment(fill: u8) -> Vec<u8> {
    let mut body = vec![0xFF, 0xFB, 0x90, 0x64];
    body.extend(std::iter::repeat_n(fill, 16));
    body
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        // Fill byte derived from the text so tests can spot segments
        let fill = text.bytes().fold(0u8, u8::wrapping_add);
        Ok(fake_segment(fill))
    }
}

/// Recognizer that returns a fixed transcript
pub struct FixedRecognizer(pub &'static str);

#[async_trait]
impl SpeechRecognizer for FixedRecognizer {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// The standard four-stage reply script for a HEALTH turn
#[must_use]
pub fn health_script(reply_json: &str) -> Vec<Result<String>> {
    vec![
        Ok("HEALTH".to_string()),
        Ok("Soil moisture is adequate.".to_string()),
        Ok("Basil prefers steady moisture.".to_string()),
        Ok(reply_json.to_string()),
    ]
}

/// Build API state around scripted collaborators
#[must_use]
pub fn scripted_state(
    db: DbPool,
    model: Arc<ScriptedModel>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
) -> Arc<ApiState> {
    ApiState::new(
        db,
        model,
        recognizer,
        Arc::new(FakeSynthesizer),
        PacingConfig::instant(64),
    )
}
