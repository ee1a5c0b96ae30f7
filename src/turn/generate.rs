//! Generation stage
//!
//! Produces the spoken reply in the plant's voice. The model is asked for a
//! small JSON object; malformed output degrades to using the raw completion
//! as the reply, and a model outage degrades to a fixed apology. Either
//! way the stage returns a well-formed reply.

use serde::Deserialize;

use crate::llm::{strip_code_fences, LanguageModel};
use crate::turn::{Mood, Priority, TurnState};

/// Reply used when the generator collaborator fails outright
pub const FALLBACK_REPLY: &str =
    "Oh dear, my thoughts wilted for a moment. Could you ask me that again?";

const GENERATE_SYSTEM_PROMPT: &str = "\
You are a sentient potted plant. Be warm, direct, and concise: at most two
short sentences. If asked about health, use the sensor analysis directly.
If asked about yourself or botany, use the knowledge provided. No emojis.

Output a valid JSON object with exactly these keys:
- reply_text: your spoken response
- mood: one of [happy, thirsty, neutral, concerned, sunny]
- priority: one of [low, medium, high]";

/// Outcome of the generation stage
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub reply_text: String,
    pub mood: Mood,
    pub priority: Priority,
    /// True when the collaborator failed and the apology fallback was used
    pub degraded: bool,
}

#[derive(Deserialize)]
struct ReplyJson {
    reply_text: String,
    #[serde(default)]
    mood: String,
    #[serde(default)]
    priority: String,
}

/// Generate the reply for a turn
///
/// Always returns a usable reply; failure semantics are documented on
/// [`FALLBACK_REPLY`].
pub async fn generate(model: &dyn LanguageModel, state: &TurnState) -> GeneratedReply {
    let sensor_info = state.sensor_analysis.clone().unwrap_or_else(|| {
        // Fast path skipped the analyst: hand the generator raw numbers
        state.sensors.describe()
    });
    let knowledge = state
        .knowledge
        .as_deref()
        .unwrap_or("No expert data provided. Use general knowledge about this species.");

    let user = format!(
        "Species: {}\nSensor analysis: {}\nKnowledge: {}\nUser says: {}",
        state.species,
        sensor_info,
        knowledge,
        state.query.as_deref().unwrap_or("Hello")
    );

    let content = match model.complete(GENERATE_SYSTEM_PROMPT, &user).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(error = %e, "generation failed, using apology fallback");
            return GeneratedReply {
                reply_text: FALLBACK_REPLY.to_string(),
                mood: Mood::Neutral,
                priority: Priority::Low,
                degraded: true,
            };
        }
    };

    match serde_json::from_str::<ReplyJson>(strip_code_fences(&content)) {
        Ok(parsed) if !parsed.reply_text.trim().is_empty() => GeneratedReply {
            reply_text: parsed.reply_text.trim().to_string(),
            mood: Mood::parse_or_neutral(&parsed.mood),
            priority: Priority::parse_or_low(&parsed.priority),
            degraded: false,
        },
        _ => {
            // The model ignored the JSON contract; its prose is still the reply
            tracing::debug!("generator returned non-JSON output, using raw text");
            GeneratedReply {
                reply_text: content.trim().to_string(),
                mood: Mood::Neutral,
                priority: Priority::Low,
                degraded: false,
            }
        }
    }
}
