//! Knowledge-lookup stage
//!
//! Produces species-specific context for the generator: a couple of
//! sentences of botanical grounding, seeded with the species profile from
//! the device registry when one exists.

use crate::llm::LanguageModel;
use crate::turn::TurnState;

/// Fallback context when the lookup collaborator fails
pub const FALLBACK_KNOWLEDGE: &str =
    "No expert data available. Use general knowledge about this species.";

const LOOKUP_SYSTEM_PROMPT: &str = "\
You are a botanical expert providing context for a talking plant pot.
Given the species, the health analysis, and the user's query, provide one
or two sentences of species-specific grounding: biology, care facts, or
lore relevant to the query. Mention scientific terms only if essential.
Maximum 30 words. No emojis.";

/// Look up species knowledge for the turn
///
/// `profile` is the stored species profile from the registry, if any.
/// Never fails: a lookup outage yields [`FALLBACK_KNOWLEDGE`] and the
/// pipeline continues.
pub async fn lookup(
    model: &dyn LanguageModel,
    state: &TurnState,
    profile: Option<&str>,
) -> String {
    let mut user = format!("Species: {}\n", state.species);
    if let Some(profile) = profile {
        user.push_str(&format!("Stored profile: {profile}\n"));
    }
    user.push_str(&format!(
        "Health analysis: {}\n",
        state
            .sensor_analysis
            .as_deref()
            .unwrap_or("not requested for this turn")
    ));
    user.push_str(&format!(
        "User query: {}",
        state.query.as_deref().unwrap_or("no specific query")
    ));

    match model.complete(LOOKUP_SYSTEM_PROMPT, &user).await {
        Ok(knowledge) => knowledge.trim().to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "knowledge lookup failed, using fallback");
            FALLBACK_KNOWLEDGE.to_string()
        }
    }
}
