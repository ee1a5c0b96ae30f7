//! Intent routing for user queries
//!
//! A thin validation and defaulting wrapper around the external classifier:
//! whatever the classifier does, the router always produces exactly one tag
//! from the closed [`Intent`] set.

use std::sync::Arc;

use crate::llm::LanguageModel;
use crate::turn::Intent;

const CLASSIFY_SYSTEM_PROMPT: &str = "\
You are the intent router for a talking plant pot.
Categorize the user's query into exactly one of these tags:

- IDENTITY: who/what the plant is, its name or personality
- HEALTH: the plant's well-being, needs, or current state
- KNOWLEDGE: botanical facts or care instructions unrelated to current state
- GREETING: a greeting
- JOKE: a joke request
- AMBIGUOUS: unclear or too short to categorize

Output ONLY the tag name in uppercase.";

/// Classifies queries into the fixed intent set
pub struct IntentRouter {
    model: Arc<dyn LanguageModel>,
}

impl IntentRouter {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Route a query to an intent tag
    ///
    /// An absent query is a heartbeat and defaults to [`Intent::Health`].
    /// Classifier failures and out-of-set output both map to
    /// [`Intent::Ambiguous`]; routing never errors.
    pub async fn route(&self, query: Option<&str>) -> Intent {
        let Some(query) = query.filter(|q| !q.trim().is_empty()) else {
            return Intent::Health;
        };

        match self.model.complete(CLASSIFY_SYSTEM_PROMPT, query).await {
            Ok(tag) => Intent::parse(&tag).unwrap_or_else(|| {
                tracing::debug!(tag = %tag.trim(), "classifier returned out-of-set tag");
                Intent::Ambiguous
            }),
            Err(e) => {
                tracing::warn!(error = %e, "classification failed, routing as ambiguous");
                Intent::Ambiguous
            }
        }
    }
}
