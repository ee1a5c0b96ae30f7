//! The turn-processing state machine
//!
//! ```text
//! Start → (cond) SensorAnalysis → (cond) KnowledgeLookup → Generation
//!       → Finalization → End
//! ```
//!
//! Sensor analysis runs only for HEALTH turns; knowledge lookup runs for
//! every routed intent. All paths converge at generation, which receives
//! explicit placeholders for whatever was skipped. Finalization always runs
//! last. No stage failure aborts the turn: each stage degrades to its
//! documented static fallback and the turn always ends with well-formed
//! output.

use std::sync::Arc;

use crate::llm::LanguageModel;
use crate::stream::{StreamPublisher, TurnEvent};
use crate::turn::router::IntentRouter;
use crate::turn::{finalize, fragments, generate, knowledge, sensors, Mood, Priority, TurnState};
use crate::Result;

/// Fixed reply for a turn whose audio produced no transcript
///
/// Recognition failure and silence are recovered the same way: the plant
/// asks for a repeat and the generation stages are skipped entirely.
pub const CLARIFICATION_REPLY: &str =
    "I didn't quite catch that. Could you lean in and ask me again?";

/// Orchestrates the stages of one turn
pub struct Pipeline {
    model: Arc<dyn LanguageModel>,
    router: IntentRouter,
}

impl Pipeline {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let router = IntentRouter::new(Arc::clone(&model));
        Self { model, router }
    }

    /// Run the full state machine for a turn and publish its reply
    ///
    /// `species_profile` is the stored registry profile for the device's
    /// species, when one exists.
    ///
    /// # Errors
    ///
    /// Returns an error only when publishing fails because the consumer
    /// disconnected; every stage failure is absorbed internally.
    pub async fn run(
        &self,
        state: &mut TurnState,
        species_profile: Option<&str>,
        publisher: &StreamPublisher,
    ) -> Result<()> {
        let intent = self.router.route(state.query.as_deref()).await;
        state.intent = Some(intent);
        tracing::info!(
            device = %state.device_id,
            intent = intent.as_str(),
            "turn routed"
        );

        if intent.wants_sensor_analysis() {
            state.sensor_analysis = Some(sensors::analyze(self.model.as_ref(), state).await);
        }

        if intent.wants_knowledge() {
            state.knowledge =
                Some(knowledge::lookup(self.model.as_ref(), state, species_profile).await);
        }

        let reply = generate::generate(self.model.as_ref(), state).await;
        state.reply_text = reply.reply_text;
        state.mood = reply.mood;
        state.priority = reply.priority;

        finalize::finalize(state);

        publish_reply(state, publisher).await
    }

    /// Run the fast/direct path: a fixed reply with no routed stages
    ///
    /// Used for the silent-audio clarification turn. Finalization still
    /// runs, as it does on every path.
    ///
    /// # Errors
    ///
    /// Returns an error only when publishing fails (consumer disconnect)
    pub async fn run_direct(
        &self,
        state: &mut TurnState,
        reply_text: &str,
        publisher: &StreamPublisher,
    ) -> Result<()> {
        state.reply_text = reply_text.to_string();
        state.mood = Mood::Neutral;
        state.priority = Priority::Low;

        finalize::finalize(state);

        publish_reply(state, publisher).await
    }
}

/// Publish metadata and sentence fragments in order
async fn publish_reply(state: &mut TurnState, publisher: &StreamPublisher) -> Result<()> {
    publisher
        .publish(TurnEvent::Metadata { mood: state.mood })
        .await?;

    state.fragments = fragments::split_sentences(&state.reply_text);
    for fragment in &state.fragments {
        publisher
            .publish(TurnEvent::Sentence {
                text: fragment.clone(),
            })
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::stream::StreamRegistry;
    use crate::turn::{Intent, SensorSnapshot};
    use crate::Error;

    /// Scripted model that replays completions in call order and records
    /// the prompts it saw
    struct SequenceModel {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl SequenceModel {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn user_prompts(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for SequenceModel {
        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.calls.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Llm("script exhausted".to_string())))
        }
    }

    fn health_state(moisture: f64) -> TurnState {
        TurnState::new(
            "d1",
            "Basil",
            Some("how are you".to_string()),
            SensorSnapshot {
                temperature: 25.0,
                moisture,
                light: 500.0,
            },
            None,
        )
    }

    const REPLY_JSON: &str =
        r#"{"reply_text": "Doing fine. Thanks for asking!", "mood": "happy", "priority": "low"}"#;

    fn health_script() -> Vec<Result<String>> {
        vec![
            Ok("HEALTH".to_string()),
            Ok("Soil is on the dry side.".to_string()),
            Ok("Basil likes moist soil.".to_string()),
            Ok(REPLY_JSON.to_string()),
        ]
    }

    async fn run_turn(
        model: Arc<SequenceModel>,
        mut state: TurnState,
    ) -> (TurnState, Vec<TurnEvent>) {
        let registry = StreamRegistry::new();
        registry.open("t1").await.unwrap();
        let publisher = registry.publisher("t1").await.unwrap();

        let pipeline = Pipeline::new(model);
        pipeline.run(&mut state, None, &publisher).await.unwrap();
        publisher.complete();

        let mut consumer = registry.attach("t1").await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = consumer.next_event().await {
            events.push(event);
        }
        (state, events)
    }

    #[tokio::test]
    async fn health_turn_runs_both_context_stages_before_generation() {
        let model = SequenceModel::new(health_script());
        let (state, _) = run_turn(Arc::clone(&model), health_state(45.0)).await;

        assert_eq!(state.intent, Some(Intent::Health));
        assert_eq!(state.sensor_analysis.as_deref(), Some("Soil is on the dry side."));
        assert_eq!(state.knowledge.as_deref(), Some("Basil likes moist soil."));

        // The generation prompt (last call) saw both stage outputs
        let prompts = model.user_prompts();
        let generation_prompt = prompts.last().unwrap();
        assert!(generation_prompt.contains("Soil is on the dry side."));
        assert!(generation_prompt.contains("Basil likes moist soil."));
    }

    #[tokio::test]
    async fn reply_is_published_as_metadata_then_ordered_fragments() {
        let model = SequenceModel::new(health_script());
        let (state, events) = run_turn(model, health_state(45.0)).await;

        assert_eq!(state.reply_text, "Doing fine. Thanks for asking!");
        assert_eq!(
            events,
            vec![
                TurnEvent::Metadata { mood: Mood::Happy },
                TurnEvent::Sentence {
                    text: "Doing fine.".to_string()
                },
                TurnEvent::Sentence {
                    text: "Thanks for asking!".to_string()
                },
            ]
        );
        assert_eq!(state.fragments, vec!["Doing fine.", "Thanks for asking!"]);
    }

    #[tokio::test]
    async fn dry_pot_elevates_priority_relative_to_control() {
        let dry_model = SequenceModel::new(health_script());
        let control_model = SequenceModel::new(health_script());

        let (dry, _) = run_turn(dry_model, health_state(10.0)).await;
        let (control, _) = run_turn(control_model, health_state(60.0)).await;

        assert!(dry.priority > control.priority);
    }

    #[tokio::test]
    async fn knowledge_turn_skips_sensor_analysis() {
        let model = SequenceModel::new(vec![
            Ok("KNOWLEDGE".to_string()),
            Ok("Cacti store water in their stems.".to_string()),
            Ok(REPLY_JSON.to_string()),
        ]);
        let mut state = health_state(45.0);
        state.query = Some("where do cacti come from?".to_string());

        let (state, _) = run_turn(model, state).await;
        assert_eq!(state.intent, Some(Intent::Knowledge));
        assert!(state.sensor_analysis.is_none());
        assert_eq!(
            state.knowledge.as_deref(),
            Some("Cacti store water in their stems.")
        );
    }

    #[tokio::test]
    async fn every_stage_failing_still_yields_a_well_formed_turn() {
        let model = SequenceModel::new(vec![
            Err(Error::Llm("classifier down".to_string())),
            Err(Error::Llm("lookup down".to_string())),
            Err(Error::Llm("generator down".to_string())),
        ]);

        let (state, events) = run_turn(model, health_state(45.0)).await;

        // Classifier outage routes AMBIGUOUS (skips sensor analysis),
        // lookup degrades to its placeholder, generation to the apology.
        assert_eq!(state.intent, Some(Intent::Ambiguous));
        assert_eq!(state.knowledge.as_deref(), Some(knowledge::FALLBACK_KNOWLEDGE));
        assert_eq!(state.reply_text, generate::FALLBACK_REPLY);
        assert_eq!(state.mood, Mood::Neutral);
        assert_eq!(state.priority, Priority::Low);
        assert!(!events.is_empty());
    }

    #[tokio::test]
    async fn direct_path_publishes_clarification_without_model_calls() {
        let model = SequenceModel::new(vec![]);
        let registry = StreamRegistry::new();
        registry.open("t1").await.unwrap();
        let publisher = registry.publisher("t1").await.unwrap();

        let mut state = health_state(45.0);
        state.query = None;

        let pipeline = Pipeline::new(Arc::clone(&model) as Arc<dyn LanguageModel>);
        pipeline
            .run_direct(&mut state, CLARIFICATION_REPLY, &publisher)
            .await
            .unwrap();
        publisher.complete();

        assert!(model.user_prompts().is_empty());
        assert_eq!(state.reply_text, CLARIFICATION_REPLY);
        assert!(state.intent.is_none());

        let mut consumer = registry.attach("t1").await.unwrap();
        assert_eq!(
            consumer.next_event().await,
            Some(TurnEvent::Metadata {
                mood: Mood::Neutral
            })
        );
    }
}
