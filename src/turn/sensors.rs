//! Sensor-analysis stage
//!
//! Interprets the raw snapshot into a short clinical description the later
//! stages can quote. Runs only on the HEALTH path.

use crate::llm::LanguageModel;
use crate::turn::TurnState;

/// Fallback analysis when the analyzer collaborator fails
pub const FALLBACK_ANALYSIS: &str = "Unknown health state.";

const ANALYZE_SYSTEM_PROMPT: &str = "\
You are a sensor analysis assistant for a smart plant pot.
Interpret raw sensor values (temperature, moisture, light) and call out
thresholds or anomalies. Be clinical and precise: state the physical
condition of the plant based on the numbers, in at most two sentences.";

/// Analyze the turn's sensor snapshot
///
/// Never fails: an analyzer outage yields [`FALLBACK_ANALYSIS`] and the
/// pipeline continues.
pub async fn analyze(model: &dyn LanguageModel, state: &TurnState) -> String {
    let user = format!(
        "Species: {}\nCurrent readings: {}",
        state.species,
        state.sensors.describe()
    );

    match model.complete(ANALYZE_SYSTEM_PROMPT, &user).await {
        Ok(analysis) => analysis.trim().to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "sensor analysis failed, using fallback");
            FALLBACK_ANALYSIS.to_string()
        }
    }
}
