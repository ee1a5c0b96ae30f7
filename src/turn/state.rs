//! Per-turn state record shared across pipeline stages
//!
//! A [`TurnState`] is created at ingest and mutated append-only: each stage
//! fills in its own fields and later stages read them. The finalization
//! stage derives mood and priority but never rewrites the reply text.

use serde::{Deserialize, Serialize};

/// Intent category for a user query
///
/// Closed set; a turn always carries exactly one of these. Classifier output
/// that falls outside the set is mapped to [`Intent::Ambiguous`] by the
/// router, never propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    /// Who/what the plant is, its name or personality
    Identity,
    /// The plant's well-being, needs, or current state
    Health,
    /// Botanical facts unrelated to current state
    Knowledge,
    /// A greeting
    Greeting,
    /// A joke request
    Joke,
    /// Unclear or too short to categorize
    Ambiguous,
}

impl Intent {
    /// All valid intent tags, in classifier-output form
    pub const ALL: [Self; 6] = [
        Self::Identity,
        Self::Health,
        Self::Knowledge,
        Self::Greeting,
        Self::Joke,
        Self::Ambiguous,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "IDENTITY",
            Self::Health => "HEALTH",
            Self::Knowledge => "KNOWLEDGE",
            Self::Greeting => "GREETING",
            Self::Joke => "JOKE",
            Self::Ambiguous => "AMBIGUOUS",
        }
    }

    /// Parse a classifier tag; `None` for anything outside the closed set
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let tag = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|i| i.as_str() == tag)
    }

    /// Whether the sensor-analysis stage runs for this intent
    #[must_use]
    pub const fn wants_sensor_analysis(self) -> bool {
        matches!(self, Self::Health)
    }

    /// Whether the knowledge-lookup stage runs for this intent
    ///
    /// Contextual grounding is useful for every routed intent; only the
    /// fast/direct path (no intent at all) skips it.
    #[must_use]
    pub const fn wants_knowledge(self) -> bool {
        matches!(
            self,
            Self::Health
                | Self::Identity
                | Self::Knowledge
                | Self::Greeting
                | Self::Joke
                | Self::Ambiguous
        )
    }
}

/// Display mood for the device face
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Thirsty,
    #[default]
    Neutral,
    Concerned,
    Sunny,
}

impl Mood {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Thirsty => "thirsty",
            Self::Neutral => "neutral",
            Self::Concerned => "concerned",
            Self::Sunny => "sunny",
        }
    }

    /// Parse a mood label, defaulting to neutral for unknown values
    #[must_use]
    pub fn parse_or_neutral(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "happy" => Self::Happy,
            "thirsty" => Self::Thirsty,
            "concerned" => Self::Concerned,
            "sunny" => Self::Sunny,
            _ => Self::Neutral,
        }
    }
}

/// Reply priority for the device display and alerting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a priority label, defaulting to low for unknown values
    #[must_use]
    pub fn parse_or_low(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Low,
        }
    }
}

/// Latest sensor snapshot from the pot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Soil moisture percentage
    pub moisture: f64,
    /// Ambient light in lux
    pub light: f64,
}

impl SensorSnapshot {
    /// Soil moisture below this is considered critically dry
    pub const DRY_MOISTURE_PCT: f64 = 20.0;

    /// Whether the snapshot indicates a critically dry plant
    #[must_use]
    pub fn is_dry(&self) -> bool {
        self.moisture < Self::DRY_MOISTURE_PCT
    }

    /// Compact human-readable form for prompts and fallbacks
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "Temperature: {:.1}°C, Moisture: {:.1}%, Light: {:.0}lux",
            self.temperature, self.moisture, self.light
        )
    }
}

/// State record for one request/response turn
///
/// Input fields are set at ingest; intermediate fields by their stage; final
/// fields by generation and finalization.
#[derive(Debug, Clone)]
pub struct TurnState {
    /// Originating device
    pub device_id: String,
    /// Species label from the device registry
    pub species: String,
    /// Transcribed or typed query, if any
    pub query: Option<String>,
    /// Latest sensor readings
    pub sensors: SensorSnapshot,
    /// Optional event tag sent by the hardware (e.g. `low_moisture_alert`)
    pub event: Option<String>,

    /// Set by the router
    pub intent: Option<Intent>,
    /// Set by the sensor-analysis stage
    pub sensor_analysis: Option<String>,
    /// Set by the knowledge-lookup stage
    pub knowledge: Option<String>,

    /// Set by the generation stage, preserved verbatim by finalization
    pub reply_text: String,
    /// Derived by generation, normalized by finalization
    pub mood: Mood,
    /// Derived by generation, possibly elevated by finalization
    pub priority: Priority,
    /// Reply fragments in emission order
    pub fragments: Vec<String>,
}

impl TurnState {
    /// Create the initial state for a turn
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        species: impl Into<String>,
        query: Option<String>,
        sensors: SensorSnapshot,
        event: Option<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            species: species.into(),
            query,
            sensors,
            event,
            intent: None,
            sensor_analysis: None,
            knowledge: None,
            reply_text: String::new(),
            mood: Mood::default(),
            priority: Priority::default(),
            fragments: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parse_accepts_every_tag() {
        for intent in Intent::ALL {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
        }
    }

    #[test]
    fn intent_parse_is_case_insensitive_and_trims() {
        assert_eq!(Intent::parse("  health \n"), Some(Intent::Health));
        assert_eq!(Intent::parse("Joke"), Some(Intent::Joke));
    }

    #[test]
    fn intent_parse_rejects_unknown_tags() {
        assert_eq!(Intent::parse("WATERING"), None);
        assert_eq!(Intent::parse(""), None);
    }

    #[test]
    fn health_is_the_only_sensor_path() {
        assert!(Intent::Health.wants_sensor_analysis());
        for intent in [
            Intent::Identity,
            Intent::Knowledge,
            Intent::Greeting,
            Intent::Joke,
            Intent::Ambiguous,
        ] {
            assert!(!intent.wants_sensor_analysis());
        }
    }

    #[test]
    fn every_intent_wants_knowledge() {
        for intent in Intent::ALL {
            assert!(intent.wants_knowledge());
        }
    }

    #[test]
    fn mood_parse_falls_back_to_neutral() {
        assert_eq!(Mood::parse_or_neutral("Thirsty"), Mood::Thirsty);
        assert_eq!(Mood::parse_or_neutral("ecstatic"), Mood::Neutral);
    }

    #[test]
    fn priority_orders_low_to_high() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
    }

    #[test]
    fn dry_threshold() {
        let dry = SensorSnapshot {
            temperature: 25.0,
            moisture: 10.0,
            light: 500.0,
        };
        let fine = SensorSnapshot {
            temperature: 25.0,
            moisture: 60.0,
            light: 500.0,
        };
        assert!(dry.is_dry());
        assert!(!fine.is_dry());
    }
}
