//! Turn processing: routing, context stages, generation, finalization

pub mod finalize;
pub mod fragments;
pub mod generate;
pub mod knowledge;
pub mod pipeline;
pub mod router;
pub mod sensors;
pub mod state;

pub use finalize::finalize;
pub use pipeline::{Pipeline, CLARIFICATION_REPLY};
pub use router::IntentRouter;
pub use state::{Intent, Mood, Priority, SensorSnapshot, TurnState};
