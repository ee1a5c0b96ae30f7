//! Finalization stage
//!
//! Runs unconditionally last. It only derives and normalizes the display
//! fields (mood, priority) from what earlier stages produced; the reply
//! text is never rewritten here. Raw sensor thresholds may elevate
//! priority — elevate only, never lower — so a drying plant surfaces even
//! when the generator was relaxed about it.

use crate::turn::{Mood, Priority, TurnState};

/// Derive the final mood and priority for a turn
///
/// The reply text and fragments are left untouched.
pub fn finalize(state: &mut TurnState) {
    // A critically dry plant elevates priority regardless of what the
    // generator thought, and turns an indifferent mood thirsty.
    if state.sensors.is_dry() {
        state.priority = state.priority.max(Priority::High);
        if state.mood == Mood::Neutral || state.mood == Mood::Happy {
            state.mood = Mood::Thirsty;
        }
    }

    // An explicit hardware alert never leaves at low priority
    if state
        .event
        .as_deref()
        .is_some_and(|e| e.ends_with("_alert"))
    {
        state.priority = state.priority.max(Priority::Medium);
    }

    tracing::debug!(
        mood = state.mood.as_str(),
        priority = state.priority.as_str(),
        "turn finalized"
    );
}
