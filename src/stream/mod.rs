//! Per-conversation stream channels bridging generation and delivery

pub mod channel;

pub use channel::{StreamConsumer, StreamPublisher, StreamRegistry, TurnEvent};
