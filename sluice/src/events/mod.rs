//! Event sinks for recipe lifecycle notifications.
//!
//! A recipe reports `recipe.started`, `record.failed`, `emitter.detached`,
//! `recipe.completed` and `recipe.aborted` to the sink it was built with.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
