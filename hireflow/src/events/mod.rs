//! Lifecycle events emitted while a run executes.
//!
//! Every run context carries its own sink; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
