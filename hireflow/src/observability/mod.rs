//! Tracing setup and run-scoped spans.

mod subscriber;

pub use subscriber::{init_tracing, run_span, LogFormat, DEFAULT_FILTER};
