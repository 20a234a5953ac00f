//! Test doubles and canned collaborator responses.
//!
//! Model output is non-deterministic, so pipeline tests run against fixed
//! responses instead of a live model.

pub mod fixtures;
mod mocks;

pub use mocks::{CannedModelClient, ScriptedExecutor, StaticExtractor};
