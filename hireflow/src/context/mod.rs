//! Context management for a workflow run.
//!
//! This module provides:
//! - Typed names for values passed between stages
//! - The per-run context store that stages read from and write to
//! - Immutable snapshots consumed by the merge engine

mod identity;
mod keys;
mod snapshot;
mod store;

pub use identity::RunIdentity;
pub use keys::ContextKey;
pub use snapshot::{ContextEntry, ContextSnapshot};
pub use store::{RunContext, CALLER};
