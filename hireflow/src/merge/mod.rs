//! Merge engine: flattens the workflow's named results into one record.
//!
//! The merge is a pure function of a context snapshot. Inputs are applied in a
//! fixed order with fixed precedence, so identical snapshots always produce
//! identical records.

mod engine;
mod record;

pub(crate) use engine::json_type;
pub use engine::{MergeAnomaly, MergeEngine, MergeOutcome};
pub use record::MergedRecord;
