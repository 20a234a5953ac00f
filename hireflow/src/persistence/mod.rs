//! Persistence of merged records to a warehouse table.
//!
//! Delivery is at-most-once: a record is sent as a single-row batch and any
//! failure is terminal for the run. Nothing here retries.

mod persister;
mod sinks;

#[cfg(feature = "http")]
mod bigquery;

#[cfg(feature = "http")]
pub use bigquery::BigQuerySink;
pub use persister::{PersistAck, RecordPersister, DEFAULT_TABLE};
pub use sinks::{InMemorySink, JsonFileSink, WarehouseSink};

#[cfg(test)]
pub use sinks::MockWarehouseSink;
