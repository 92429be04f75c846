//! Incremental model assembly for Spark application event streams.
//!
//! An upstream reader decodes one application's event log into
//! [`event::SparkEvent`] values and feeds them, in stream order, to a
//! [`process::EventProcessor`]. The processor routes each event to a
//! per-kind handler that mutates a single [`model::AppModel`], which is then
//! handed read-only to downstream reporting. One malformed or
//! version-incompatible event never aborts the stream: faults are logged and
//! ingestion continues with the next event.
//!
//! This crate performs no I/O. Reading event-log files, rendering reports
//! and orchestrating multiple application runs all live in the embedding
//! tool.

pub mod event;
pub mod metric;
pub mod model;
pub mod process;
