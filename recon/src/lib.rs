//! Reconciles a migrated dataset with the legacy dataset it was migrated from.
//!
//! Two bulk export jobs are submitted through an [`bulk::ExportJobClient`], their result streams
//! are ingested concurrently into keyed record maps, and once both are drained the migrated
//! records are joined back to their legacy owners and written as a CSV file.
//!
//! [`pipeline::ReconciliationPipeline`] drives a complete run.

pub mod bulk;
pub mod coordinator;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod join;
mod macros;
pub mod output;
pub mod pipeline;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
