//! Clients submitting bulk export jobs and streaming their results.

pub mod base;
pub mod http;
pub mod memory;
mod query;

pub use base::{ByteStream, ExportJobClient, ExportJobHandle};
pub use query::{ExportQueries, queried_object};
