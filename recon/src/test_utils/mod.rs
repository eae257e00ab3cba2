//! Helpers for exercising reconciliation runs without a remote export service.
//!
//! [`pipeline`] builds configurations and pipelines backed by
//! [`crate::bulk::memory::MemoryExportJobClient`], and [`export`] renders export streams in the
//! format the bulk service produces. [`http_server`] serves scripted HTTP responses on a local
//! port for exercising [`crate::bulk::http::HttpExportJobClient`].

pub mod export;
pub mod http_server;
pub mod pipeline;
