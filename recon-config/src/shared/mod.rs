//! Shared configuration types for reconciliation runs.

mod base;
mod completion;
mod dataset;
mod export;
mod output;
mod query;
mod reconciler;
mod source;

pub use base::ValidationError;
pub use completion::CompletionConfig;
pub use dataset::DatasetMapping;
pub use export::ExportConfig;
pub use output::OutputConfig;
pub use query::QueryConfig;
pub use reconciler::ReconcilerConfig;
pub use source::SourceConfig;
