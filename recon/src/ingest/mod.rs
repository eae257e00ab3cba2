//! Incremental ingestion of export streams into keyed record maps.
//!
//! An export stream delivers chunks whose boundaries have no relation to line boundaries.
//! [`lines::LineBuffer`] reassembles complete lines from those chunks, [`rows::RowSink`]
//! turns lines into typed records and filters the header and sentinel rows, and
//! [`worker::IngestionWorker`] drives both on a dedicated task while publishing progress
//! through a [`state::StreamState`].
//!
//! Each worker exclusively owns the map it builds. The map is handed back through the worker
//! handle once the stream is drained, after the state has been marked done, so no other task
//! ever observes it while it is being written.

pub mod lines;
pub mod rows;
pub mod state;
pub mod worker;
