use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Identifies one of the two export streams of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamName {
    /// Stream of the legacy dataset (ids and owners).
    Legacy,
    /// Stream of the migrated dataset (ids and origin ids).
    Migrated,
}

impl StreamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamName::Legacy => "legacy",
            StreamName::Migrated => "migrated",
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal or running phase of an ingestion stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Running,
    Done,
    Failed,
}

impl StreamPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            PHASE_DONE => StreamPhase::Done,
            PHASE_FAILED => StreamPhase::Failed,
            _ => StreamPhase::Running,
        }
    }
}

const PHASE_RUNNING: u8 = 0;
const PHASE_DONE: u8 = 1;
const PHASE_FAILED: u8 = 2;

#[derive(Debug)]
struct Inner {
    name: StreamName,
    phase: AtomicU8,
    records: AtomicU64,
    bytes: AtomicU64,
    rejected: AtomicU64,
}

/// Progress and completion of one ingestion stream.
///
/// Written only by the worker consuming the stream, read by anyone holding a clone. The phase
/// moves once, from [`StreamPhase::Running`] to either terminal phase, and is stored with
/// release ordering as the last write of the worker, so a reader observing a terminal phase
/// also observes every counter update made before it.
#[derive(Debug, Clone)]
pub struct StreamState {
    inner: Arc<Inner>,
}

/// Point-in-time copy of a [`StreamState`], used for progress logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProgress {
    pub name: StreamName,
    pub phase: StreamPhase,
    pub records: u64,
    pub bytes: u64,
    pub rejected: u64,
}

impl StreamState {
    pub fn new(name: StreamName) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                phase: AtomicU8::new(PHASE_RUNNING),
                records: AtomicU64::new(0),
                bytes: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> StreamName {
        self.inner.name
    }

    pub fn phase(&self) -> StreamPhase {
        StreamPhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    pub fn is_done(&self) -> bool {
        self.phase() == StreamPhase::Done
    }

    pub fn is_failed(&self) -> bool {
        self.phase() == StreamPhase::Failed
    }

    pub fn record_count(&self) -> u64 {
        self.inner.records.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.inner.bytes.load(Ordering::Relaxed)
    }

    pub fn rejected_rows(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }

    pub fn progress(&self) -> StreamProgress {
        StreamProgress {
            name: self.name(),
            phase: self.phase(),
            records: self.record_count(),
            bytes: self.bytes_read(),
            rejected: self.rejected_rows(),
        }
    }

    pub(crate) fn add_bytes(&self, bytes: usize) {
        self.inner.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn set_counts(&self, records: usize, rejected: u64) {
        self.inner.records.store(records as u64, Ordering::Relaxed);
        self.inner.rejected.store(rejected, Ordering::Relaxed);
    }

    /// Marks the stream as fully drained. Returns `false` if it already reached a terminal phase.
    pub(crate) fn mark_done(&self) -> bool {
        self.transition(PHASE_DONE)
    }

    /// Marks the stream as failed. Returns `false` if it already reached a terminal phase.
    pub(crate) fn mark_failed(&self) -> bool {
        self.transition(PHASE_FAILED)
    }

    fn transition(&self, to: u8) -> bool {
        self.inner
            .phase
            .compare_exchange(PHASE_RUNNING, to, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_moves_once_from_running() {
        let state = StreamState::new(StreamName::Legacy);
        assert_eq!(state.phase(), StreamPhase::Running);

        assert!(state.mark_done());
        assert!(!state.mark_failed());
        assert!(state.is_done());
        assert!(!state.is_failed());
    }

    #[test]
    fn clones_share_progress() {
        let state = StreamState::new(StreamName::Migrated);
        let observer = state.clone();

        state.add_bytes(10);
        state.add_bytes(5);
        state.set_counts(3, 1);

        let progress = observer.progress();
        assert_eq!(progress.name, StreamName::Migrated);
        assert_eq!(progress.bytes, 15);
        assert_eq!(progress.records, 3);
        assert_eq!(progress.rejected, 1);
    }
}
