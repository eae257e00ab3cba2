use recon_config::shared::CompletionConfig;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, ReconResult};
use crate::ingest::state::{StreamPhase, StreamState};

/// Waits until both ingestion streams of a run reach a terminal phase.
///
/// Stream states are sampled every `poll_interval`. Waiting ends as soon as either stream fails,
/// when both are done, or once `max_wait` has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct CompletionCoordinator {
    poll_interval: Duration,
    max_wait: Duration,
}

impl CompletionCoordinator {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Self {
        Self::new(config.poll_interval(), config.max_wait())
    }

    /// Returns once both streams are done.
    ///
    /// Fails with [`ErrorKind::StreamReadFailed`] naming the first failed stream, or with
    /// [`ErrorKind::IngestionTimeout`] when `max_wait` elapses first. The caller owns the
    /// workers and is responsible for stopping them on failure.
    pub async fn await_both(&self, first: &StreamState, second: &StreamState) -> ReconResult<()> {
        let started = Instant::now();
        let mut cycle = 0u64;

        loop {
            cycle += 1;
            let (a, b) = (first.progress(), second.progress());
            info!(
                cycle,
                first = %a.name,
                first_phase = ?a.phase,
                first_records = a.records,
                first_bytes = a.bytes,
                second = %b.name,
                second_phase = ?b.phase,
                second_records = b.records,
                second_bytes = b.bytes,
                "waiting for export streams"
            );

            for progress in [a, b] {
                if progress.phase == StreamPhase::Failed {
                    bail!(
                        ErrorKind::StreamReadFailed,
                        "Export stream failed before completion",
                        progress.name
                    );
                }
            }

            if a.phase == StreamPhase::Done && b.phase == StreamPhase::Done {
                info!(
                    cycle,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "both export streams drained"
                );
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= self.max_wait {
                bail!(
                    ErrorKind::IngestionTimeout,
                    "Export streams did not complete in time",
                    format!(
                        "waited {}ms, {} is {:?} and {} is {:?}",
                        elapsed.as_millis(),
                        a.name,
                        a.phase,
                        b.name,
                        b.phase
                    )
                );
            }

            let remaining = self.max_wait - elapsed;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}
