use recon_config::shared::ReconcilerConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::bulk::{ExportJobClient, ExportQueries};
use crate::coordinator::CompletionCoordinator;
use crate::dataset::DatasetCatalog;
use crate::error::{ErrorKind, ReconError, ReconResult};
use crate::ingest::state::StreamName;
use crate::ingest::worker::{IngestionWorker, IngestionWorkerHandle};
use crate::join::reconcile;
use crate::output::{output_path, write_output};
use crate::types::{DecodeRecord, LegacyRecord, MigratedRecord};

/// Summary of a successful reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub dataset: String,
    pub output_path: PathBuf,
    /// Distinct ids ingested from the legacy stream.
    pub legacy_records: usize,
    /// Distinct ids ingested from the migrated stream, which is also the number of output rows.
    pub migrated_records: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub elapsed: Duration,
}

/// Runs reconciliations against an [`ExportJobClient`].
///
/// A run resolves the dataset, submits the legacy export and starts ingesting it, then does the
/// same for the migrated export. Once both streams are drained the maps are joined and the output
/// file is written. Nothing is written when any step fails.
#[derive(Debug)]
pub struct ReconciliationPipeline<C> {
    config: ReconcilerConfig,
    catalog: DatasetCatalog,
    client: C,
}

impl<C> ReconciliationPipeline<C>
where
    C: ExportJobClient,
{
    pub fn new(config: ReconcilerConfig, client: C) -> Self {
        let catalog = DatasetCatalog::builtin().with_mappings(config.datasets.iter().cloned());

        Self {
            config,
            catalog,
            client,
        }
    }

    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    pub async fn run(&self, dataset: &str) -> ReconResult<ReconciliationReport> {
        let started = Instant::now();

        let pair = self.catalog.resolve(dataset)?;
        let queries = ExportQueries::new(&pair, &self.config.query);
        info!(
            dataset = %pair.name,
            legacy_dataset = %pair.legacy_name,
            "starting reconciliation"
        );

        let legacy_job = self.client.submit(&queries.legacy).await?;
        let legacy = IngestionWorker::new(StreamName::Legacy, legacy_job).start::<LegacyRecord>();

        let migrated_job = match self.client.submit(&queries.migrated).await {
            Ok(job) => job,
            Err(err) => {
                legacy.abort();
                return Err(err);
            }
        };
        let migrated =
            IngestionWorker::new(StreamName::Migrated, migrated_job).start::<MigratedRecord>();

        let coordinator = CompletionCoordinator::from_config(&self.config.completion);
        if let Err(err) = coordinator
            .await_both(legacy.state(), migrated.state())
            .await
        {
            return Err(abandon(err, legacy, migrated).await);
        }

        let legacy_records = legacy.wait().await?;
        let migrated_records = migrated.wait().await?;

        let outcome = reconcile(&legacy_records, &migrated_records);
        let path = output_path(&self.config.output.directory, &pair.name);
        write_output(
            &path,
            &outcome.rows,
            &self.config.output.missing_owner_placeholder,
        )
        .await?;

        let report = ReconciliationReport {
            dataset: pair.name,
            output_path: path,
            legacy_records: legacy_records.len(),
            migrated_records: migrated_records.len(),
            matched: outcome.matched,
            unmatched: outcome.unmatched,
            elapsed: started.elapsed(),
        };
        info!(
            dataset = %report.dataset,
            legacy_records = report.legacy_records,
            migrated_records = report.migrated_records,
            matched = report.matched,
            unmatched = report.unmatched,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "reconciliation completed"
        );

        Ok(report)
    }
}

/// Stops both workers after the coordinator gave up and returns the error to report.
///
/// Failed workers have already finished, so their own errors are collected in place of the
/// coordinator's summary. Workers still running are aborted and their partial maps dropped.
async fn abandon(
    err: ReconError,
    legacy: IngestionWorkerHandle<LegacyRecord>,
    migrated: IngestionWorkerHandle<MigratedRecord>,
) -> ReconError {
    warn!(error = %err, "abandoning reconciliation");

    if err.kind() != ErrorKind::StreamReadFailed {
        legacy.abort();
        migrated.abort();
        return err;
    }

    let mut errors = Vec::new();
    if let Some(worker_err) = worker_error(legacy).await {
        errors.push(worker_err);
    }
    if let Some(worker_err) = worker_error(migrated).await {
        errors.push(worker_err);
    }

    if errors.is_empty() {
        err
    } else {
        ReconError::from(errors)
    }
}

async fn worker_error<R: DecodeRecord>(handle: IngestionWorkerHandle<R>) -> Option<ReconError> {
    if !handle.state().is_failed() {
        handle.abort();
        return None;
    }

    handle.wait().await.err()
}
