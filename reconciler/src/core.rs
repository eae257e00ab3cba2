use recon::bulk::http::HttpExportJobClient;
use recon::error::ReconResult;
use recon::pipeline::{ReconciliationPipeline, ReconciliationReport};
use recon_config::shared::ReconcilerConfig;
use tracing::info;

/// Runs one reconciliation of `dataset` against the configured export service.
pub async fn start_reconciliation_with_config(
    reconciler_config: ReconcilerConfig,
    dataset: &str,
) -> ReconResult<ReconciliationReport> {
    info!(dataset, "starting reconciler");
    log_config(&reconciler_config);

    let client = HttpExportJobClient::new(&reconciler_config.source, &reconciler_config.export)?;
    let pipeline = ReconciliationPipeline::new(reconciler_config, client);

    let report = pipeline.run(dataset).await?;
    info!(
        output = %report.output_path.display(),
        rows = report.migrated_records,
        unmatched = report.unmatched,
        "reconciler finished"
    );

    Ok(report)
}

fn log_config(config: &ReconcilerConfig) {
    info!(
        instance_url = %config.source.instance_url,
        api_version = %config.source.api_version,
        export_poll_interval_ms = config.export.poll_interval_ms,
        export_poll_timeout_ms = config.export.poll_timeout_ms,
        completion_poll_interval_ms = config.completion.poll_interval_ms,
        completion_max_wait_ms = config.completion.max_wait_ms,
        output_directory = %config.output.directory.display(),
        extra_datasets = config.datasets.len(),
        "reconciler configuration"
    );
}
