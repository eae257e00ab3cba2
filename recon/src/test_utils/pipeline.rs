use recon_config::shared::{
    CompletionConfig, ExportConfig, OutputConfig, QueryConfig, ReconcilerConfig, SourceConfig,
};
use secrecy::SecretString;
use std::path::Path;

use crate::bulk::memory::{MemoryExportJobClient, ScriptedExport};
use crate::pipeline::ReconciliationPipeline;

/// Migrated dataset used by the helpers below.
pub const TEST_DATASET: &str = "cgcloud__Fund__c";

/// Legacy counterpart of [`TEST_DATASET`].
pub const TEST_LEGACY_DATASET: &str = "ACCL__Fund__c";

/// Configuration writing to `output_dir`, with completion checked every 10ms for at most 2s.
pub fn test_config(output_dir: &Path) -> ReconcilerConfig {
    ReconcilerConfig {
        source: SourceConfig {
            instance_url: "https://recon.test".to_string(),
            access_token: SecretString::new("test-token".to_string()),
            api_version: SourceConfig::DEFAULT_API_VERSION.to_string(),
            request_timeout_ms: SourceConfig::DEFAULT_REQUEST_TIMEOUT_MS,
        },
        export: ExportConfig::default(),
        completion: CompletionConfig {
            poll_interval_ms: 10,
            max_wait_ms: 2_000,
        },
        output: OutputConfig {
            directory: output_dir.to_path_buf(),
            ..OutputConfig::default()
        },
        query: QueryConfig::default(),
        datasets: vec![],
    }
}

/// Memory client serving `legacy` and `migrated` for [`TEST_DATASET`].
pub async fn test_client(legacy: ScriptedExport, migrated: ScriptedExport) -> MemoryExportJobClient {
    MemoryExportJobClient::new()
        .with_export(TEST_LEGACY_DATASET, legacy)
        .await
        .with_export(TEST_DATASET, migrated)
        .await
}

/// Pipeline over `client` writing to `output_dir`.
pub fn create_pipeline(
    output_dir: &Path,
    client: MemoryExportJobClient,
) -> ReconciliationPipeline<MemoryExportJobClient> {
    ReconciliationPipeline::new(test_config(output_dir), client)
}
