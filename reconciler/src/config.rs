use recon::dataset::DatasetCatalog;
use recon_config::load_config;
use recon_config::shared::ReconcilerConfig;

use crate::error::{ReconcilerError, ReconcilerResult};

/// Loads the layered reconciler configuration and validates it.
pub fn load_reconciler_config() -> ReconcilerResult<ReconcilerConfig> {
    let config = load_config::<ReconcilerConfig>().map_err(ReconcilerError::config)?;
    config.validate().map_err(ReconcilerError::config)?;

    Ok(config)
}

/// Loads the configuration for a run of `dataset`.
///
/// When the configuration cannot be loaded, a name missing from the built-in dataset table is
/// reported as unsupported instead, so the supported names are listed even without credentials.
pub fn load_reconciler_config_for(dataset: &str) -> ReconcilerResult<ReconcilerConfig> {
    reject_unknown_dataset_on_failure(dataset, load_reconciler_config())
}

fn reject_unknown_dataset_on_failure(
    dataset: &str,
    loaded: ReconcilerResult<ReconcilerConfig>,
) -> ReconcilerResult<ReconcilerConfig> {
    match loaded {
        Ok(config) => Ok(config),
        Err(err) => {
            DatasetCatalog::builtin().resolve(dataset)?;
            Err(err)
        }
    }
}
