use serde::Deserialize;

use crate::shared::ValidationError;

/// Polling behavior while waiting for a remote export job to finish.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExportConfig {
    /// Delay between two job status checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum time a job may take before it is reported as timed out, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl ExportConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

    pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 300_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "export.poll_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.poll_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "export.poll_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    ExportConfig::DEFAULT_POLL_INTERVAL_MS
}

fn default_poll_timeout_ms() -> u64 {
    ExportConfig::DEFAULT_POLL_TIMEOUT_MS
}
