use serde::Deserialize;
use std::time::Duration;

use crate::shared::ValidationError;

/// Settings for waiting on both ingestion streams to drain.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionConfig {
    /// Interval between two checks of the stream states, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum time to wait for both streams, in milliseconds.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl CompletionConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

    pub const DEFAULT_MAX_WAIT_MS: u64 = 3_600_000;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Ensures both durations are non-zero and that at least one poll fits in the wait.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "completion.poll_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_wait_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "completion.max_wait_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.poll_interval_ms > self.max_wait_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "completion.poll_interval_ms".to_string(),
                constraint: "must not exceed completion.max_wait_ms".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    CompletionConfig::DEFAULT_POLL_INTERVAL_MS
}

fn default_max_wait_ms() -> u64 {
    CompletionConfig::DEFAULT_MAX_WAIT_MS
}
