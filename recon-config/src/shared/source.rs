use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Connection settings for the remote bulk export service.
///
/// Session establishment happens elsewhere; the reconciler only needs an instance URL and an
/// already issued access token.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceConfig {
    /// Base URL of the instance, e.g. `https://example.my.salesforce.com`.
    pub instance_url: String,
    /// Bearer token sent with every request.
    pub access_token: SecretString,
    /// REST API version used to build endpoint paths.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Deadline of job submission and status requests, in milliseconds.
    ///
    /// Result streams may run longer; they only fail after this long without receiving data.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SourceConfig {
    pub const DEFAULT_API_VERSION: &'static str = "58.0";

    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.instance_url.trim().is_empty() {
            return Err(ValidationError::EmptyField("source.instance_url".to_string()));
        }

        if self.api_version.trim().is_empty() {
            return Err(ValidationError::EmptyField("source.api_version".to_string()));
        }

        if self.request_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.request_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn default_api_version() -> String {
    SourceConfig::DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout_ms() -> u64 {
    SourceConfig::DEFAULT_REQUEST_TIMEOUT_MS
}
