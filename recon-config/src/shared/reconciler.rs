use serde::Deserialize;
use std::collections::HashSet;

use crate::Config;
use crate::shared::{
    CompletionConfig, DatasetMapping, ExportConfig, OutputConfig, QueryConfig, SourceConfig,
    ValidationError,
};

/// Top-level configuration of a reconciliation run.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconcilerConfig {
    /// Remote export service connection.
    pub source: SourceConfig,
    /// Remote job polling.
    #[serde(default)]
    pub export: ExportConfig,
    /// Waiting on both ingestion streams.
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Output artifact location and rendering.
    #[serde(default)]
    pub output: OutputConfig,
    /// Field names used in the export queries.
    #[serde(default)]
    pub query: QueryConfig,
    /// Mappings added to the built-in dataset table.
    #[serde(default)]
    pub datasets: Vec<DatasetMapping>,
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.export.validate()?;
        self.completion.validate()?;
        self.query.validate()?;

        let mut seen = HashSet::new();
        for mapping in &self.datasets {
            if mapping.name.trim().is_empty() {
                return Err(ValidationError::EmptyField("datasets.name".to_string()));
            }
            if mapping.legacy_name.trim().is_empty() {
                return Err(ValidationError::EmptyField(
                    "datasets.legacy_name".to_string(),
                ));
            }
            if !seen.insert(mapping.name.as_str()) {
                return Err(ValidationError::DuplicateDataset(mapping.name.clone()));
            }
        }

        Ok(())
    }
}

impl Config for ReconcilerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            source: SourceConfig {
                instance_url: "https://example.my.salesforce.com".to_string(),
                access_token: SecretString::new("token".to_string()),
                api_version: SourceConfig::DEFAULT_API_VERSION.to_string(),
                request_timeout_ms: SourceConfig::DEFAULT_REQUEST_TIMEOUT_MS,
            },
            export: ExportConfig::default(),
            completion: CompletionConfig::default(),
            output: OutputConfig::default(),
            query: QueryConfig::default(),
            datasets: vec![],
        }
    }

    #[test]
    fn default_sections_validate() {
        config().validate().unwrap();
    }

    #[test]
    fn duplicate_dataset_mappings_are_rejected() {
        let mut config = config();
        config.datasets = vec![
            DatasetMapping::new("New__c", "Old__c"),
            DatasetMapping::new("New__c", "Older__c"),
        ];

        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateDataset(name)) if name == "New__c"
        ));
    }

    #[test]
    fn empty_instance_url_is_rejected() {
        let mut config = config();
        config.source.instance_url = " ".to_string();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyField(field)) if field == "source.instance_url"
        ));
    }
}
