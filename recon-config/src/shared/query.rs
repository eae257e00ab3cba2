use serde::Deserialize;

use crate::shared::ValidationError;

/// Field names used when building the two export queries.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueryConfig {
    /// Owner field read from the legacy dataset.
    #[serde(default = "default_owner_field")]
    pub owner_field: String,
    /// Field on the migrated dataset referencing the legacy record id.
    #[serde(default = "default_origin_field")]
    pub origin_field: String,
}

impl QueryConfig {
    pub const DEFAULT_OWNER_FIELD: &'static str = "CreatedById";

    pub const DEFAULT_ORIGIN_FIELD: &'static str = "Origin_Id__c";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner_field.trim().is_empty() {
            return Err(ValidationError::EmptyField("query.owner_field".to_string()));
        }

        if self.origin_field.trim().is_empty() {
            return Err(ValidationError::EmptyField("query.origin_field".to_string()));
        }

        Ok(())
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            owner_field: default_owner_field(),
            origin_field: default_origin_field(),
        }
    }
}

fn default_owner_field() -> String {
    QueryConfig::DEFAULT_OWNER_FIELD.to_string()
}

fn default_origin_field() -> String {
    QueryConfig::DEFAULT_ORIGIN_FIELD.to_string()
}
