use serde::Deserialize;

/// Pairs a migrated dataset with the legacy dataset its records came from.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatasetMapping {
    /// Name of the dataset records were migrated into.
    pub name: String,
    /// Name of the legacy dataset holding the original records.
    pub legacy_name: String,
}

impl DatasetMapping {
    pub fn new(name: impl Into<String>, legacy_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            legacy_name: legacy_name.into(),
        }
    }
}
