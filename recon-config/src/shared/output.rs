use serde::Deserialize;
use std::path::PathBuf;

/// Where and how the reconciled mapping is written.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Directory receiving `<dataset>.csv`.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Text written in place of the owner when a migrated record has no legacy match.
    ///
    /// An empty string leaves the field empty.
    #[serde(default = "default_missing_owner_placeholder")]
    pub missing_owner_placeholder: String,
}

impl OutputConfig {
    pub const DEFAULT_MISSING_OWNER_PLACEHOLDER: &'static str = "undefined";
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            missing_owner_placeholder: default_missing_owner_placeholder(),
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_missing_owner_placeholder() -> String {
    OutputConfig::DEFAULT_MISSING_OWNER_PLACEHOLDER.to_string()
}
