use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A required field is empty.
    #[error("`{0}` must not be empty")]
    EmptyField(String),
    /// Two dataset mappings share the same name.
    #[error("dataset `{0}` is mapped more than once")]
    DuplicateDataset(String),
}
