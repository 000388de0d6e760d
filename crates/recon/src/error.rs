use thiserror::Error;

/// Fatal engine errors. Everything here is raised before the first oracle call.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (empty column name, bad cutoff, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// Text column still absent after coercion.
    #[error("could not find a text column '{column}' in raw data after coercion; got: {}", .available.join(", "))]
    MissingTextColumn { column: String, available: Vec<String> },

    /// Raw data has no construct column and no id to expand it with.
    #[error(
        "raw data is missing construct column '{construct}' and has no usable id column{}; \
         expanding raw rows by construct needs an id. raw columns: {}",
        .id.as_deref().map(|c| format!(" ('{c}')")).unwrap_or_default(),
        .available.join(", ")
    )]
    CannotExpand {
        construct: String,
        id: Option<String>,
        available: Vec<String>,
    },

    /// Neither an id nor a construct key is available on both sides.
    #[error("no usable merge keys: {0}")]
    NoMergeKeys(String),

    /// A column that must exist at this stage is missing.
    #[error("{table}: missing column '{column}'")]
    MissingColumn { table: String, column: String },

    /// Codebook file could not be parsed.
    #[error("codebook error: {0}")]
    Codebook(String),
}
