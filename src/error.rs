//! Fatal error type for translation runs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslateError {
    /// Input unreadable or output unwritable
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row export file could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid option combination or config value
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported dialect pair: {from} → {to} (only mysql → postgres is supported)")]
    UnsupportedDialect { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, TranslateError>;
