//! Error types for PovLine

use thiserror::Error;

/// PovLine error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or incomplete input table
    #[error("Data error: {0}")]
    Data(String),

    /// Degenerate or non-identifiable regression design
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// Prediction requested without values for every exposed covariate
    #[error("Input error: missing value for {}", .missing.join(", "))]
    Input {
        /// Names of the covariates that had no input value.
        missing: Vec<String>,
    },

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
