use thiserror::Error;

/// Top-level error type for the Waybill workspace.
///
/// Only setup paths are fallible: reading configuration and loading a custom
/// knowledge catalog. Response resolution itself never produces an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WaybillError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Knowledge base error: {0}")]
    Knowledge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for WaybillError {
    fn from(err: toml::de::Error) -> Self {
        WaybillError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for WaybillError {
    fn from(err: toml::ser::Error) -> Self {
        WaybillError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for WaybillError {
    fn from(err: serde_json::Error) -> Self {
        WaybillError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Waybill operations.
pub type Result<T> = std::result::Result<T, WaybillError>;
