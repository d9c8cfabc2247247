//! Error types for the stabilo engine.

use thiserror::Error;

use crate::types::SessionId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Insufficient data: need {required} samples, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = Error::InsufficientData {
            required: 100,
            available: 42,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data: need 100 samples, have 42"
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
