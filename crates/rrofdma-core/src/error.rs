//! Error types for rrofdma

use thiserror::Error;

/// Main error type for rrofdma
#[derive(Error, Debug)]
pub enum OfdmaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel width without RU definitions
    #[error("Unsupported channel width: {0} MHz")]
    UnsupportedBandwidth(u16),

    /// Acknowledgment sequence the scheduler cannot drive
    #[error("Unsupported acknowledgment sequence: {0}")]
    UnsupportedAckSequence(String),

    /// Malformed simulation scenario
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for rrofdma operations
pub type OfdmaResult<T> = Result<T, OfdmaError>;

impl OfdmaError {
    /// Whether the error aborts scheduling because of a configuration problem
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            OfdmaError::Config(_)
                | OfdmaError::UnsupportedBandwidth(_)
                | OfdmaError::UnsupportedAckSequence(_)
        )
    }
}

impl From<serde_json::Error> for OfdmaError {
    fn from(err: serde_json::Error) -> Self {
        OfdmaError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for OfdmaError {
    fn from(err: toml::de::Error) -> Self {
        OfdmaError::Config(err.to_string())
    }
}
