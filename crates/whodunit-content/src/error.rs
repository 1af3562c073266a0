//! Scenario loading errors.

use std::path::PathBuf;

use thiserror::Error;
use whodunit_core::error::DomainError;

/// Why a scenario could not be loaded.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source is not a well-formed scenario document.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document parsed but describes an unplayable game.
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

impl From<DomainError> for ScenarioError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(message) => Self::Invalid(message),
            other => Self::Invalid(other.to_string()),
        }
    }
}
