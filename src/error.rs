//! Error types for the synthesis pipeline

use thiserror::Error;

/// Main error type for impact-synth
#[derive(Error, Debug)]
pub enum SynthError {
    /// Text-generation call failed or timed out
    #[error("Text generation error: {message}")]
    Service { message: String },

    /// Generated text was not valid JSON (after fence stripping)
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SynthError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        SynthError::NotFound { entity, id }
    }

    pub fn service(message: impl Into<String>) -> Self {
        SynthError::Service {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        SynthError::Parse {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        SynthError::Persistence {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SynthError::Config {
            message: message.into(),
        }
    }

    /// Errors a content generator swallows and degrades on
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, SynthError::Service { .. } | SynthError::Parse { .. })
    }
}

impl From<rusqlite::Error> for SynthError {
    fn from(err: rusqlite::Error) -> Self {
        SynthError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SynthError {
    fn from(err: std::io::Error) -> Self {
        SynthError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SynthError {
    fn from(err: serde_json::Error) -> Self {
        SynthError::Parse {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SynthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SynthError::Service {
                message: format!("request timed out: {}", err),
            }
        } else {
            SynthError::Service {
                message: err.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;
