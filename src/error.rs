//! Error types for MargaNav

use thiserror::Error;

/// MargaNav error type
///
/// Mission outcomes (collision budget exhausted, cancellation) are reported
/// through [`crate::mission::MissionResult`], not through this type.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Robot interface error: {0}")]
    Robot(String),

    #[error("Invalid mission: {0}")]
    InvalidMission(String),

    #[error("Thread error: {0}")]
    Thread(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
