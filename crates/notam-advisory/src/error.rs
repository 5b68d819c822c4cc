//! Error types for the advisory pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading data or fetching weather.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// Failed to read the NOTAM database.
    #[error("failed to read NOTAM database {path}: {source}")]
    NotamFile {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading NOTAM records from a stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The weather service could not be reached or returned an error status.
    #[error("weather request failed: {0}")]
    WeatherRequest(String),

    /// The weather response could not be interpreted.
    #[error("weather response invalid: {0}")]
    WeatherParse(String),
}

impl From<reqwest::Error> for AdvisoryError {
    fn from(err: reqwest::Error) -> Self {
        Self::WeatherRequest(err.to_string())
    }
}

impl From<serde_json::Error> for AdvisoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::WeatherParse(err.to_string())
    }
}

/// Result type for advisory operations.
pub type AdvisoryResult<T> = Result<T, AdvisoryError>;
