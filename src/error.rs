//! Error types for the Parlance library.
//!
//! All fallible operations return [`Result`], and every failure is a
//! [`ParlanceError`] variant. Expected runtime conditions are not errors:
//! a training timeout is reported through the boolean result of `train`,
//! a corrupt cache entry is a cache miss, and an utterance with no
//! confident match yields `None` from `calc_intent`.

use std::io;

use thiserror::Error;

/// The main error type for Parlance operations.
#[derive(Error, Debug)]
pub enum ParlanceError {
    /// I/O errors (cache directory, template files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A template definition was rejected at registration. Registration
    /// with a malformed template never mutates the store.
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    /// Analysis-related errors (tokenization).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A classifier failed numerically while fitting one intent.
    #[error("Training error: {0}")]
    Training(String),

    /// Training-cache errors that are not recoverable as cache misses
    /// (e.g. the cache directory cannot be created).
    #[error("Cache error: {0}")]
    Cache(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with [`ParlanceError`].
pub type Result<T> = std::result::Result<T, ParlanceError>;

impl ParlanceError {
    /// Create a new malformed-template error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        ParlanceError::MalformedTemplate(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Analysis(msg.into())
    }

    /// Create a new training error.
    pub fn training<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Training(msg.into())
    }

    /// Create a new cache error.
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Cache(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = ParlanceError::malformed("empty sample set");
        assert_eq!(error.to_string(), "Malformed template: empty sample set");

        let error = ParlanceError::training("weights diverged");
        assert_eq!(error.to_string(), "Training error: weights diverged");

        let error = ParlanceError::cache("cannot create directory");
        assert_eq!(error.to_string(), "Cache error: cannot create directory");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error = ParlanceError::from(io_error);

        match error {
            ParlanceError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
