//! Error handling for backfill.
//! Defines the error taxonomy shared by the tokenizers, the path resolver,
//! the extraction engines and the renderers.

use std::io;
use thiserror::Error;

/// Custom error types for backfill operations.
///
/// Every variant is fatal to the call that raised it. Values already written
/// into the data tree before the failure are left in place.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur while reading templates or documents
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Malformed tag, unbalanced or mismatched loop close, unterminated loop
    #[error("Parse error: {0}.")]
    ParseError(String),

    /// The document does not agree with the literal parts of the template
    #[error("Mismatch error at {location}: expected {expected} but found {found}.")]
    MismatchError {
        expected: String,
        found: String,
        location: String,
    },

    /// A path reached a value of the wrong kind
    #[error("Evaluation error: {0}.")]
    EvaluationError(String),

    /// A container needed by a path could not be created
    #[error("Instantiation error: {0}.")]
    InstantiationError(String),

    /// A stream was used after it reported its end
    #[error("Usage error: {0}.")]
    UsageError(String),

    /// Represents errors that occur during configuration parsing or processing
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    #[error("JSON error: {0}.")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}.")]
    YamlError(#[from] serde_yaml::Error),
}

impl Error {
    /// Builds a [`Error::MismatchError`] from anything printable.
    pub fn mismatch(
        expected: impl Into<String>,
        found: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Error::MismatchError {
            expected: expected.into(),
            found: found.into(),
            location: location.into(),
        }
    }

    /// True for the errors a speculative grid match treats as "not a match":
    /// the document disagrees with the template. A malformed template is
    /// never one of them.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::MismatchError { .. } | Error::EvaluationError(_) | Error::InstantiationError(_)
        )
    }
}

/// Convenience type alias for Results with Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(1);
}
