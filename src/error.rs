use crate::diagnostics::panic_message;
use std::any::Any;
use thiserror::Error;

/// Errors surfaced by the engine itself.
#[derive(Debug, Error)]
pub enum Error {
    /// A checker failed registration validation.
    #[error("Invalid checker: {0}")]
    InvalidChecker(String),

    /// A checker with the same id is already registered.
    #[error("Checker already registered: {0}")]
    DuplicateChecker(String),

    /// The check job was terminated before it produced a result.
    #[error("Check request was cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised by an individual checker.
///
/// These never fail a whole request; the aggregator and merger report them to
/// the diagnostic sink and continue without that checker's contribution.
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed checker result: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Process exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("Checker does not support adding words")]
    AddNotSupported,
}

impl CheckerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// A checker call that panicked instead of returning
    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        Self::Failed(format!("panicked: {}", panic_message(payload)))
    }
}
