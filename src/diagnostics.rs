use crate::document::DocumentId;
use crate::error::CheckerError;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use tracing::warn;

/// A failure that was recovered from without failing the request.
#[derive(Debug)]
pub enum Diagnostic {
    /// A checker's `check` or `suggest` failed; it contributed nothing.
    CheckerFailed {
        checker: String,
        operation: &'static str,
        error: CheckerError,
    },
    /// An aggregation pass for a scheduled job did not complete.
    JobFailed { document: DocumentId, message: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CheckerFailed {
                checker,
                operation,
                error,
            } => write!(f, "checker {} failed during {}: {}", checker, operation, error),
            Diagnostic::JobFailed { document, message } => {
                write!(f, "check job for document {} failed: {}", document, message)
            }
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Receives diagnostics from the aggregator, merger and scheduler.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered diagnostics reported so far
    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic.to_string());
    }
}
