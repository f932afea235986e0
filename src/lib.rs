pub mod aggregator;
pub mod checker;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod error;
pub mod manager;
pub mod merger;
pub mod ranges;
pub mod scheduler;

pub use aggregator::Aggregator;
pub use checker::{AddingTarget, Checker, Judgment, Registry};
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, MemorySink};
pub use document::{DocumentId, DocumentMeta, JobKey};
pub use engine::Engine;
pub use error::{CheckerError, Error};
pub use manager::CheckerManager;
pub use merger::{AddAction, Merger, SuggestionCandidate, WordReplacement};
pub use ranges::RangeSet;
pub use scheduler::Scheduler;

use serde::Serialize;

/// Zero-based line and char column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl Point {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// A flagged word on a single line; `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MisspellingSpan {
    pub start: Point,
    pub end: Point,
}

impl MisspellingSpan {
    /// The flagged text, given the lines of the checked document
    pub fn word<'a>(&self, lines: &[&'a str]) -> Option<&'a str> {
        let line = lines.get(self.start.row)?;
        let start = char_to_byte(line, self.start.column)?;
        let end = char_to_byte(line, self.end.column)?;
        line.get(start..end)
    }
}

fn char_to_byte(line: &str, column: usize) -> Option<usize> {
    line.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(line.len()))
        .nth(column)
}
