use crate::checker::{Judgment, Registry};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::DocumentMeta;
use crate::ranges::RangeSet;
use crate::{MisspellingSpan, Point};
use crate::error::CheckerError;
use futures_util::future::{join_all, FutureExt};
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

/// Merges checker judgments into the final list of misspelled spans.
///
/// An offset is flagged only when every checker that reported incorrect
/// evidence flagged it, and no checker confirmed it as correct.
pub struct Aggregator {
    registry: Arc<Registry>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Aggregator {
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub async fn check(&self, meta: &DocumentMeta, text: &str) -> Vec<MisspellingSpan> {
        let checkers = self.registry.snapshot();
        let text_len = text.chars().count();

        let pending = checkers
            .iter()
            .filter(|c| c.is_enabled() && c.provides_spelling(meta))
            .map(|checker| async move {
                // A panicking checker counts as a failed one.
                let pass = async { checker.check(meta, text).await };
                let result = AssertUnwindSafe(pass)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(CheckerError::panicked(&*payload)));
                (checker.id(), result)
            });
        let results = join_all(pending).await;

        // Split evidence into one correct set and one incorrect set per checker
        let mut correct = RangeSet::new();
        let mut incorrects: Vec<RangeSet> = Vec::new();

        for (id, result) in results {
            let judgment = match result {
                Ok(judgment) => judgment,
                Err(error) => {
                    self.sink.report(Diagnostic::CheckerFailed {
                        checker: id.to_string(),
                        operation: "check",
                        error,
                    });
                    continue;
                }
            };

            match judgment {
                Judgment::Status { status } => {
                    debug!(checker = id, %status, "checker unavailable");
                }
                Judgment::Correct { correct: ranges } => {
                    correct.union(&evidence(ranges, text_len));
                }
                Judgment::Incorrect {
                    incorrect,
                    invert_incorrect_as_correct,
                } => {
                    let flagged = evidence(incorrect, text_len);
                    if invert_incorrect_as_correct {
                        let mut implied = RangeSet::from(0..text_len);
                        implied.subtract(&flagged);
                        correct.union(&implied);
                    }
                    incorrects.push(flagged);
                }
            }
        }

        debug!(correct = %correct, incorrect_sources = incorrects.len(), "merged evidence");

        // Only offsets every incorrect source agrees on
        let mut incorrects = incorrects.into_iter();
        let Some(mut flagged) = incorrects.next() else {
            debug!("no incorrect evidence");
            return Vec::new();
        };
        for other in incorrects {
            flagged.intersect(&other);
        }

        if flagged.is_empty() {
            debug!("no misspellings after intersection");
            return Vec::new();
        }

        flagged.subtract(&correct);
        debug!(flagged = %flagged, "final misspelling ranges");

        to_spans(text, &flagged)
    }
}

fn evidence(ranges: Vec<Range<usize>>, text_len: usize) -> RangeSet {
    let mut set: RangeSet = ranges.into_iter().collect();
    set.clamp(text_len);
    set
}

/// Convert flat char ranges into per-line spans, one per whitespace-free run.
pub fn to_spans(text: &str, flagged: &RangeSet) -> Vec<MisspellingSpan> {
    let chars: Vec<char> = text.chars().collect();
    let ranges = flagged.ranges();

    let mut spans = Vec::new();
    let mut index = 0;
    let mut row = 0;
    let mut line_start = 0;

    while line_start < chars.len() && index < ranges.len() {
        let line_end = chars[line_start..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(chars.len(), |p| line_start + p);

        while let Some(range) = ranges.get(index) {
            if range.start >= line_end {
                break;
            }

            let start = range.start.max(line_start);
            let end = range.end.min(line_end);
            if start < end {
                push_tokens(&mut spans, &chars, row, line_start, start..end);
            }

            // A range running past this line is picked up again on the next one.
            if range.end <= line_end {
                index += 1;
            } else {
                break;
            }
        }

        line_start = line_end + 1;
        row += 1;
    }

    spans
}

fn push_tokens(
    spans: &mut Vec<MisspellingSpan>,
    chars: &[char],
    row: usize,
    line_start: usize,
    range: Range<usize>,
) {
    let mut token_start: Option<usize> = None;
    let mut emit = |start: usize, end: usize| {
        spans.push(MisspellingSpan {
            start: Point::new(row, start - line_start),
            end: Point::new(row, end - line_start),
        });
    };

    for offset in range.clone() {
        if chars[offset].is_whitespace() {
            if let Some(start) = token_start.take() {
                emit(start, offset);
            }
        } else if token_start.is_none() {
            token_start = Some(offset);
        }
    }

    if let Some(start) = token_start {
        emit(start, range.end);
    }
}
