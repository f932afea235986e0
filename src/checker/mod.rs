pub mod command;
pub mod known_words;
pub mod markdown;
pub mod patterns;
pub mod registry;

use crate::document::DocumentMeta;
use crate::error::CheckerError;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub use command::CommandChecker;
pub use known_words::KnownWordsChecker;
pub use markdown::MarkdownChecker;
pub use patterns::PatternChecker;
pub use registry::Registry;

/// What one checker concluded about one text.
///
/// Ranges are char offsets into the checked text. The JSON form mirrors the
/// plugin protocol: `{"correct": [...]}`, `{"incorrect": [...],
/// "invertIncorrectAsCorrect": true}` or `{"status": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Judgment {
    /// The checker is unavailable and offers no evidence.
    Status { status: String },

    /// Ranges the checker considers misspelled. With inversion, everything
    /// else in the text is implicitly correct.
    Incorrect {
        incorrect: Vec<Range<usize>>,
        #[serde(
            default,
            rename = "invertIncorrectAsCorrect",
            alias = "invert_incorrect_as_correct"
        )]
        invert_incorrect_as_correct: bool,
    },

    /// Ranges the checker confirms as correct.
    Correct { correct: Vec<Range<usize>> },
}

impl Judgment {
    pub fn correct(ranges: impl IntoIterator<Item = Range<usize>>) -> Self {
        Judgment::Correct {
            correct: ranges.into_iter().collect(),
        }
    }

    pub fn incorrect(ranges: impl IntoIterator<Item = Range<usize>>) -> Self {
        Judgment::Incorrect {
            incorrect: ranges.into_iter().collect(),
            invert_incorrect_as_correct: false,
        }
    }

    /// Misspellings only; the rest of the text is correct
    pub fn only_incorrect(ranges: impl IntoIterator<Item = Range<usize>>) -> Self {
        Judgment::Incorrect {
            incorrect: ranges.into_iter().collect(),
            invert_incorrect_as_correct: true,
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Judgment::Status {
            status: message.into(),
        }
    }
}

/// A non-replacement operation a checker offers for a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddingTarget {
    pub label: String,
}

/// A pluggable spelling judgment source.
///
/// Lower `priority` values are consulted and ranked first.
pub trait Checker: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    fn priority(&self) -> i32;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Human-readable state, for settings and status displays
    fn status(&self) -> String {
        if self.is_enabled() {
            "Working correctly.".to_string()
        } else {
            "Disabled.".to_string()
        }
    }

    fn provides_spelling(&self, meta: &DocumentMeta) -> bool;

    fn provides_suggestions(&self, _meta: &DocumentMeta) -> bool {
        false
    }

    fn provides_adding(&self, _meta: &DocumentMeta) -> bool {
        false
    }

    fn check<'a>(
        &'a self,
        meta: &'a DocumentMeta,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Judgment, CheckerError>>;

    /// Ordered replacement candidates for `word`; expected to be fast
    fn suggest(&self, _meta: &DocumentMeta, _word: &str) -> Result<Vec<String>, CheckerError> {
        Ok(Vec::new())
    }

    fn adding_targets(&self, _meta: &DocumentMeta) -> Vec<AddingTarget> {
        Vec::new()
    }

    fn add(
        &self,
        _meta: &DocumentMeta,
        _target: &AddingTarget,
        _word: &str,
    ) -> Result<(), CheckerError> {
        Err(CheckerError::AddNotSupported)
    }
}

/// Map byte ranges from `str` APIs onto char offsets.
///
/// `byte_ranges` must be sorted and disjoint.
pub(crate) fn byte_ranges_to_chars(
    text: &str,
    byte_ranges: impl IntoIterator<Item = Range<usize>>,
) -> Vec<Range<usize>> {
    let mut indices = text.char_indices().map(|(b, _)| b).enumerate().peekable();
    let mut to_char = |byte: usize| -> usize {
        while let Some(&(_, b)) = indices.peek() {
            if b >= byte {
                break;
            }
            indices.next();
        }
        indices
            .peek()
            .map_or_else(|| text.chars().count(), |&(c, _)| c)
    };

    let mut out = Vec::new();
    for range in byte_ranges {
        let start = to_char(range.start);
        let end = to_char(range.end);
        out.push(start..end);
    }
    out
}
