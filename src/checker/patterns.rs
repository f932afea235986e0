use crate::checker::{byte_ranges_to_chars, Checker, Judgment};
use crate::document::DocumentMeta;
use crate::error::CheckerError;
use crate::ranges::RangeSet;
use futures_util::future::{self, BoxFuture, FutureExt};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

pub const ID: &str = "ignore-patterns";

pub const DEFAULT_PATTERNS: &[&str] = &[
    r"\b[A-Z0-9_]{2,}\b",                                // ALL_CAPS
    r"https?://\S+",                                     // URLs
    r"\b[a-fA-F0-9]{32,}\b",                             // Hashes
    r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",   // Emails
];

lazy_static! {
    static ref DEFAULT_REGEXES: Vec<Regex> = DEFAULT_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect();
}

/// Marks every regex match as correct.
#[derive(Debug, Clone)]
pub struct PatternChecker {
    regexes: Vec<Regex>,
}

impl PatternChecker {
    /// Compile `patterns`, logging and skipping any that are invalid
    pub fn new(patterns: &[String], include_defaults: bool) -> Self {
        let mut regexes = if include_defaults {
            DEFAULT_REGEXES.clone()
        } else {
            Vec::new()
        };

        for pattern in patterns {
            match Regex::new(pattern) {
                Ok(regex) => regexes.push(regex),
                Err(error) => warn!(pattern = %pattern, %error, "skipping invalid ignore pattern"),
            }
        }
        debug!(patterns = regexes.len(), "compiled ignore patterns");

        Self { regexes }
    }

    pub fn len(&self) -> usize {
        self.regexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty()
    }

    fn matched_ranges(&self, text: &str) -> Vec<std::ops::Range<usize>> {
        let mut bytes = RangeSet::new();
        for regex in &self.regexes {
            for m in regex.find_iter(text) {
                bytes.append_range(m.start(), m.end());
            }
        }
        byte_ranges_to_chars(text, bytes.ranges().iter().cloned())
    }
}

impl Checker for PatternChecker {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Ignore Patterns"
    }

    fn priority(&self) -> i32 {
        15
    }

    fn is_enabled(&self) -> bool {
        !self.regexes.is_empty()
    }

    fn provides_spelling(&self, _meta: &DocumentMeta) -> bool {
        true
    }

    fn check<'a>(
        &'a self,
        _meta: &'a DocumentMeta,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Judgment, CheckerError>> {
        future::ready(Ok(Judgment::correct(self.matched_ranges(text)))).boxed()
    }
}
