use crate::checker::{AddingTarget, Checker, Registry};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::DocumentMeta;
use crate::error::CheckerError;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A replacement word offered by one checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordReplacement {
    pub suggestion: String,
    pub priority: i32,
    /// Position within the contributing checker's own list
    pub rank: usize,
}

impl WordReplacement {
    fn weight(&self) -> i64 {
        i64::from(self.priority) + self.rank as i64
    }
}

/// A non-replacement operation, such as adding the word to a word list.
#[derive(Clone)]
pub struct AddAction {
    pub label: String,
    pub word: String,
    target: AddingTarget,
    checker: Arc<dyn Checker>,
}

impl AddAction {
    pub fn checker_id(&self) -> &str {
        self.checker.id()
    }

    pub fn target(&self) -> &AddingTarget {
        &self.target
    }

    /// Run the action through the checker that offered it
    pub fn execute(&self, meta: &DocumentMeta) -> Result<(), CheckerError> {
        self.checker.add(meta, &self.target, &self.word)
    }
}

impl fmt::Debug for AddAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddAction")
            .field("label", &self.label)
            .field("word", &self.word)
            .field("checker", &self.checker.id())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SuggestionCandidate {
    Replacement(WordReplacement),
    Action(AddAction),
}

impl SuggestionCandidate {
    /// Text to show for this candidate
    pub fn label(&self) -> &str {
        match self {
            SuggestionCandidate::Replacement(r) => &r.suggestion,
            SuggestionCandidate::Action(a) => &a.label,
        }
    }

    pub fn as_replacement(&self) -> Option<&str> {
        match self {
            SuggestionCandidate::Replacement(r) => Some(&r.suggestion),
            SuggestionCandidate::Action(_) => None,
        }
    }
}

/// Builds the ranked correction list for one misspelled word.
pub struct Merger {
    registry: Arc<Registry>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Merger {
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { registry, sink }
    }

    /// Replacements ordered by `priority + rank` then by text, without
    /// duplicates, followed by add actions in checker priority order.
    pub fn suggest(&self, meta: &DocumentMeta, word: &str) -> Vec<SuggestionCandidate> {
        let checkers = self.registry.snapshot();

        let mut replacements = Vec::new();
        for checker in checkers
            .iter()
            .filter(|c| c.is_enabled() && c.provides_suggestions(meta))
        {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| checker.suggest(meta, word)))
                .unwrap_or_else(|payload| Err(CheckerError::panicked(&*payload)));
            let words = match outcome {
                Ok(words) => words,
                Err(error) => {
                    self.sink.report(Diagnostic::CheckerFailed {
                        checker: checker.id().to_string(),
                        operation: "suggest",
                        error,
                    });
                    continue;
                }
            };

            let priority = checker.priority();
            replacements.extend(words.into_iter().enumerate().map(|(rank, suggestion)| {
                WordReplacement {
                    suggestion,
                    priority,
                    rank,
                }
            }));
        }

        // Sort by weight, then text
        replacements.sort_by(|a, b| {
            a.weight()
                .cmp(&b.weight())
                .then_with(|| a.suggestion.cmp(&b.suggestion))
        });

        let mut seen = HashSet::new();
        let mut results: Vec<SuggestionCandidate> = replacements
            .into_iter()
            .filter(|r| seen.insert(r.suggestion.clone()))
            .map(SuggestionCandidate::Replacement)
            .collect();

        // Add actions go last
        let mut adders: Vec<&Arc<dyn Checker>> = checkers
            .iter()
            .filter(|c| c.is_enabled() && c.provides_adding(meta))
            .collect();
        adders.sort_by_key(|c| c.priority());

        for checker in adders {
            for target in checker.adding_targets(meta) {
                results.push(SuggestionCandidate::Action(AddAction {
                    label: target.label.clone(),
                    word: word.to_string(),
                    target,
                    checker: Arc::clone(checker),
                }));
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::registry::tests::{Fault, StubChecker};
    use crate::diagnostics::MemorySink;
    use crate::document::DocumentId;
    use pretty_assertions::assert_eq;

    fn merger(checkers: Vec<StubChecker>) -> Merger {
        merger_with_sink(checkers).0
    }

    fn merger_with_sink(checkers: Vec<StubChecker>) -> (Merger, Arc<MemorySink>) {
        let registry = Arc::new(Registry::new());
        for checker in checkers {
            registry.register(Arc::new(checker)).unwrap();
        }
        let sink = Arc::new(MemorySink::new());
        (Merger::new(registry, sink.clone()), sink)
    }

    fn labels(candidates: &[SuggestionCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.label()).collect()
    }

    fn meta() -> DocumentMeta {
        DocumentMeta::unsaved(DocumentId::next())
    }

    #[test]
    fn test_interleaves_by_priority_plus_rank() {
        let merger = merger(vec![
            StubChecker::new("p2", 1).suggesting(&["alpha", "beta"]),
            StubChecker::new("p1", 0).suggesting(&["zeta"]),
        ]);

        let candidates = merger.suggest(&meta(), "zeat");
        assert_eq!(labels(&candidates), vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn test_ties_break_alphabetically_case_sensitive() {
        let merger = merger(vec![
            StubChecker::new("a", 0).suggesting(&["b", "z"]),
            StubChecker::new("b", 1).suggesting(&["Y"]),
        ]);

        // "z" (0+1) and "Y" (1+0) tie; uppercase sorts first.
        let candidates = merger.suggest(&meta(), "x");
        assert_eq!(labels(&candidates), vec!["b", "Y", "z"]);
    }

    #[test]
    fn test_duplicates_keep_first_ranked_occurrence() {
        let merger = merger(vec![
            StubChecker::new("a", 0).suggesting(&["togather", "together"]),
            StubChecker::new("b", 0).suggesting(&["together"]),
        ]);

        let candidates = merger.suggest(&meta(), "togehter");
        assert_eq!(labels(&candidates), vec!["togather", "together"]);

        // The surviving "together" is checker b's top pick, not a's second one.
        match &candidates[1] {
            SuggestionCandidate::Replacement(r) => assert_eq!(r.rank, 0),
            other => panic!("unexpected candidate {:?}", other),
        }
    }

    #[test]
    fn test_actions_follow_replacements_in_priority_order() {
        let merger = merger(vec![
            StubChecker::new("late", 50).adding(),
            StubChecker::new("words", 10).suggesting(&["word"]).adding(),
            StubChecker::new("off", 0).adding().disabled(),
        ]);

        let candidates = merger.suggest(&meta(), "wrod");
        assert_eq!(
            labels(&candidates),
            vec!["word", "Add to words", "Add to late"]
        );

        match &candidates[1] {
            SuggestionCandidate::Action(action) => {
                assert_eq!(action.word, "wrod");
                assert_eq!(action.checker_id(), "words");
            }
            other => panic!("unexpected candidate {:?}", other),
        }
    }

    #[test]
    fn test_failing_suggester_is_reported_and_skipped() {
        let (merger, sink) = merger_with_sink(vec![
            StubChecker::new("broken", 0).faulty(Fault::Error),
            StubChecker::new("locale", 1).suggesting(&["word", "ward"]),
        ]);

        let candidates = merger.suggest(&meta(), "wrod");
        assert_eq!(labels(&candidates), vec!["word", "ward"]);

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("broken suggest failed"));
    }

    #[test]
    fn test_panicking_suggester_is_reported_and_skipped() {
        let (merger, sink) = merger_with_sink(vec![
            StubChecker::new("plugin", 0).faulty(Fault::Panic).adding(),
            StubChecker::new("locale", 1).suggesting(&["word"]),
        ]);

        let candidates = merger.suggest(&meta(), "wrod");
        assert_eq!(labels(&candidates), vec!["word", "Add to plugin"]);

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("panicked: plugin suggest bug"));
    }

    #[test]
    fn test_unsupported_add_reports_error() {
        let merger = merger(vec![StubChecker::new("words", 10).adding()]);
        let candidates = merger.suggest(&meta(), "wrod");

        let SuggestionCandidate::Action(action) = &candidates[0] else {
            panic!("expected an action");
        };
        assert!(matches!(
            action.execute(&meta()),
            Err(CheckerError::AddNotSupported)
        ));
    }
}
