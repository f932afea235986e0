use crate::checker::{byte_ranges_to_chars, AddingTarget, Checker, Judgment};
use crate::document::DocumentMeta;
use crate::error::CheckerError;
use futures_util::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

pub const ID: &str = "known-words";

#[derive(Debug, Default)]
struct WordList {
    /// Entries with capitals; matched exactly
    sensitive: HashSet<String>,
    /// All-lowercase entries; matched ignoring case
    insensitive: HashSet<String>,
    entries: Vec<String>,
}

impl WordList {
    fn insert(&mut self, word: &str) -> bool {
        let word = word.trim();
        if word.is_empty() {
            return false;
        }

        let lower = word.to_lowercase();
        let inserted = if lower == word {
            self.insensitive.insert(lower)
        } else {
            self.sensitive.insert(word.to_string())
        };
        if inserted {
            self.entries.push(word.to_string());
        }
        inserted
    }

    fn contains(&self, token: &str) -> bool {
        self.sensitive.contains(token) || self.insensitive.contains(&token.to_lowercase())
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Marks words from the user's own word list as correct.
pub struct KnownWordsChecker {
    words: RwLock<WordList>,
    add_enabled: bool,
    personal_dictionary: Option<PathBuf>,
}

impl KnownWordsChecker {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = WordList::default();
        for word in words {
            list.insert(word.as_ref());
        }
        Self {
            words: RwLock::new(list),
            add_enabled: false,
            personal_dictionary: None,
        }
    }

    /// Offer the "Add to Known Words" action
    pub fn with_adding(mut self, enabled: bool) -> Self {
        self.add_enabled = enabled;
        self
    }

    /// Load words from `path` and append added words to it.
    ///
    /// A missing file is treated as empty.
    pub fn with_personal_dictionary(mut self, path: PathBuf) -> Result<Self, CheckerError> {
        if path.exists() {
            let loaded = load_word_list(&path)?;
            debug!(path = %path.display(), words = loaded.len(), "loaded personal dictionary");
            let mut list = self.words.write();
            for word in &loaded {
                list.insert(word);
            }
        }
        self.personal_dictionary = Some(path);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.words.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.read().is_empty()
    }

    pub fn is_known(&self, word: &str) -> bool {
        self.words.read().contains(word)
    }

    fn known_ranges(&self, text: &str) -> Vec<std::ops::Range<usize>> {
        let words = self.words.read();
        let bytes = text
            .split_word_bound_indices()
            .filter(|(_, token)| token.chars().any(char::is_alphanumeric))
            .filter(|(_, token)| words.contains(token))
            .map(|(offset, token)| offset..offset + token.len());
        byte_ranges_to_chars(text, bytes)
    }
}

impl Checker for KnownWordsChecker {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Known Words"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_enabled(&self) -> bool {
        self.add_enabled || !self.is_empty()
    }

    fn provides_spelling(&self, _meta: &DocumentMeta) -> bool {
        true
    }

    fn provides_suggestions(&self, _meta: &DocumentMeta) -> bool {
        true
    }

    fn provides_adding(&self, _meta: &DocumentMeta) -> bool {
        self.add_enabled
    }

    fn check<'a>(
        &'a self,
        _meta: &'a DocumentMeta,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Judgment, CheckerError>> {
        future::ready(Ok(Judgment::correct(self.known_ranges(text)))).boxed()
    }

    fn suggest(&self, _meta: &DocumentMeta, word: &str) -> Result<Vec<String>, CheckerError> {
        let lower = word.to_lowercase();
        let words = self.words.read();
        Ok(words
            .entries
            .iter()
            .filter(|entry| entry.as_str() != word && entry.to_lowercase() == lower)
            .cloned()
            .collect())
    }

    fn adding_targets(&self, _meta: &DocumentMeta) -> Vec<AddingTarget> {
        if !self.add_enabled {
            return Vec::new();
        }
        vec![AddingTarget {
            label: format!("Add to {}", self.name()),
        }]
    }

    fn add(
        &self,
        _meta: &DocumentMeta,
        _target: &AddingTarget,
        word: &str,
    ) -> Result<(), CheckerError> {
        if !self.add_enabled {
            return Err(CheckerError::AddNotSupported);
        }

        if !self.words.write().insert(word) {
            return Ok(());
        }
        if let Some(path) = &self.personal_dictionary {
            append_word(path, word)?;
        }
        debug!(word, "added known word");
        Ok(())
    }
}

/// Words from a personal dictionary file, one per line; `#` starts a comment line.
pub fn load_word_list(path: &Path) -> io::Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Append `word` to a personal dictionary file, creating it if needed.
pub fn append_word(path: &Path, word: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", word.trim())
}
