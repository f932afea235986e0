pub mod output;

use crate::document::DocumentMeta;
use crate::engine::Engine;
use crate::merger::SuggestionCandidate;
use crate::MisspellingSpan;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use output::Choice;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One flagged word with what the CLI shows for it.
#[derive(Debug, Clone)]
pub struct Misspelling {
    pub span: MisspellingSpan,
    pub word: String,
    pub context: String,
    pub suggestions: Vec<String>,
}

impl Misspelling {
    /// 1-indexed line
    pub fn line(&self) -> usize {
        self.span.start.row + 1
    }

    /// 1-indexed column
    pub fn column(&self) -> usize {
        self.span.start.column + 1
    }
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub meta: DocumentMeta,
    pub content: String,
    pub misspellings: Vec<Misspelling>,
}

/// Expand directories into the files they contain, honoring ignore files.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }

        for entry in WalkBuilder::new(path).build() {
            match entry {
                Ok(entry) if entry.file_type().map_or(false, |t| t.is_file()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(error) => warn!(%error, "skipping unreadable path"),
            }
        }
    }

    files
}

/// Check one file through the scheduler, as the active document.
pub async fn check_file(
    engine: &Engine,
    meta: DocumentMeta,
    path: &Path,
    max_suggestions: usize,
) -> Result<FileReport> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    engine.set_active(Some(meta.id));
    let spans = engine
        .request(&meta, content.as_str())
        .await
        .with_context(|| format!("Failed to check file: {}", path.display()))?;
    debug!(file = %path.display(), misspellings = spans.len(), "checked file");

    let lines: Vec<&str> = content.lines().collect();
    let misspellings = spans
        .into_iter()
        .filter_map(|span| {
            let word = span.word(&lines)?.to_string();
            let suggestions = engine
                .suggest(&meta, &word)
                .iter()
                .filter_map(SuggestionCandidate::as_replacement)
                .take(max_suggestions)
                .map(str::to_string)
                .collect();
            Some(Misspelling {
                span,
                context: lines[span.start.row].trim().to_string(),
                word,
                suggestions,
            })
        })
        .collect();

    Ok(FileReport {
        path: path.to_path_buf(),
        meta,
        content,
        misspellings,
    })
}

/// Walk the user through every misspelling and write accepted replacements.
///
/// Returns the number of corrections applied and whether the user quit.
pub fn fix_interactive(engine: &Engine, report: &FileReport, colored: bool) -> Result<(usize, bool)> {
    let mut replacements = Vec::new();
    let mut added = 0;
    let mut quit = false;

    for error in &report.misspellings {
        let candidates = engine.suggest(&report.meta, &error.word);
        let choice = output::prompt_choice(
            &error.word,
            &error.context,
            error.line(),
            error.column(),
            &candidates,
            colored,
        )?;

        match choice {
            Choice::Skip => {}
            Choice::Quit => {
                quit = true;
                break;
            }
            Choice::Candidate(index) => match &candidates[index] {
                SuggestionCandidate::Replacement(r) => {
                    replacements.push((error.span, r.suggestion.clone()));
                }
                SuggestionCandidate::Action(action) => {
                    action.execute(&report.meta).with_context(|| {
                        format!("Failed to run `{}` for {}", action.label, error.word)
                    })?;
                    added += 1;
                }
            },
        }
    }

    if !replacements.is_empty() {
        let fixed = apply_replacements(&report.content, &replacements);
        fs::write(&report.path, fixed)
            .with_context(|| format!("Failed to write file: {}", report.path.display()))?;
    }

    Ok((replacements.len() + added, quit))
}

/// Replace each span's text; spans must be single-line.
pub fn apply_replacements(content: &str, replacements: &[(MisspellingSpan, String)]) -> String {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    let mut ordered: Vec<&(MisspellingSpan, String)> = replacements.iter().collect();
    // Right to left so earlier columns stay valid.
    ordered.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    for (span, replacement) in ordered {
        let Some(line) = lines.get_mut(span.start.row) else {
            continue;
        };
        let mut offsets = line
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(line.len()));
        let start = offsets.nth(span.start.column);
        let end = start
            .and_then(|_| span.end.column.checked_sub(span.start.column + 1))
            .and_then(|n| offsets.nth(n));
        if let (Some(start), Some(end)) = (start, end) {
            line.replace_range(start..end, replacement);
        }
    }

    lines.join("\n")
}
