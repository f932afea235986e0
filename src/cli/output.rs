use crate::cli::FileReport;
use crate::merger::SuggestionCandidate;
use crate::Point;
use anyhow::Result;
use colored::*;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonError<'a> {
    file: String,
    line: usize,
    column: usize,
    start: Point,
    end: Point,
    word: &'a str,
    suggestions: &'a [String],
    context: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    files_checked: usize,
    total_errors: usize,
    errors: Vec<JsonError<'a>>,
}

pub fn print_text_errors(report: &FileReport, colored_output: bool) {
    if report.misspellings.is_empty() {
        return;
    }

    let file_name = report.path.display().to_string();

    if colored_output {
        println!("\n{}", file_name.bold().underline());
    } else {
        println!("\n{}", file_name);
    }

    for error in &report.misspellings {
        let line_info = format!("{}:{}", error.line(), error.column());

        if colored_output {
            println!(
                "  {} {} {}",
                line_info.blue().bold(),
                error.word.red().bold(),
                format_context(&error.context, &error.word, colored_output)
            );

            if !error.suggestions.is_empty() {
                let suggestions = error
                    .suggestions
                    .iter()
                    .map(|s| s.green().to_string())
                    .collect::<Vec<_>>()
                    .join(&", ".dimmed().to_string());
                println!("    {} {}", "→".dimmed(), suggestions);
            }
        } else {
            println!("  {} {} {}", line_info, error.word, &error.context);

            if !error.suggestions.is_empty() {
                println!("    → {}", error.suggestions.join(", "));
            }
        }
    }
}

/// All reports as a single JSON document
pub fn print_json_errors(reports: &[FileReport]) -> Result<()> {
    let errors: Vec<JsonError> = reports
        .iter()
        .flat_map(|report| {
            report.misspellings.iter().map(move |e| JsonError {
                file: report.path.display().to_string(),
                line: e.line(),
                column: e.column(),
                start: e.span.start,
                end: e.span.end,
                word: &e.word,
                suggestions: &e.suggestions,
                context: &e.context,
            })
        })
        .collect();

    let output = JsonOutput {
        files_checked: reports.len(),
        total_errors: errors.len(),
        errors,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn format_context(context: &str, word: &str, colored: bool) -> String {
    if colored {
        context.replace(word, &word.red().bold().to_string())
    } else {
        context.to_string()
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

pub fn print_check_summary(total_errors: usize, files_checked: usize, colored: bool) {
    println!();
    if total_errors == 0 {
        if colored {
            println!("{}", "✓ No spelling errors found!".green().bold());
        } else {
            println!("✓ No spelling errors found!");
        }
    } else {
        let error_word = plural(total_errors, "error", "errors");
        let file_word = plural(files_checked, "file", "files");
        if colored {
            println!(
                "{} {} {} found in {} {}",
                "✗".red().bold(),
                total_errors.to_string().red().bold(),
                error_word,
                files_checked,
                file_word
            );
        } else {
            println!(
                "✗ {} {} found in {} {}",
                total_errors, error_word, files_checked, file_word
            );
        }
    }
}

pub fn print_fix_summary(total_fixed: usize, files_checked: usize, colored: bool) {
    println!();
    if total_fixed == 0 {
        if colored {
            println!("{}", "No corrections applied.".green().bold());
        } else {
            println!("No corrections applied.");
        }
    } else {
        let fix_word = plural(total_fixed, "correction", "corrections");
        let file_word = plural(files_checked, "file", "files");
        if colored {
            println!(
                "{} {} {} applied to {} {}",
                "✓".green().bold(),
                total_fixed.to_string().green().bold(),
                fix_word,
                files_checked,
                file_word
            );
        } else {
            println!(
                "✓ {} {} applied to {} {}",
                total_fixed, fix_word, files_checked, file_word
            );
        }
    }
}

/// Merged candidates for `word`, replacements numbered and actions after them
pub fn print_suggestions(word: &str, candidates: &[SuggestionCandidate], colored: bool) {
    if candidates.is_empty() {
        if colored {
            println!("{} {}", "No suggestions for".yellow(), word.bold());
        } else {
            println!("No suggestions for {}", word);
        }
        return;
    }

    for (i, candidate) in candidates.iter().enumerate() {
        match candidate {
            SuggestionCandidate::Replacement(r) if colored => {
                println!("  [{}] {}", i + 1, r.suggestion.green())
            }
            SuggestionCandidate::Replacement(r) => println!("  [{}] {}", i + 1, r.suggestion),
            SuggestionCandidate::Action(a) if colored => {
                println!("  [{}] {}", i + 1, a.label.cyan())
            }
            SuggestionCandidate::Action(a) => println!("  [{}] {}", i + 1, a.label),
        }
    }
}

/// What the user picked for one misspelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Skip,
    Quit,
    Candidate(usize),
}

pub fn prompt_choice(
    word: &str,
    context: &str,
    line: usize,
    column: usize,
    candidates: &[SuggestionCandidate],
    colored: bool,
) -> Result<Choice> {
    if colored {
        println!(
            "\n{} {}:{}",
            "Misspelling found:".yellow().bold(),
            line.to_string().blue(),
            column.to_string().blue()
        );
    } else {
        println!("\nMisspelling found: {}:{}", line, column);
    }
    println!("  {}", format_context(context, word, colored));

    let mut items: Vec<&str> = vec!["Skip"];
    items.extend(candidates.iter().map(|c| c.label()));
    items.push("Quit");

    let picked = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Replace `{}` with", word))
        .items(&items)
        .default(0)
        .interact_opt()?;

    Ok(match picked {
        None => Choice::Quit,
        Some(0) => Choice::Skip,
        Some(i) if i == items.len() - 1 => Choice::Quit,
        Some(i) => Choice::Candidate(i - 1),
    })
}
