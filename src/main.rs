use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use spellmux::checker::known_words;
use spellmux::cli::output::{self, OutputFormat};
use spellmux::{cli, Checker, Config, DocumentId, DocumentMeta, Engine, LogSink};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spellmux")]
#[command(version, about = "Spell checking by consensus of pluggable checkers", long_about = None)]
struct Cli {
    /// Files or directories to check
    #[arg(value_name = "PATHS")]
    paths: Vec<PathBuf>,

    /// Interactive mode for selecting corrections
    #[arg(short, long, conflicts_with = "format")]
    interactive: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Exit with code 0 even if errors are found
    #[arg(long)]
    no_fail: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long)]
    format: Option<OutputFormat>,

    /// Pattern to ignore (regex)
    #[arg(long)]
    ignore_pattern: Vec<String>,

    /// Personal dictionary file
    #[arg(long, env = "SPELLMUX_PERSONAL_DICT")]
    personal_dict: Option<PathBuf>,

    /// Log checker evidence and queue activity to stderr
    #[arg(long)]
    debug: bool,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completion: Option<Shell>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show merged suggestions for a word
    Suggest {
        word: String,
    },
    /// Add a word to the personal dictionary
    Add {
        word: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle shell completion generation
    if let Some(shell) = cli.completion {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "spellmux", &mut io::stdout());
        return Ok(());
    }

    // Load configuration
    let config = Config::load(
        cli.personal_dict.clone(),
        cli.ignore_pattern.clone(),
        cli.debug,
    )?;

    let filter = if config.enable_debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let colored = !cli.no_color && Term::stdout().is_term();
    let engine = Engine::with_config(&config, Arc::new(LogSink))?;
    for checker in engine.registry().snapshot().iter() {
        debug!(checker = checker.id(), priority = checker.priority(), status = %checker.status(), "checker loaded");
    }

    // Handle subcommands
    if let Some(command) = cli.command {
        return handle_command(command, &engine, &config, colored);
    }

    // Validate input paths
    if cli.paths.is_empty() {
        anyhow::bail!("No paths specified. Use --help for usage information.");
    }
    if cli.interactive && !Term::stdout().is_term() {
        anyhow::bail!("Interactive mode needs a terminal.");
    }

    let mut paths = Vec::new();
    for path in &cli.paths {
        if path.exists() {
            paths.push(path.clone());
        } else {
            eprintln!("Error: File not found: {}", path.display());
        }
    }

    let files = cli::collect_files(&paths);
    let roots = vec![std::env::current_dir().context("Failed to get current directory")?];
    let format = cli.format.unwrap_or(OutputFormat::Text);

    let progress = if format == OutputFormat::Text && !cli.interactive && Term::stderr().is_term()
    {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
                .progress_chars("#>-"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    // Process files
    let mut reports = Vec::new();
    let mut total_errors = 0;
    let mut total_fixed = 0;

    for file in &files {
        progress.set_message(file.display().to_string());
        let absolute = roots[0].join(file);
        let meta = DocumentMeta::relativize(DocumentId::next(), &roots, &absolute);

        let report = match cli::check_file(&engine, meta, file, config.max_suggestions).await {
            Ok(report) => report,
            Err(error) => {
                progress.suspend(|| eprintln!("Error: {:#}", error));
                progress.inc(1);
                continue;
            }
        };
        progress.inc(1);
        total_errors += report.misspellings.len();

        if cli.interactive {
            let (fixed, quit) = cli::fix_interactive(&engine, &report, colored)?;
            total_fixed += fixed;
            if quit {
                break;
            }
        } else if format == OutputFormat::Text {
            progress.suspend(|| output::print_text_errors(&report, colored));
        }

        reports.push(report);
    }
    progress.finish_and_clear();

    // Print summary
    match format {
        _ if cli.interactive => output::print_fix_summary(total_fixed, reports.len(), colored),
        OutputFormat::Json => output::print_json_errors(&reports)?,
        OutputFormat::Text => output::print_check_summary(total_errors, reports.len(), colored),
    }

    // Exit with appropriate code
    if total_errors > 0 && !cli.no_fail && !cli.interactive {
        std::process::exit(1);
    }

    Ok(())
}

fn handle_command(command: Commands, engine: &Engine, config: &Config, colored: bool) -> Result<()> {
    match command {
        Commands::Suggest { word } => {
            let meta = DocumentMeta::unsaved(DocumentId::next());
            let candidates = engine.suggest(&meta, &word);
            output::print_suggestions(&word, &candidates, colored);
        }
        Commands::Add { word } => {
            let path = config
                .personal_dictionary
                .as_deref()
                .context("No personal dictionary configured")?;
            known_words::append_word(path, &word).with_context(|| {
                format!("Failed to update personal dictionary: {}", path.display())
            })?;
            println!("Added {} to {}", word, path.display());
        }
    }
    Ok(())
}
