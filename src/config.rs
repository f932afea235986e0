use crate::error::Error;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const LOCAL_CONFIG_FILE: &str = ".spellmux.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Words that are always correct; all-lowercase entries ignore case
    pub known_words: Vec<String>,

    /// Offer "Add to Known Words" for misspellings
    pub add_known_words: bool,

    pub personal_dictionary: Option<PathBuf>,

    /// Extra regexes whose matches are never misspellings
    pub ignore_patterns: Vec<String>,

    /// Include the built-in URL, e-mail, hash and ALL_CAPS patterns
    pub default_ignore_patterns: bool,

    /// Skip code and HTML in markdown files
    pub markdown: bool,

    pub plugins: Vec<PluginConfig>,

    pub max_suggestions: usize,

    pub enable_debug: bool,
}

/// An external checker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub id: String,
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Arguments for suggestion lookups; the word is appended last
    #[serde(default)]
    pub suggest_args: Option<Vec<String>>,

    #[serde(default = "default_plugin_priority")]
    pub priority: i32,

    /// Only check files with these extensions; empty means all
    #[serde(default)]
    pub extensions: Vec<String>,
}

fn default_max_suggestions() -> usize {
    5
}

fn default_plugin_priority() -> i32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            known_words: Vec::new(),
            add_known_words: false,
            personal_dictionary: None,
            ignore_patterns: Vec::new(),
            default_ignore_patterns: true,
            markdown: true,
            plugins: Vec::new(),
            max_suggestions: default_max_suggestions(),
            enable_debug: false,
        }
    }
}

impl Config {
    /// Load configuration with priority: CLI args > local config > global config > defaults
    pub fn load(
        personal_dict: Option<PathBuf>,
        cli_patterns: Vec<String>,
        debug: bool,
    ) -> Result<Self> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            Path::new(LOCAL_CONFIG_FILE),
            personal_dict,
            cli_patterns,
            debug,
        )
    }

    pub fn load_from(
        global_path: Option<&Path>,
        local_path: &Path,
        personal_dict: Option<PathBuf>,
        cli_patterns: Vec<String>,
        debug: bool,
    ) -> Result<Self> {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = global_path {
            if global_path.exists() {
                let global_config = Self::from_file(global_path)?;
                config = config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if local_path.exists() {
            let local_config = Self::from_file(local_path)?;
            config = config.merge(local_config);
        }

        // Apply CLI overrides
        if let Some(dict) = personal_dict {
            config.personal_dictionary = Some(dict);
        }
        config.ignore_patterns.extend(cli_patterns);
        config.enable_debug |= debug;

        // Set default personal dictionary if not specified
        if config.personal_dictionary.is_none() {
            config.personal_dictionary = Self::default_personal_dict_path();
        }

        // Ensure personal dictionary file exists
        if let Some(path) = &config.personal_dictionary {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .context("Failed to create personal dictionary directory")?;
            }
            if !path.exists() {
                fs::write(path, "").context("Failed to create personal dictionary file")?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn merge(mut self, other: Self) -> Self {
        // Merge logic: other's values override self's if they differ from defaults
        let defaults = Self::default();

        for word in other.known_words {
            if !self.known_words.contains(&word) {
                self.known_words.push(word);
            }
        }
        if other.add_known_words != defaults.add_known_words {
            self.add_known_words = other.add_known_words;
        }
        if other.personal_dictionary.is_some() {
            self.personal_dictionary = other.personal_dictionary;
        }
        self.ignore_patterns.extend(other.ignore_patterns);
        if other.default_ignore_patterns != defaults.default_ignore_patterns {
            self.default_ignore_patterns = other.default_ignore_patterns;
        }
        if other.markdown != defaults.markdown {
            self.markdown = other.markdown;
        }
        for plugin in other.plugins {
            match self.plugins.iter_mut().find(|p| p.id == plugin.id) {
                Some(existing) => *existing = plugin,
                None => self.plugins.push(plugin),
            }
        }
        if other.max_suggestions != defaults.max_suggestions {
            self.max_suggestions = other.max_suggestions;
        }
        self.enable_debug |= other.enable_debug;
        self
    }

    /// Reject plugin entries that can never work
    pub fn validate(&self) -> Result<(), Error> {
        for (index, plugin) in self.plugins.iter().enumerate() {
            if plugin.id.trim().is_empty() {
                return Err(Error::Config(format!("plugin #{} has no id", index + 1)));
            }
            if plugin.command.trim().is_empty() {
                return Err(Error::Config(format!("plugin `{}` has no command", plugin.id)));
            }
            if self.plugins[..index].iter().any(|p| p.id == plugin.id) {
                return Err(Error::Config(format!(
                    "plugin id `{}` is used more than once",
                    plugin.id
                )));
            }
        }
        Ok(())
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "spellmux")
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn default_personal_dict_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("personal.txt"))
    }
}
