use crate::checker::{
    known_words, markdown, patterns, Checker, CommandChecker, KnownWordsChecker, MarkdownChecker,
    PatternChecker, Registry,
};
use crate::config::{Config, PluginConfig};
use crate::error::Error;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registers the built-in and plugin checkers a [`Config`] asks for.
///
/// Each call to [`apply`](CheckerManager::apply) only re-creates the checkers
/// whose settings changed since the previous call.
pub struct CheckerManager {
    registry: Arc<Registry>,
    applied: Option<Config>,
    /// Ids of the checkers this manager put into the registry
    owned: Vec<String>,
}

impl CheckerManager {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            applied: None,
            owned: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Bring the registry in line with `config`.
    ///
    /// On error every checker this manager registered is removed again, and
    /// the next call starts from an empty slate.
    pub fn apply(&mut self, config: &Config) -> Result<(), Error> {
        let previous = self.applied.take();

        if let Err(error) = self.reconcile(previous.as_ref(), config) {
            warn!(%error, "failed to apply checker configuration");
            self.unregister_owned();
            return Err(error);
        }

        info!(checkers = ?self.registry.ids(), "checkers configured");
        self.applied = Some(config.clone());
        Ok(())
    }

    fn reconcile(&mut self, previous: Option<&Config>, config: &Config) -> Result<(), Error> {
        // Known words, adding and the personal dictionary
        if previous.map_or(true, |p| {
            p.known_words != config.known_words
                || p.add_known_words != config.add_known_words
                || p.personal_dictionary != config.personal_dictionary
        }) {
            self.unregister(known_words::ID);
            let mut checker = KnownWordsChecker::new(&config.known_words)
                .with_adding(config.add_known_words);
            if let Some(path) = &config.personal_dictionary {
                checker = checker.with_personal_dictionary(path.clone()).map_err(|e| {
                    Error::Config(format!(
                        "cannot read personal dictionary {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            }
            debug!(words = checker.len(), adding = config.add_known_words, "known words changed");
            self.register(Arc::new(checker))?;
        }

        // Ignore patterns
        if previous.map_or(true, |p| {
            p.ignore_patterns != config.ignore_patterns
                || p.default_ignore_patterns != config.default_ignore_patterns
        }) {
            self.unregister(patterns::ID);
            let checker =
                PatternChecker::new(&config.ignore_patterns, config.default_ignore_patterns);
            self.register(Arc::new(checker))?;
        }

        // Markdown
        if previous.map_or(true, |p| p.markdown != config.markdown) {
            self.unregister(markdown::ID);
            if config.markdown {
                self.register(Arc::new(MarkdownChecker::new()))?;
            }
        }

        // Plugins, by id
        let old_plugins: &[PluginConfig] = previous.map_or(&[], |p| &p.plugins);
        for old in old_plugins {
            if !config.plugins.contains(old) {
                debug!(plugin = %old.id, "removing plugin");
                self.unregister(&old.id);
            }
        }
        for plugin in &config.plugins {
            if !old_plugins.contains(plugin) {
                debug!(plugin = %plugin.id, command = %plugin.command, "adding plugin");
                self.register(Arc::new(CommandChecker::new(plugin.clone())))?;
            }
        }

        Ok(())
    }

    fn register(&mut self, checker: Arc<dyn Checker>) -> Result<(), Error> {
        let id = checker.id().to_string();
        self.registry.register(checker)?;
        self.owned.push(id);
        Ok(())
    }

    fn unregister(&mut self, id: &str) {
        if let Some(index) = self.owned.iter().position(|owned| owned == id) {
            self.owned.remove(index);
            self.registry.unregister(id);
        }
    }

    fn unregister_owned(&mut self) {
        for id in self.owned.drain(..) {
            self.registry.unregister(&id);
        }
    }

    /// Unregister everything this manager registered
    pub fn deactivate(&mut self) {
        self.applied = None;
        self.unregister_owned();
        debug!("checker manager deactivated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::registry::tests::StubChecker;
    use pretty_assertions::assert_eq;

    fn plugin(id: &str, command: &str) -> PluginConfig {
        PluginConfig {
            id: id.to_string(),
            command: command.to_string(),
            args: Vec::new(),
            suggest_args: None,
            priority: 100,
            extensions: Vec::new(),
        }
    }

    fn manager() -> CheckerManager {
        CheckerManager::new(Arc::new(Registry::new()))
    }

    fn same_instance(before: &Arc<dyn crate::Checker>, registry: &Registry, id: &str) -> bool {
        registry
            .get(id)
            .map_or(false, |after| Arc::ptr_eq(before, &after))
    }

    #[test]
    fn test_default_config_registers_builtins() {
        let mut manager = manager();
        manager.apply(&Config::default()).unwrap();
        assert_eq!(
            manager.registry().ids(),
            vec![known_words::ID, patterns::ID, markdown::ID]
        );
    }

    #[test]
    fn test_only_changed_checkers_are_recreated() {
        let mut manager = manager();
        let mut config = Config::default();
        manager.apply(&config).unwrap();

        let registry = Arc::clone(manager.registry());
        let words = registry.get(known_words::ID).unwrap();
        let patterns_before = registry.get(patterns::ID).unwrap();

        manager.apply(&config).unwrap();
        assert!(same_instance(&words, &registry, known_words::ID));
        assert!(same_instance(&patterns_before, &registry, patterns::ID));

        config.ignore_patterns.push("foo".to_string());
        manager.apply(&config).unwrap();
        assert!(same_instance(&words, &registry, known_words::ID));
        assert!(!same_instance(&patterns_before, &registry, patterns::ID));
    }

    #[test]
    fn test_markdown_toggle() {
        let mut manager = manager();
        let mut config = Config::default();
        manager.apply(&config).unwrap();

        config.markdown = false;
        manager.apply(&config).unwrap();
        assert!(manager.registry().get(markdown::ID).is_none());

        config.markdown = true;
        manager.apply(&config).unwrap();
        assert!(manager.registry().get(markdown::ID).is_some());
    }

    #[test]
    fn test_plugins_are_diffed_by_id() {
        let mut manager = manager();
        let mut config = Config {
            plugins: vec![plugin("a", "one"), plugin("b", "two")],
            ..Default::default()
        };
        manager.apply(&config).unwrap();
        let registry = Arc::clone(manager.registry());
        let a = registry.get("a").unwrap();
        let b = registry.get("b").unwrap();

        config.plugins = vec![plugin("a", "one"), plugin("b", "three"), plugin("c", "four")];
        manager.apply(&config).unwrap();
        assert!(same_instance(&a, &registry, "a"));
        assert!(!same_instance(&b, &registry, "b"));
        assert!(registry.get("c").is_some());

        config.plugins.remove(0);
        manager.apply(&config).unwrap();
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_plugin_id_clash_is_rejected() {
        let mut manager = manager();
        let config = Config {
            plugins: vec![plugin(markdown::ID, "x")],
            ..Default::default()
        };
        assert!(matches!(
            manager.apply(&config),
            Err(Error::DuplicateChecker(id)) if id == markdown::ID
        ));
    }

    #[test]
    fn test_failed_apply_leaves_room_for_a_corrected_config() {
        let mut manager = manager();
        let registry = Arc::clone(manager.registry());
        registry
            .register(Arc::new(StubChecker::new("word-list", 100)))
            .unwrap();

        let bad = Config {
            plugins: vec![plugin("a", "one"), plugin(markdown::ID, "two")],
            ..Default::default()
        };
        assert!(manager.apply(&bad).is_err());
        assert_eq!(registry.ids(), vec!["word-list"]);

        let clashing = Config {
            plugins: vec![plugin("word-list", "three")],
            ..Default::default()
        };
        assert!(matches!(
            manager.apply(&clashing),
            Err(Error::DuplicateChecker(id)) if id == "word-list"
        ));
        assert_eq!(registry.ids(), vec!["word-list"]);

        let good = Config {
            plugins: vec![plugin("a", "one")],
            ..Default::default()
        };
        manager.apply(&good).unwrap();
        assert_eq!(
            registry.ids(),
            vec!["word-list", known_words::ID, patterns::ID, markdown::ID, "a"]
        );
    }

    #[test]
    fn test_deactivate_removes_everything() {
        let mut manager = manager();
        let config = Config {
            plugins: vec![plugin("a", "one")],
            ..Default::default()
        };
        manager.apply(&config).unwrap();
        manager.deactivate();
        assert!(manager.registry().is_empty());
    }
}
