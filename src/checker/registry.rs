use crate::checker::Checker;
use crate::error::Error;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Ordered list of active checkers.
///
/// Readers take a [`snapshot`](Registry::snapshot) and keep it for a whole
/// pass, so registrations that happen mid-pass never affect that pass.
pub struct Registry {
    checkers: RwLock<Arc<[Arc<dyn Checker>]>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            checkers: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Add a checker after validating it once
    pub fn register(&self, checker: Arc<dyn Checker>) -> Result<(), Error> {
        let id = checker.id().trim();
        if id.is_empty() {
            return Err(Error::InvalidChecker(format!(
                "checker `{}` has an empty id",
                checker.name()
            )));
        }

        let mut guard = self.checkers.write();
        if guard.iter().any(|c| c.id() == id) {
            return Err(Error::DuplicateChecker(id.to_string()));
        }

        debug!(checker = id, priority = checker.priority(), "registering checker");
        let mut next: Vec<Arc<dyn Checker>> = guard.iter().cloned().collect();
        next.push(checker);
        *guard = Arc::from(next);
        Ok(())
    }

    /// Remove the checker with `id`, returning it if it was registered
    pub fn unregister(&self, id: &str) -> Option<Arc<dyn Checker>> {
        let mut guard = self.checkers.write();
        let position = guard.iter().position(|c| c.id() == id)?;

        debug!(checker = id, "unregistering checker");
        let mut next: Vec<Arc<dyn Checker>> = guard.iter().cloned().collect();
        let removed = next.remove(position);
        *guard = Arc::from(next);
        Some(removed)
    }

    pub fn snapshot(&self) -> Arc<[Arc<dyn Checker>]> {
        Arc::clone(&self.checkers.read())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Checker>> {
        self.checkers.read().iter().find(|c| c.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.checkers
            .read()
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.checkers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
