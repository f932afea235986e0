use crate::aggregator::Aggregator;
use crate::checker::Registry;
use crate::config::Config;
use crate::diagnostics::DiagnosticSink;
use crate::document::{DocumentId, DocumentMeta};
use crate::error::Error;
use crate::manager::CheckerManager;
use crate::merger::{Merger, SuggestionCandidate};
use crate::scheduler::Scheduler;
use crate::MisspellingSpan;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// One registry shared by the aggregator, merger, scheduler and manager.
pub struct Engine {
    registry: Arc<Registry>,
    aggregator: Arc<Aggregator>,
    merger: Merger,
    scheduler: Scheduler,
    manager: Mutex<CheckerManager>,
}

impl Engine {
    /// Build an engine with an empty registry.
    ///
    /// Spawns the scheduler worker, so it must be called inside a tokio runtime.
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        let registry = Arc::new(Registry::new());
        let aggregator = Arc::new(Aggregator::new(Arc::clone(&registry), Arc::clone(&sink)));
        let merger = Merger::new(Arc::clone(&registry), Arc::clone(&sink));
        let scheduler = Scheduler::spawn(Arc::clone(&aggregator), sink);
        let manager = Mutex::new(CheckerManager::new(Arc::clone(&registry)));

        Self {
            registry,
            aggregator,
            merger,
            scheduler,
            manager,
        }
    }

    /// Build an engine with the checkers `config` describes
    pub fn with_config(config: &Config, sink: Arc<dyn DiagnosticSink>) -> Result<Self, Error> {
        let engine = Self::new(sink);
        engine.apply_config(config)?;
        Ok(engine)
    }

    pub fn apply_config(&self, config: &Config) -> Result<(), Error> {
        self.manager.lock().apply(config)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run one aggregation pass directly, outside the job queue
    pub async fn check_now(&self, meta: &DocumentMeta, text: &str) -> Vec<MisspellingSpan> {
        self.aggregator.check(meta, text).await
    }

    /// Queue a check through the scheduler
    pub fn request(
        &self,
        meta: &DocumentMeta,
        text: impl Into<Arc<str>>,
    ) -> impl Future<Output = Result<Vec<MisspellingSpan>, Error>> + Send + 'static {
        self.scheduler.request(meta, text)
    }

    pub fn suggest(&self, meta: &DocumentMeta, word: &str) -> Vec<SuggestionCandidate> {
        self.merger.suggest(meta, word)
    }

    pub fn set_active(&self, document: Option<DocumentId>) {
        self.scheduler.set_active(document);
    }

    pub fn terminate(&self, meta: &DocumentMeta) -> bool {
        self.scheduler.terminate(meta)
    }

    /// Drop queued work and every configured checker
    pub fn deactivate(&self) {
        self.scheduler.clear();
        self.manager.lock().deactivate();
    }
}
