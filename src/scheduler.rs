use crate::aggregator::Aggregator;
use crate::diagnostics::{panic_message, Diagnostic, DiagnosticSink};
use crate::document::{DocumentId, DocumentMeta, JobKey};
use crate::error::Error;
use crate::MisspellingSpan;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives the spans of a finished job.
pub type SpellCallback = Box<dyn FnOnce(&[MisspellingSpan]) + Send + 'static>;

struct Job {
    serial: u64,
    key: JobKey,
    meta: DocumentMeta,
    text: Arc<str>,
    /// Registration order is invocation order.
    callbacks: Vec<(DocumentId, SpellCallback)>,
    running: bool,
}

impl Job {
    fn wanted_by(&self, document: DocumentId) -> bool {
        self.callbacks.iter().any(|(owner, _)| *owner == document)
    }
}

#[derive(Default)]
struct Queue {
    /// Newest first.
    jobs: VecDeque<Job>,
    active: Option<DocumentId>,
    next_serial: u64,
}

impl Queue {
    /// Drop every callback `document` registered, and any job left without one.
    fn detach(&mut self, document: DocumentId) -> Vec<SpellCallback> {
        let mut dropped = Vec::new();
        for job in self.jobs.iter_mut() {
            let (mine, others): (Vec<_>, Vec<_>) = job
                .callbacks
                .drain(..)
                .partition(|(owner, _)| *owner == document);
            job.callbacks = others;
            dropped.extend(mine.into_iter().map(|(_, callback)| callback));
        }
        self.jobs.retain(|job| !job.callbacks.is_empty());
        dropped
    }

    fn remove(&mut self, serial: u64) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.serial == serial)?;
        self.jobs.remove(index)
    }

    /// Mark the next job as running, preferring the active document's job.
    fn begin_next(&mut self) -> Option<(u64, DocumentMeta, Arc<str>)> {
        let active = self.active?;
        let index = self
            .jobs
            .iter()
            .position(|job| job.wanted_by(active))
            .or(if self.jobs.is_empty() { None } else { Some(0) })?;

        let job = &mut self.jobs[index];
        job.running = true;
        Some((job.serial, job.meta.clone(), Arc::clone(&job.text)))
    }
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Notify,
    aggregator: Arc<Aggregator>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Shared {
    async fn run_worker(self: Arc<Self>) {
        loop {
            self.wake.notified().await;

            loop {
                let next = self.queue.lock().begin_next();
                let Some((serial, meta, text)) = next else {
                    break;
                };
                self.run_job(serial, meta, text).await;
            }
        }
    }

    async fn run_job(&self, serial: u64, meta: DocumentMeta, text: Arc<str>) {
        let document = meta.id;
        debug!(document = %document, serial, "running check job");

        // Its own task, so a panicking checker fails this job and not the worker.
        let aggregator = Arc::clone(&self.aggregator);
        let outcome = tokio::spawn(async move { aggregator.check(&meta, &text).await }).await;

        let job = self.queue.lock().remove(serial);

        match (outcome, job) {
            (Ok(spans), Some(job)) => {
                debug!(
                    document = %document,
                    misspellings = spans.len(),
                    callbacks = job.callbacks.len(),
                    "check job finished"
                );
                for (owner, callback) in job.callbacks {
                    // A panicking caller must not take the worker down with it.
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&spans))) {
                        warn!(document = %owner, "result callback panicked");
                        self.sink.report(Diagnostic::JobFailed {
                            document: owner,
                            message: format!("result callback panicked: {}", panic_message(&*payload)),
                        });
                    }
                }
            }
            (Ok(_), None) => {
                debug!(document = %document, "check job was terminated; discarding result");
            }
            (Err(error), _) => {
                warn!(document = %document, "check job failed");
                self.sink.report(Diagnostic::JobFailed {
                    document,
                    message: error.to_string(),
                });
            }
        }
    }
}

/// Owns the shared job queue and its single worker task.
///
/// At most one aggregation pass runs at a time. Requests for a document that
/// already has a queued or running job attach to that job instead of creating
/// another one.
///
/// Must be created inside a tokio runtime. Dropping the scheduler stops the
/// worker; pending callbacks are dropped without being called.
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(aggregator: Arc<Aggregator>, sink: Arc<dyn DiagnosticSink>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wake: Notify::new(),
            aggregator,
            sink,
        });
        let worker = tokio::spawn(Arc::clone(&shared).run_worker());
        Self { shared, worker }
    }

    /// Queue a check of `text` for `meta`, or attach to an outstanding job for
    /// the same document.
    pub fn start<F>(&self, meta: &DocumentMeta, text: impl Into<Arc<str>>, on_result: F)
    where
        F: FnOnce(&[MisspellingSpan]) + Send + 'static,
    {
        let key = meta.job_key();
        let callback: SpellCallback = Box::new(on_result);
        let stale = {
            let mut queue = self.shared.queue.lock();

            let existing = queue.jobs.iter().position(|job| job.key == key);
            if let Some(index) = existing {
                let job = &mut queue.jobs[index];
                debug!(document = %meta.id, running = job.running, "attaching to existing check job");
                job.callbacks.push((meta.id, callback));
                Vec::new()
            } else {
                // Anything this document asked for under another key is stale now.
                let stale = queue.detach(meta.id);

                let serial = queue.next_serial;
                queue.next_serial += 1;
                queue.jobs.push_front(Job {
                    serial,
                    key,
                    meta: meta.clone(),
                    text: text.into(),
                    callbacks: vec![(meta.id, callback)],
                    running: false,
                });
                debug!(document = %meta.id, serial, queued = queue.jobs.len(), "queued check job");
                stale
            }
        };
        drop(stale);

        self.shared.wake.notify_one();
    }

    /// [`start`](Self::start) with the result delivered through a future.
    ///
    /// Resolves to [`Error::Cancelled`] if the job is terminated or fails.
    pub fn request(
        &self,
        meta: &DocumentMeta,
        text: impl Into<Arc<str>>,
    ) -> impl Future<Output = Result<Vec<MisspellingSpan>, Error>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.start(meta, text, move |spans| {
            let _ = tx.send(spans.to_vec());
        });
        async move { rx.await.map_err(|_| Error::Cancelled) }
    }

    /// Forget every outstanding request from this document.
    ///
    /// A running pass is not interrupted; its result is discarded. Returns
    /// whether anything was removed.
    pub fn terminate(&self, meta: &DocumentMeta) -> bool {
        let dropped = self.shared.queue.lock().detach(meta.id);
        let removed = !dropped.is_empty();
        if removed {
            debug!(document = %meta.id, callbacks = dropped.len(), "terminated check requests");
        }
        removed
    }

    /// Record the focused document; its job is run first.
    pub fn set_active(&self, document: Option<DocumentId>) {
        self.shared.queue.lock().active = document;
        self.shared.wake.notify_one();
    }

    /// Queued and running jobs
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Drop every job without calling its callbacks
    pub fn clear(&self) {
        let jobs = std::mem::take(&mut self.shared.queue.lock().jobs);
        debug!(jobs = jobs.len(), "cleared check queue");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{Checker, Judgment, Registry};
    use crate::diagnostics::MemorySink;
    use crate::error::CheckerError;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Flags the whole text and records what it was asked to check.
    #[derive(Default)]
    struct RecordingChecker {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        entered: Notify,
        gate: Option<Notify>,
        panic_on: Option<&'static str>,
    }

    impl RecordingChecker {
        fn gated() -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().clone()
        }
    }

    impl Checker for RecordingChecker {
        fn id(&self) -> &str {
            "recording"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn provides_spelling(&self, _meta: &DocumentMeta) -> bool {
            true
        }

        fn check<'a>(
            &'a self,
            _meta: &'a DocumentMeta,
            text: &'a str,
        ) -> BoxFuture<'a, Result<Judgment, CheckerError>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.seen.lock().push(text.to_string());
                self.entered.notify_one();
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                if self.panic_on == Some(text) {
                    panic!("checker blew up");
                }
                Ok(Judgment::incorrect([0..text.chars().count()]))
            }
            .boxed()
        }
    }

    fn scheduler(checker: Arc<RecordingChecker>) -> (Scheduler, Arc<MemorySink>) {
        let registry = Arc::new(Registry::new());
        registry.register(checker).unwrap();
        let sink = Arc::new(MemorySink::new());
        let aggregator = Arc::new(Aggregator::new(registry, sink.clone()));
        (Scheduler::spawn(aggregator, sink.clone()), sink)
    }

    fn document(path: &str) -> DocumentMeta {
        DocumentMeta::with_path(DocumentId::next(), None, path)
    }

    #[tokio::test]
    async fn test_same_document_requests_share_one_pass() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());

        let first = document("notes.txt");
        let second = DocumentMeta::with_path(DocumentId::next(), None, "notes.txt");
        scheduler.set_active(Some(first.id));

        let a = scheduler.request(&first, "wrod");
        let b = scheduler.request(&second, "wrod");
        let (a, b) = tokio::join!(a, b);

        assert_eq!(checker.calls(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_request_attaches_to_running_job() {
        let checker = Arc::new(RecordingChecker::gated());
        let (scheduler, _) = scheduler(checker.clone());
        let meta = document("notes.txt");
        scheduler.set_active(Some(meta.id));

        let first = scheduler.request(&meta, "old text");
        checker.entered.notified().await;

        let second = scheduler.request(&meta, "new text");
        checker.gate.as_ref().unwrap().notify_one();

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(checker.seen(), vec!["old text"]);
    }

    #[tokio::test]
    async fn test_callbacks_run_in_registration_order() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());
        let meta = document("notes.txt");
        scheduler.set_active(Some(meta.id));

        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            scheduler.start(&meta, "abc", move |_| order.lock().push(n));
        }
        scheduler.request(&meta, "abc").await.unwrap();

        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_active_document_runs_first() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());
        let background = document("a.txt");
        let focused = document("b.txt");
        scheduler.set_active(Some(focused.id));

        let b = scheduler.request(&focused, "focused");
        let a = scheduler.request(&background, "background");
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        assert_eq!(checker.seen(), vec!["focused", "background"]);
    }

    #[tokio::test]
    async fn test_without_active_document_nothing_runs() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());
        let meta = document("a.txt");

        let mut pending = Box::pin(scheduler.request(&meta, "abc"));
        let waited = tokio::time::timeout(Duration::from_millis(50), &mut pending).await;
        assert!(waited.is_err());
        assert_eq!(checker.calls(), 0);

        scheduler.set_active(Some(meta.id));
        assert_eq!(pending.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsaved_documents_are_checked_separately() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());
        let a = DocumentMeta::unsaved(DocumentId::next());
        let b = DocumentMeta::unsaved(DocumentId::next());
        scheduler.set_active(Some(a.id));

        let (ra, rb) = tokio::join!(scheduler.request(&a, "one"), scheduler.request(&b, "two"));
        ra.unwrap();
        rb.unwrap();
        assert_eq!(checker.calls(), 2);
    }

    #[tokio::test]
    async fn test_terminate_queued_job() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());
        let meta = document("a.txt");

        let pending = scheduler.request(&meta, "abc");
        assert!(scheduler.terminate(&meta));
        assert!(!scheduler.terminate(&meta));
        assert_eq!(scheduler.pending(), 0);
        assert!(matches!(pending.await, Err(Error::Cancelled)));

        scheduler.set_active(Some(meta.id));
        tokio::task::yield_now().await;
        assert_eq!(checker.calls(), 0);
    }

    #[tokio::test]
    async fn test_terminate_running_job_discards_result() {
        let checker = Arc::new(RecordingChecker::gated());
        let (scheduler, _) = scheduler(checker.clone());
        let doomed = document("a.txt");
        let other = document("b.txt");
        scheduler.set_active(Some(doomed.id));

        let first = scheduler.request(&doomed, "abc");
        checker.entered.notified().await;
        assert!(scheduler.terminate(&doomed));
        checker.gate.as_ref().unwrap().notify_one();
        assert!(matches!(first.await, Err(Error::Cancelled)));

        let second = scheduler.request(&other, "def");
        checker.gate.as_ref().unwrap().notify_one();
        assert_eq!(second.await.unwrap().len(), 1);
        assert_eq!(checker.calls(), 2);
    }

    #[tokio::test]
    async fn test_new_path_replaces_stale_job() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());
        let id = DocumentId::next();
        let before = DocumentMeta::with_path(id, None, "untitled.txt");
        let after = DocumentMeta::with_path(id, None, "renamed.txt");

        let stale = scheduler.request(&before, "before");
        let fresh = scheduler.request(&after, "after");
        assert_eq!(scheduler.pending(), 1);

        scheduler.set_active(Some(id));
        assert!(matches!(stale.await, Err(Error::Cancelled)));
        fresh.await.unwrap();
        assert_eq!(checker.seen(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_panicking_pass_does_not_wedge_queue() {
        let checker = Arc::new(RecordingChecker {
            panic_on: Some("boom"),
            ..Default::default()
        });
        let (scheduler, sink) = scheduler(checker.clone());
        let bad = document("bad.txt");
        let good = document("good.txt");
        scheduler.set_active(Some(bad.id));

        let (bad_result, good_result) = tokio::join!(
            scheduler.request(&bad, "boom"),
            scheduler.request(&good, "fine")
        );

        assert!(matches!(bad_result, Err(Error::Cancelled)));
        assert_eq!(good_result.unwrap().len(), 1);
        assert_eq!(sink.messages().len(), 1);
        assert!(sink.messages()[0].contains("failed"));
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stop_worker() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, sink) = scheduler(checker.clone());
        let a = document("a.txt");
        let b = document("b.txt");
        scheduler.set_active(Some(a.id));

        scheduler.start(&a, "abc", |_| panic!("callback bug"));
        let piggybacked = scheduler.request(&a, "abc");
        assert_eq!(piggybacked.await.unwrap().len(), 1);

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("result callback panicked: callback bug"));

        scheduler.set_active(Some(b.id));
        let next = tokio::time::timeout(Duration::from_secs(5), scheduler.request(&b, "def"))
            .await
            .expect("worker stopped after a callback panic");
        assert_eq!(next.unwrap().len(), 1);
        assert_eq!(checker.calls(), 2);
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let checker = Arc::new(RecordingChecker::default());
        let (scheduler, _) = scheduler(checker.clone());
        let pending = scheduler.request(&document("a.txt"), "abc");
        scheduler.clear();

        assert_eq!(scheduler.pending(), 0);
        assert!(matches!(pending.await, Err(Error::Cancelled)));
    }
}
