//! Reconciliation of the remote change feed into the task store.
//!
//! [`SyncController`] owns the lifecycle of the push-based subscription.
//! The hard ordering guarantee: the initial bulk fetch must resolve
//! successfully before the feed is opened, so no feed event is ever merged
//! against an empty or partial baseline. Redundant snapshots (equal in
//! content to the current collection) are discarded without touching the
//! store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::EngineEvent;
use crate::service::TaskService;
use crate::store::{StoreError, TaskStore};

/// Lifecycle owner of the bulk-fetch-then-subscribe sequence.
pub struct SyncController<S: TaskService> {
    store: Arc<TaskStore<S>>,
    feed_buffer: usize,
    events: mpsc::Sender<EngineEvent>,
    worker: Mutex<Option<JoinHandle<()>>>,
    loaded: Arc<AtomicBool>,
}

impl<S: TaskService + 'static> SyncController<S> {
    /// Creates an inactive controller.
    pub fn new(
        store: Arc<TaskStore<S>>,
        feed_buffer: usize,
        events: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            store,
            feed_buffer,
            events,
            worker: Mutex::new(None),
            loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the sync worker: full fetch first, then the feed.
    ///
    /// Activating while already active is a no-op.
    pub fn activate(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("sync already active");
            return;
        }
        self.loaded.store(false, Ordering::SeqCst);
        let store = Arc::clone(&self.store);
        let loaded = Arc::clone(&self.loaded);
        let events = self.events.clone();
        let feed_buffer = self.feed_buffer;
        *worker = Some(tokio::spawn(async move {
            run(store, loaded, events, feed_buffer).await;
        }));
    }

    /// Tears the sync worker down.
    ///
    /// Cancels a pending fetch-then-subscribe continuation, closes the feed
    /// subscription if open (dropping the feed unsubscribes), and resets
    /// the initial-load flag. Idempotent and safe at any lifecycle point,
    /// including mid-fetch.
    pub fn deactivate(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("sync deactivated");
        }
        self.loaded.store(false, Ordering::SeqCst);
    }

    /// Whether the sync worker is currently running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Whether the initial bulk fetch has completed for the current
    /// activation.
    #[must_use]
    pub fn initial_load_complete(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

impl<S: TaskService> Drop for SyncController<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
    }
}

/// The sync worker body: bulk fetch, then feed consumption until closed.
async fn run<S: TaskService>(
    store: Arc<TaskStore<S>>,
    loaded: Arc<AtomicBool>,
    events: mpsc::Sender<EngineEvent>,
    feed_buffer: usize,
) {
    // Step 1: the bulk fetch must resolve before the feed is opened. The
    // store records the error; the feed stays closed.
    if store.fetch_all().await.is_err() {
        tracing::warn!("initial fetch failed, feed not opened");
        return;
    }
    loaded.store(true, Ordering::SeqCst);

    // Step 2: open the feed. A transport-level failure here is non-fatal —
    // the freshly loaded collection remains valid.
    let mut feed = match store.service().subscribe(feed_buffer).await {
        Ok(feed) => feed,
        Err(e) => {
            let err = StoreError::Subscribe(e);
            tracing::warn!(error = %err, "continuing without live updates");
            let _ = events.try_send(EngineEvent::SyncWarning(err.to_string()));
            return;
        }
    };

    // Step 3: merge snapshots as they arrive.
    while let Some(snapshot) = feed.recv().await {
        if !loaded.load(Ordering::SeqCst) {
            // Cannot be trusted against a not-yet-loaded baseline.
            tracing::debug!("feed event before initial load discarded");
            continue;
        }
        if store.merge_snapshot(snapshot) {
            tracing::debug!("feed snapshot merged");
        } else {
            tracing::trace!("redundant feed snapshot discarded");
        }
    }

    tracing::debug!("task feed closed");
    let _ = events.try_send(EngineEvent::SyncWarning("task feed closed".to_string()));
}
