//! Engine facade for the surrounding application.
//!
//! [`SyncEngine`] wires the store, the deferred completion controller, and
//! the sync controller together and keeps the derived views (filtered
//! subset, aggregate stats) fresh through a store observer. The UI layer
//! reads state through the accessors and consumes [`EngineEvent`]s from the
//! receiver returned by [`SyncEngine::new`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use taskdeck_model::{FilterSpec, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};

use crate::completion::CompletionController;
use crate::config::EngineConfig;
use crate::service::TaskService;
use crate::stats::TaskStats;
use crate::store::{StoreError, TaskStore};
use crate::sync::SyncController;

/// Events emitted by the engine for UI notification.
///
/// Delivery is lossy best-effort: a full event buffer drops the event, and
/// the UI re-reads current state through the accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The task collection (or the visible subset) changed.
    CollectionChanged,
    /// Derived stats were recomputed.
    StatsChanged(TaskStats),
    /// A deferred completion was durably committed.
    CompletionCommitted {
        /// The completed task.
        id: TaskId,
    },
    /// A deferred completion (or its corrective follow-up) failed; the
    /// task's status has been restored.
    CompletionFailed {
        /// The affected task.
        id: TaskId,
        /// Human-readable failure description.
        reason: String,
    },
    /// A non-fatal sync problem (feed failed to open or closed).
    SyncWarning(String),
}

/// The task synchronization engine.
///
/// One instance owns one task collection. Construct with
/// [`SyncEngine::new`]; the instance is explicit and independent, so tests
/// build a fresh engine per case.
pub struct SyncEngine<S: TaskService + 'static> {
    store: Arc<TaskStore<S>>,
    completion: CompletionController<S>,
    sync: SyncController<S>,
    filter: RwLock<FilterSpec>,
    visible: RwLock<Vec<Task>>,
    stats: RwLock<TaskStats>,
    stats_recomputations: AtomicU64,
    events: mpsc::Sender<EngineEvent>,
}

impl<S: TaskService + 'static> SyncEngine<S> {
    /// Creates an engine over the given service.
    ///
    /// Returns the engine and the receiver for [`EngineEvent`]s that the
    /// UI layer should consume.
    pub fn new(service: S, config: &EngineConfig) -> (Arc<Self>, mpsc::Receiver<EngineEvent>) {
        let (events, event_rx) = mpsc::channel(config.event_buffer);
        let store = Arc::new(TaskStore::new(Arc::new(service)));
        let engine = Arc::new(Self {
            completion: CompletionController::new(
                Arc::clone(&store),
                config.undo_grace,
                events.clone(),
            ),
            sync: SyncController::new(Arc::clone(&store), config.feed_buffer, events.clone()),
            store,
            filter: RwLock::new(FilterSpec::default()),
            visible: RwLock::new(Vec::new()),
            stats: RwLock::new(TaskStats::default()),
            stats_recomputations: AtomicU64::new(0),
            events,
        });

        // Derived views follow the store through a plain observer; a weak
        // reference avoids an Arc cycle through the store.
        let weak = Arc::downgrade(&engine);
        engine.store.on_change(move |tasks| {
            if let Some(engine) = weak.upgrade() {
                engine.recompute(tasks);
            }
        });

        (engine, event_rx)
    }

    fn recompute(&self, tasks: &[Task]) {
        let stats = TaskStats::compute(tasks);
        *self.stats.write() = stats.clone();
        self.stats_recomputations.fetch_add(1, Ordering::Relaxed);

        let spec = self.filter.read().clone();
        *self.visible.write() = spec.apply(tasks);

        let _ = self.events.try_send(EngineEvent::CollectionChanged);
        let _ = self.events.try_send(EngineEvent::StatsChanged(stats));
    }

    // --- read accessors ---

    /// The full task collection, in server order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.store.tasks()
    }

    /// The currently visible (filtered) subset.
    #[must_use]
    pub fn visible_tasks(&self) -> Vec<Task> {
        self.visible.read().clone()
    }

    /// Current derived stats.
    #[must_use]
    pub fn stats(&self) -> TaskStats {
        self.stats.read().clone()
    }

    /// The active filter specification.
    #[must_use]
    pub fn filter_spec(&self) -> FilterSpec {
        self.filter.read().clone()
    }

    /// Whether a bulk fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    /// The most recent store-level error, for UI presentation.
    #[must_use]
    pub fn last_error(&self) -> Option<StoreError> {
        self.store.last_error()
    }

    /// Clears the last-error value.
    pub fn clear_error(&self) {
        self.store.clear_error();
    }

    /// How many times the derived stats have been recomputed.
    ///
    /// Redundant feed snapshots must leave this untouched.
    #[must_use]
    pub fn stats_recomputations(&self) -> u64 {
        self.stats_recomputations.load(Ordering::Relaxed)
    }

    /// The remote service behind the store (handy for tests).
    #[must_use]
    pub fn service(&self) -> &Arc<S> {
        self.store.service()
    }

    // --- mutators ---

    /// Replaces the filter specification and recomputes the visible subset.
    pub fn set_filters(&self, spec: FilterSpec) {
        *self.filter.write() = spec.clone();
        let tasks = self.store.tasks();
        *self.visible.write() = spec.apply(&tasks);
        let _ = self.events.try_send(EngineEvent::CollectionChanged);
    }

    /// Re-runs the bulk fetch (e.g. a manual retry after an error).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Fetch`] if the remote call fails.
    pub async fn refresh(&self) -> Result<Vec<Task>, StoreError> {
        self.store.fetch_all().await
    }

    /// Creates a task (not optimistic; the id is server-assigned).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on validation or remote failure.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        self.store.create(draft).await
    }

    /// Applies a partial update optimistically (rolled back on failure).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on validation or remote failure.
    pub async fn update_task(&self, patch: &TaskPatch) -> Result<Task, StoreError> {
        self.store.update(patch).await
    }

    /// Deletes a task (confirmed remotely before local removal).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on remote failure.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        self.store.delete(id).await
    }

    /// Marks a task done with a deferred, undoable commit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTask`] if the task is not loaded.
    pub fn mark_done(&self, id: TaskId) -> Result<(), StoreError> {
        self.completion.mark_done(id)
    }

    /// Undoes a pending completion; returns whether one was pending.
    pub fn undo_mark_done(&self, id: TaskId) -> bool {
        self.completion.undo_mark_done(id)
    }

    /// Whether the task has an uncommitted completion (undo still shown).
    #[must_use]
    pub fn completion_pending(&self, id: TaskId) -> bool {
        self.completion.is_pending(id)
    }

    /// Reopens a done task with an immediate update to an active status.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] from the underlying update.
    pub async fn reopen_task(&self, id: TaskId, status: TaskStatus) -> Result<Task, StoreError> {
        self.completion.reopen(id, status).await
    }

    /// Starts background sync (bulk fetch, then the change feed).
    pub fn activate_sync(&self) {
        self.sync.activate();
    }

    /// Stops background sync; safe at any point, including mid-fetch.
    pub fn deactivate_sync(&self) {
        self.sync.deactivate();
    }

    /// Whether the sync worker is running.
    #[must_use]
    pub fn sync_active(&self) -> bool {
        self.sync.is_active()
    }

    /// Whether the initial bulk fetch of the current sync activation has
    /// completed.
    #[must_use]
    pub fn initial_load_complete(&self) -> bool {
        self.sync.initial_load_complete()
    }
}
