//! Deferred completion with an undo window.
//!
//! Marking a task done flips its status locally at once, but the remote
//! write is deferred for a grace interval so an immediate undo costs no
//! network round-trip. Per task the controller runs a small state machine:
//!
//! - **Active** — no pending entry; `mark_done` flips the local status to
//!   DONE and starts the grace timer.
//! - **PendingCompletion** — timer running; undo (or a repeated `mark_done`
//!   gesture) cancels the timer and restores the prior status with zero
//!   remote calls.
//! - **Committed** — the timer elapsed and the real update succeeded; a
//!   `reopen` issues an immediate (non-deferred) update back to an active
//!   status.
//!
//! Tie-break: if an undo lands while the commit call is already in flight,
//! the call is allowed to complete and a corrective follow-up update
//! restores the user's intended status afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use taskdeck_model::{Task, TaskId, TaskPatch, TaskStatus};

use crate::engine::EngineEvent;
use crate::service::TaskService;
use crate::store::{StoreError, TaskStore};

/// Bookkeeping for one task inside its undo window.
struct PendingCompletion {
    /// Status to restore on undo or commit failure.
    prior_status: TaskStatus,
    /// Grace timer; `None` only for the instant between map insertion and
    /// handle registration.
    timer: Option<JoinHandle<()>>,
    /// The commit call is in flight; the timer can no longer be cancelled.
    committing: bool,
    /// An undo arrived during the in-flight commit; issue a corrective
    /// follow-up once the call resolves.
    undo_after_commit: bool,
}

/// Controller for the mark-done / undo interaction.
///
/// Owns one cancellable timer per task with a pending completion. All
/// status writes go through the store's entry points.
pub struct CompletionController<S: TaskService> {
    store: Arc<TaskStore<S>>,
    grace: Duration,
    pending: Arc<Mutex<HashMap<TaskId, PendingCompletion>>>,
    events: mpsc::Sender<EngineEvent>,
}

impl<S: TaskService + 'static> CompletionController<S> {
    /// Creates a controller with the given grace window.
    pub fn new(store: Arc<TaskStore<S>>, grace: Duration, events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            store,
            grace,
            pending: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Marks a task done with a deferred commit.
    ///
    /// The local status flips to DONE immediately; the remote update is
    /// issued only once the grace window elapses without an undo. Calling
    /// this again while the window is open counts as the undo gesture.
    /// Marking an already-done task is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTask`] if the task is not in the
    /// collection.
    pub fn mark_done(&self, id: TaskId) -> Result<(), StoreError> {
        // Repeated completion gesture within the grace window is an undo.
        if self.undo_mark_done(id) {
            return Ok(());
        }

        let current = self.store.get(id).ok_or(StoreError::UnknownTask(id))?;
        if current.status == TaskStatus::Done {
            tracing::debug!(task_id = %id, "mark_done on already-done task ignored");
            return Ok(());
        }

        let prior_status = self
            .store
            .set_status_local(id, TaskStatus::Done)
            .ok_or(StoreError::UnknownTask(id))?;

        // Insert the entry before spawning so a racing timer fire always
        // finds its bookkeeping.
        self.pending.lock().insert(
            id,
            PendingCompletion {
                prior_status,
                timer: None,
                committing: false,
                undo_after_commit: false,
            },
        );

        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending);
        let events = self.events.clone();
        let grace = self.grace;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            commit(store, pending, events, id).await;
        });

        let mut pending = self.pending.lock();
        if let Some(entry) = pending.get_mut(&id) {
            entry.timer = Some(handle);
        } else {
            // Undone (or committed) before the handle landed.
            handle.abort();
        }
        Ok(())
    }

    /// Undoes a pending completion.
    ///
    /// Within the grace window this cancels the timer and restores the
    /// prior status with **no** remote call. If the commit is already in
    /// flight, the call is left to complete and a corrective follow-up
    /// update is issued afterwards. Returns whether there was a pending
    /// completion to undo.
    pub fn undo_mark_done(&self, id: TaskId) -> bool {
        let mut pending = self.pending.lock();
        let Some(entry) = pending.get_mut(&id) else {
            return false;
        };
        if entry.committing {
            entry.undo_after_commit = true;
            tracing::debug!(task_id = %id, "undo during in-flight commit, corrective update queued");
            return true;
        }
        let Some(entry) = pending.remove(&id) else {
            return false;
        };
        drop(pending);
        if let Some(timer) = entry.timer {
            // No-op if the timer already fired; the committing flag above
            // covers that window.
            timer.abort();
        }
        self.store.set_status_local(id, entry.prior_status);
        tracing::debug!(task_id = %id, "deferred completion cancelled without remote call");
        true
    }

    /// Reopens a committed task with an immediate (non-deferred) update.
    ///
    /// The store's optimistic machinery applies: on failure the status is
    /// rolled back to DONE and the error surfaced.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] from the underlying update.
    pub async fn reopen(&self, id: TaskId, status: TaskStatus) -> Result<Task, StoreError> {
        self.store
            .update(&TaskPatch::new(id).with_status(status))
            .await
    }

    /// Whether the task currently has a pending (uncommitted) completion.
    #[must_use]
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    /// Number of tasks with a pending completion.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<S: TaskService> Drop for CompletionController<S> {
    fn drop(&mut self) {
        for (_, entry) in self.pending.lock().drain() {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }
}

/// Commits a pending completion once its grace window has elapsed.
async fn commit<S: TaskService>(
    store: Arc<TaskStore<S>>,
    pending: Arc<Mutex<HashMap<TaskId, PendingCompletion>>>,
    events: mpsc::Sender<EngineEvent>,
    id: TaskId,
) {
    let prior_status = {
        let mut pending = pending.lock();
        let Some(entry) = pending.get_mut(&id) else {
            // Undone while the timer was being delivered.
            return;
        };
        entry.committing = true;
        entry.prior_status
    };

    let result = store
        .update(&TaskPatch::new(id).with_status(TaskStatus::Done))
        .await;

    let undo_requested = pending
        .lock()
        .remove(&id)
        .is_some_and(|e| e.undo_after_commit);

    match result {
        Ok(_) => {
            if undo_requested {
                // Late undo: the commit went through, so reflect the user's
                // final intent with a corrective update.
                match store
                    .update(&TaskPatch::new(id).with_status(prior_status))
                    .await
                {
                    Ok(_) => {
                        tracing::debug!(task_id = %id, "corrective update after late undo applied");
                    }
                    Err(e) => {
                        tracing::warn!(task_id = %id, error = %e, "corrective update failed");
                        let _ = events.try_send(EngineEvent::CompletionFailed {
                            id,
                            reason: e.to_string(),
                        });
                    }
                }
            } else {
                let _ = events.try_send(EngineEvent::CompletionCommitted { id });
            }
        }
        Err(e) => {
            // Back to Active with the pre-completion status; the store has
            // already rolled its own optimistic write back to DONE.
            store.set_status_local(id, prior_status);
            tracing::warn!(task_id = %id, error = %e, "deferred completion commit failed");
            let _ = events.try_send(EngineEvent::CompletionFailed {
                id,
                reason: e.to_string(),
            });
        }
    }
}
