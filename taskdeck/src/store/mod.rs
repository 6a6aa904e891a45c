//! Task collection store for `TaskDeck`.
//!
//! [`TaskStore`] is the single source of truth for the in-memory task
//! collection. All external mutation is serialized through its entry
//! points: the engine's CRUD calls, the sync controller's
//! [`merge_snapshot`](TaskStore::merge_snapshot), and the deferred
//! completion controller's
//! [`set_status_local`](TaskStore::set_status_local). No component writes
//! the collection directly.
//!
//! Failure policy: every mutation is all-or-nothing from the collection's
//! point of view. `update` is the one optimistic operation — it swaps the
//! merged value in immediately and explicitly reverts to the captured
//! pre-mutation value if the remote call fails.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use taskdeck_model::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, ValidationError};

use crate::service::{ServiceError, TaskService};

/// Errors surfaced by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The bulk fetch failed; previously loaded data is left in place.
    #[error("bulk fetch failed: {0}")]
    Fetch(#[source] ServiceError),

    /// A create/update/delete failed; for `update` the optimistic value
    /// has been rolled back.
    #[error("remote write failed: {0}")]
    Write(#[source] ServiceError),

    /// The change feed could not be opened; already-loaded data remains
    /// valid.
    #[error("feed subscription failed: {0}")]
    Subscribe(#[source] ServiceError),

    /// The task id is not present in the local collection.
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// The draft or patch failed validation before any remote call.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

type Observer = Box<dyn Fn(&[Task]) + Send + Sync>;

#[derive(Default)]
struct State {
    tasks: Vec<Task>,
    loading: bool,
    last_error: Option<StoreError>,
}

/// Owner of the canonical in-memory task collection.
///
/// Interior locks are held only for short critical sections and never
/// across an `.await`; remote calls resolve against whatever state the
/// collection has reached by then (last write wins, see the crate docs on
/// the known same-task race).
pub struct TaskStore<S: TaskService> {
    service: Arc<S>,
    state: RwLock<State>,
    observers: Mutex<Vec<Observer>>,
}

impl<S: TaskService> TaskStore<S> {
    /// Creates an empty store backed by the given service.
    #[must_use]
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            state: RwLock::new(State::default()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// The remote service this store talks to.
    #[must_use]
    pub const fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Registers a callback invoked with the full collection after every
    /// successful mutation or merge.
    pub fn on_change(&self, observer: impl Fn(&[Task]) + Send + Sync + 'static) {
        self.observers.lock().push(Box::new(observer));
    }

    fn notify(&self) {
        let tasks = self.state.read().tasks.clone();
        for observer in self.observers.lock().iter() {
            observer(&tasks);
        }
    }

    // --- read accessors ---

    /// The current collection, in server order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().tasks.clone()
    }

    /// Looks up a single task by id.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.state.read().tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Whether a bulk fetch is currently in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    /// The most recent store-level error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<StoreError> {
        self.state.read().last_error.clone()
    }

    /// Clears the last-error value.
    pub fn clear_error(&self) {
        self.state.write().last_error = None;
    }

    // --- mutations ---

    /// Fetches the full task set and replaces the collection atomically.
    ///
    /// On success the previous collection is discarded wholesale (no
    /// partial merge) and any error state is cleared. On failure the
    /// previously loaded data is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Fetch`] if the remote call fails.
    pub async fn fetch_all(&self) -> Result<Vec<Task>, StoreError> {
        self.state.write().loading = true;
        // Clears the flag even if the fetch is cancelled mid-await.
        let _loading = LoadingReset(self);
        let result = self.service.fetch_all().await;
        match result {
            Ok(tasks) => {
                {
                    let mut state = self.state.write();
                    state.tasks.clone_from(&tasks);
                    state.last_error = None;
                }
                self.notify();
                Ok(tasks)
            }
            Err(e) => {
                let err = StoreError::Fetch(e);
                self.state.write().last_error = Some(err.clone());
                tracing::warn!(error = %err, "bulk fetch failed");
                Err(err)
            }
        }
    }

    /// Creates a task.
    ///
    /// Creation is **not** optimistic — the id is server-assigned — so the
    /// collection is only touched once the service confirms.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an invalid draft or
    /// [`StoreError::Write`] if the remote call fails; either way the
    /// collection is untouched.
    pub async fn create(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        draft.validate()?;
        match self.service.create(draft).await {
            Ok(task) => {
                self.state.write().tasks.push(task.clone());
                self.notify();
                Ok(task)
            }
            Err(e) => Err(self.record_write_error(e)),
        }
    }

    /// Applies a partial update optimistically.
    ///
    /// The merged value is swapped into the collection immediately; the
    /// remote call then resolves in the background of the caller's await.
    /// On success the server's returned task (authoritative, with derived
    /// fields corrected) replaces the optimistic value. On failure the
    /// captured pre-mutation value is restored.
    ///
    /// Concurrent updates against the same task id are not queued or
    /// merged; the last-resolved call wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTask`] if the id is not in the
    /// collection (no remote call is made), [`StoreError::Validation`] for
    /// an invalid patch, or [`StoreError::Write`] on remote failure.
    pub async fn update(&self, patch: &TaskPatch) -> Result<Task, StoreError> {
        patch.validate()?;
        let prior = {
            let mut state = self.state.write();
            let Some(slot) = state.tasks.iter_mut().find(|t| t.id == patch.id) else {
                return Err(StoreError::UnknownTask(patch.id));
            };
            let prior = slot.clone();
            *slot = patch.apply_to(&prior);
            prior
        };
        self.notify();

        match self.service.update(patch).await {
            Ok(server_task) => {
                self.replace(patch.id, server_task.clone());
                self.notify();
                Ok(server_task)
            }
            Err(e) => {
                if self.replace(patch.id, prior) {
                    self.notify();
                }
                tracing::debug!(task_id = %patch.id, "optimistic update rolled back");
                Err(self.record_write_error(e))
            }
        }
    }

    /// Deletes a task.
    ///
    /// Not optimistic: the task leaves the local collection only after the
    /// service confirms, so a failed delete cannot resurrect it later.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the remote call fails; the
    /// collection is untouched.
    pub async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        match self.service.delete(id).await {
            Ok(()) => {
                self.state.write().tasks.retain(|t| t.id != id);
                self.notify();
                Ok(())
            }
            Err(e) => Err(self.record_write_error(e)),
        }
    }

    /// Merges a feed snapshot into the collection.
    ///
    /// This is the sync controller's only write path. If the snapshot is
    /// equivalent to the current collection (order-insensitive value
    /// equality) it is discarded: no write, no observer notification.
    /// Returns whether a write happened.
    pub fn merge_snapshot(&self, snapshot: Vec<Task>) -> bool {
        {
            let mut state = self.state.write();
            if snapshot_equals(&state.tasks, &snapshot) {
                return false;
            }
            state.tasks = snapshot;
        }
        self.notify();
        true
    }

    /// Sets a task's status locally without any remote call.
    ///
    /// Used by the deferred completion controller for the instant DONE
    /// flip and its undo. Returns the prior status, or `None` if the task
    /// is not in the collection.
    pub fn set_status_local(&self, id: TaskId, status: TaskStatus) -> Option<TaskStatus> {
        let prior = {
            let mut state = self.state.write();
            let slot = state.tasks.iter_mut().find(|t| t.id == id)?;
            let prior = slot.status;
            slot.status = status;
            prior
        };
        self.notify();
        Some(prior)
    }

    /// Overwrites the stored value for `id` if present.
    fn replace(&self, id: TaskId, task: Task) -> bool {
        let mut state = self.state.write();
        if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == id) {
            *slot = task;
            true
        } else {
            false
        }
    }

    fn record_write_error(&self, e: ServiceError) -> StoreError {
        let err = StoreError::Write(e);
        self.state.write().last_error = Some(err.clone());
        err
    }
}

/// Resets the loading flag when the surrounding fetch future completes or
/// is dropped.
struct LoadingReset<'a, S: TaskService>(&'a TaskStore<S>);

impl<S: TaskService> Drop for LoadingReset<'_, S> {
    fn drop(&mut self) {
        self.0.state.write().loading = false;
    }
}

/// Order-insensitive value equality between the current collection and an
/// incoming snapshot.
fn snapshot_equals(current: &[Task], incoming: &[Task]) -> bool {
    if current.len() != incoming.len() {
        return false;
    }
    let by_id: HashMap<TaskId, &Task> = current.iter().map(|t| (t.id, t)).collect();
    incoming
        .iter()
        .all(|t| by_id.get(&t.id).is_some_and(|c| *c == t))
}
