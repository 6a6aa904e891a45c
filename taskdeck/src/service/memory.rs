//! In-memory task service for testing and demos.
//!
//! [`MemoryService`] implements [`TaskService`] against a task set held in
//! process. Every successful mutation broadcasts a full snapshot to all
//! live feed subscribers, so the engine can be exercised end-to-end without
//! a network. Failure and latency injection hooks let the test suites
//! script remote misbehavior deterministically.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use taskdeck_model::{Task, TaskDraft, TaskId, TaskPatch};

use super::{ServiceError, TaskFeed, TaskService};

/// In-process implementation of [`TaskService`].
///
/// Snapshots are delivered lossily: if a subscriber's channel is full the
/// snapshot is dropped for that subscriber (the next snapshot carries the
/// full state again). Closed subscribers are pruned on broadcast.
#[derive(Default)]
pub struct MemoryService {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    subscribers: Vec<mpsc::Sender<Vec<Task>>>,
    fail_next_fetch: bool,
    fail_next_write: bool,
    fail_subscribe: bool,
    fetch_delay: Option<Duration>,
    write_delay: Option<Duration>,
    fetch_calls: u64,
    create_calls: u64,
    delete_calls: u64,
    update_log: Vec<TaskPatch>,
}

impl MemoryService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the server-side task set without notifying subscribers.
    pub fn seed(&self, tasks: Vec<Task>) {
        self.inner.lock().tasks = tasks;
    }

    /// Replaces the server-side task set and broadcasts the new snapshot,
    /// simulating a write made by another client.
    pub fn push_snapshot(&self, tasks: Vec<Task>) {
        let mut inner = self.inner.lock();
        inner.tasks = tasks;
        Self::broadcast(&mut inner);
    }

    /// Makes the next `fetch_all` fail with [`ServiceError::Unavailable`].
    pub fn fail_next_fetch(&self) {
        self.inner.lock().fail_next_fetch = true;
    }

    /// Makes the next write (create/update/delete) fail with
    /// [`ServiceError::Unavailable`].
    pub fn fail_next_write(&self) {
        self.inner.lock().fail_next_write = true;
    }

    /// Makes every `subscribe` attempt fail until turned off.
    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.lock().fail_subscribe = fail;
    }

    /// Delays every `fetch_all` by the given duration.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.inner.lock().fetch_delay = Some(delay);
    }

    /// Delays every write by the given duration.
    pub fn set_write_delay(&self, delay: Duration) {
        self.inner.lock().write_delay = Some(delay);
    }

    /// Server-side view of the task set.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.lock().tasks.clone()
    }

    /// Number of `fetch_all` calls that reached the service.
    #[must_use]
    pub fn fetch_calls(&self) -> u64 {
        self.inner.lock().fetch_calls
    }

    /// Number of `create` calls that reached the service.
    #[must_use]
    pub fn create_calls(&self) -> u64 {
        self.inner.lock().create_calls
    }

    /// Number of `delete` calls that reached the service.
    #[must_use]
    pub fn delete_calls(&self) -> u64 {
        self.inner.lock().delete_calls
    }

    /// Every patch that reached `update`, in arrival order.
    #[must_use]
    pub fn update_log(&self) -> Vec<TaskPatch> {
        self.inner.lock().update_log.clone()
    }

    /// Number of `update` calls that reached the service.
    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.inner.lock().update_log.len()
    }

    /// Number of live feed subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    fn broadcast(inner: &mut Inner) {
        let snapshot = inner.tasks.clone();
        inner.subscribers.retain(|tx| {
            match tx.try_send(snapshot.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow consumer: drop this snapshot, the next one
                    // carries the full state again.
                    tracing::warn!("feed subscriber full, snapshot dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    async fn write_gate(&self) -> Result<(), ServiceError> {
        let delay = self.inner.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if std::mem::take(&mut self.inner.lock().fail_next_write) {
            return Err(ServiceError::Unavailable);
        }
        Ok(())
    }
}

impl TaskService for MemoryService {
    async fn fetch_all(&self) -> Result<Vec<Task>, ServiceError> {
        let delay = self.inner.lock().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock();
        inner.fetch_calls += 1;
        if std::mem::take(&mut inner.fail_next_fetch) {
            return Err(ServiceError::Unavailable);
        }
        Ok(inner.tasks.clone())
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, ServiceError> {
        self.write_gate().await?;
        draft
            .validate()
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        let task = draft.materialize(TaskId::new(), Utc::now());
        let mut inner = self.inner.lock();
        inner.create_calls += 1;
        inner.tasks.push(task.clone());
        Self::broadcast(&mut inner);
        Ok(task)
    }

    async fn update(&self, patch: &TaskPatch) -> Result<Task, ServiceError> {
        self.write_gate().await?;
        let mut inner = self.inner.lock();
        inner.update_log.push(patch.clone());
        let Some(slot) = inner.tasks.iter_mut().find(|t| t.id == patch.id) else {
            return Err(ServiceError::NotFound(patch.id));
        };
        let mut merged = patch.apply_to(slot);
        merged.updated_at = Utc::now();
        *slot = merged.clone();
        Self::broadcast(&mut inner);
        Ok(merged)
    }

    async fn delete(&self, id: TaskId) -> Result<(), ServiceError> {
        self.write_gate().await?;
        let mut inner = self.inner.lock();
        inner.delete_calls += 1;
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        if inner.tasks.len() == before {
            return Err(ServiceError::NotFound(id));
        }
        Self::broadcast(&mut inner);
        Ok(())
    }

    async fn subscribe(&self, buffer: usize) -> Result<TaskFeed, ServiceError> {
        let (tx, rx) = mpsc::channel(buffer);
        let mut inner = self.inner.lock();
        if inner.fail_subscribe {
            return Err(ServiceError::Unavailable);
        }
        // New subscribers get the current snapshot immediately.
        let _ = tx.try_send(inner.tasks.clone());
        inner.subscribers.push(tx);
        Ok(TaskFeed::from_receiver(rx))
    }
}
