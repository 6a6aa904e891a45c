//! Remote data service abstraction for `TaskDeck`.
//!
//! Defines the [`TaskService`] trait the engine consumes. Concrete
//! implementations live with the embedding application (an HTTP or
//! backend-as-a-service client); [`memory::MemoryService`] is the
//! in-process implementation used by the test suites and demos.

pub mod memory;

pub use memory::MemoryService;

use taskdeck_model::{Task, TaskDraft, TaskId, TaskPatch};
use tokio::sync::mpsc;

/// Errors that can occur when talking to the remote data service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service could not be reached or timed out.
    #[error("service unavailable")]
    Unavailable,

    /// The service rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The referenced task does not exist on the service.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The change feed connection was closed.
    #[error("feed connection closed")]
    ConnectionClosed,
}

/// A live subscription to the service's change feed.
///
/// The feed delivers **full snapshots** of the task set, not deltas.
/// Dropping the feed unsubscribes.
pub struct TaskFeed {
    rx: mpsc::Receiver<Vec<Task>>,
}

impl TaskFeed {
    /// Wraps a receiver produced by a service implementation.
    #[must_use]
    pub const fn from_receiver(rx: mpsc::Receiver<Vec<Task>>) -> Self {
        Self { rx }
    }

    /// Receives the next snapshot, or `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<Vec<Task>> {
        self.rx.recv().await
    }
}

/// Async interface to the remote task data service.
///
/// # Invariant
///
/// Implementations are authoritative for task ids and timestamps: `create`
/// returns the task with its server-assigned id, and `update` returns the
/// full merged task with server-derived fields (such as `updated_at`)
/// corrected.
pub trait TaskService: Send + Sync {
    /// Fetch the full task set.
    fn fetch_all(&self) -> impl std::future::Future<Output = Result<Vec<Task>, ServiceError>> + Send;

    /// Create a task from a draft; the service assigns id and timestamps.
    fn create(
        &self,
        draft: &TaskDraft,
    ) -> impl std::future::Future<Output = Result<Task, ServiceError>> + Send;

    /// Apply a partial update and return the authoritative merged task.
    fn update(
        &self,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<Task, ServiceError>> + Send;

    /// Delete a task.
    fn delete(
        &self,
        id: TaskId,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;

    /// Open a change-feed subscription delivering full snapshots.
    ///
    /// `buffer` bounds the snapshot channel; a slow consumer may miss
    /// intermediate snapshots, which is safe because every snapshot carries
    /// the full state.
    fn subscribe(
        &self,
        buffer: usize,
    ) -> impl std::future::Future<Output = Result<TaskFeed, ServiceError>> + Send;
}
