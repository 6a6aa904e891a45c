//! Core task types for `TaskDeck`.
//!
//! Defines the task record owned by the sync engine's collection store,
//! plus the two input shapes the engine accepts: [`TaskDraft`] for creation
//! (the server assigns the id and timestamps) and [`TaskPatch`] for partial
//! updates (unset fields are left unchanged).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
///
/// A task's id never changes across its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a project a task may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Creates a new time-ordered project identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `ProjectId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow status of a task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Captured but not yet scheduled.
    Backlog,
    /// Ready to be worked on.
    Todo,
    /// Actively being worked on.
    InProgress,
    /// Completed.
    Done,
    /// Hidden from regular views without being deleted.
    Archived,
}

impl TaskStatus {
    /// Whether this status counts as "active" (not completed or archived).
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Done | Self::Archived)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backlog => write!(f, "backlog"),
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Priority of a task. Ordered so that `Low < Medium < High < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Can wait indefinitely.
    Low,
    /// The default for new tasks.
    Medium,
    /// Should be handled soon.
    High,
    /// Needs attention now.
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// A task record as held in the engine's collection.
///
/// The remote data service is authoritative for `id`, `created_at`, and
/// `updated_at`; everything else is user-editable through [`TaskPatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID v7, time-ordered).
    pub id: TaskId,
    /// Task title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Workflow status.
    pub status: TaskStatus,
    /// Priority.
    pub priority: Priority,
    /// Optional due instant.
    pub due_at: Option<DateTime<Utc>>,
    /// Tags, unordered and unique within the task.
    pub tags: BTreeSet<String>,
    /// Project this task belongs to, if any.
    pub project_id: Option<ProjectId>,
    /// Manual sort position, if the user has ordered this task by hand.
    pub position: Option<i64>,
    /// When the task was created (server-assigned).
    pub created_at: DateTime<Utc>,
    /// When the task was last modified (server-derived).
    pub updated_at: DateTime<Utc>,
}

/// Errors produced by draft and patch validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {MAX_TASK_TITLE_LENGTH} characters)")]
    TitleTooLong,
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

/// Input shape for creating a task.
///
/// Only the title is required; missing status and priority default to
/// [`TaskStatus::Todo`] and [`Priority::Medium`] when the draft is
/// materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDraft {
    /// Task title (required, non-empty).
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial status; defaults to `Todo`.
    pub status: Option<TaskStatus>,
    /// Initial priority; defaults to `Medium`.
    pub priority: Option<Priority>,
    /// Optional due instant.
    pub due_at: Option<DateTime<Utc>>,
    /// Initial tags.
    pub tags: BTreeSet<String>,
    /// Project to file the task under, if any.
    pub project_id: Option<ProjectId>,
    /// Manual sort position, if any.
    pub position: Option<i64>,
}

impl TaskDraft {
    /// Creates a draft with the given title and all other fields defaulted.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Validates the draft.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TitleEmpty`] if the title is empty, or
    /// [`ValidationError::TitleTooLong`] if it exceeds
    /// [`MAX_TASK_TITLE_LENGTH`] characters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)
    }

    /// Materializes the draft into a full [`Task`], applying defaults.
    ///
    /// Used by service implementations when acting as the authoritative
    /// side: the caller supplies the assigned id and the creation instant.
    #[must_use]
    pub fn materialize(&self, id: TaskId, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status.unwrap_or(TaskStatus::Todo),
            priority: self.priority.unwrap_or(Priority::Medium),
            due_at: self.due_at,
            tags: self.tags.clone(),
            project_id: self.project_id,
            position: self.position,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial update to an existing task.
///
/// `None` means "leave unchanged". Clearable fields (description, due date,
/// project, position) use a nested `Option` so that `Some(None)` clears the
/// field while `None` leaves it alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// Which task to update.
    pub id: TaskId,
    /// New title, if changing.
    pub title: Option<String>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// New status, if changing.
    pub status: Option<TaskStatus>,
    /// New priority, if changing.
    pub priority: Option<Priority>,
    /// New due instant (`Some(None)` clears it).
    pub due_at: Option<Option<DateTime<Utc>>>,
    /// Full replacement tag set, if changing.
    pub tags: Option<BTreeSet<String>>,
    /// New project (`Some(None)` moves the task out of any project).
    pub project_id: Option<Option<ProjectId>>,
    /// New manual sort position (`Some(None)` clears it).
    pub position: Option<Option<i64>>,
}

impl TaskPatch {
    /// Creates an empty patch for the given task.
    #[must_use]
    pub const fn new(id: TaskId) -> Self {
        Self {
            id,
            title: None,
            description: None,
            status: None,
            priority: None,
            due_at: None,
            tags: None,
            project_id: None,
            position: None,
        }
    }

    /// Sets a new title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets a new status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets a new priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets or clears the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets or clears the due instant.
    #[must_use]
    pub const fn with_due_at(mut self, due_at: Option<DateTime<Utc>>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Moves the task into (or out of) a project.
    #[must_use]
    pub const fn with_project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Sets or clears the manual sort position.
    #[must_use]
    pub const fn with_position(mut self, position: Option<i64>) -> Self {
        self.position = Some(position);
        self
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_at.is_none()
            && self.tags.is_none()
            && self.project_id.is_none()
            && self.position.is_none()
    }

    /// Validates the patch.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a new title is set but empty or
    /// over-long.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        Ok(())
    }

    /// Produces the merged task value without mutating the input.
    ///
    /// `updated_at` is left untouched: it is server-derived and corrected
    /// when the authoritative task comes back from the remote service.
    #[must_use]
    pub fn apply_to(&self, task: &Task) -> Task {
        let mut merged = task.clone();
        if let Some(title) = &self.title {
            merged.title = title.clone();
        }
        if let Some(description) = &self.description {
            merged.description = description.clone();
        }
        if let Some(status) = self.status {
            merged.status = status;
        }
        if let Some(priority) = self.priority {
            merged.priority = priority;
        }
        if let Some(due_at) = self.due_at {
            merged.due_at = due_at;
        }
        if let Some(tags) = &self.tags {
            merged.tags = tags.clone();
        }
        if let Some(project_id) = self.project_id {
            merged.project_id = project_id;
        }
        if let Some(position) = self.position {
            merged.position = position;
        }
        merged
    }
}
