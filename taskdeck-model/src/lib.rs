//! `TaskDeck` — domain types shared by the sync engine and its embedders.

pub mod filter;
pub mod task;

pub use filter::{FilterSpec, ProjectFilter};
pub use task::{
    MAX_TASK_TITLE_LENGTH, Priority, ProjectId, Task, TaskDraft, TaskId, TaskPatch, TaskStatus,
    ValidationError,
};
