//! Derived aggregate counts over the task collection.
//!
//! Stats are read-only and recomputed from scratch whenever the collection
//! changes (the engine wires this up as a store observer). They are never
//! authoritative.

use std::collections::BTreeMap;

use taskdeck_model::{ProjectId, Task, TaskStatus};

/// Aggregate counts derived from the current task collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Total number of tasks.
    pub total: usize,
    /// Task count per status.
    pub by_status: BTreeMap<TaskStatus, usize>,
    /// Task count per project; the `None` key counts project-less tasks.
    pub by_project: BTreeMap<Option<ProjectId>, usize>,
}

impl TaskStats {
    /// Computes stats over a collection.
    #[must_use]
    pub fn compute(tasks: &[Task]) -> Self {
        let mut stats = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            *stats.by_status.entry(task.status).or_insert(0) += 1;
            *stats.by_project.entry(task.project_id).or_insert(0) += 1;
        }
        stats
    }

    /// Count of tasks with the given status.
    #[must_use]
    pub fn status_count(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Count of tasks in the given project (`None` for project-less tasks).
    #[must_use]
    pub fn project_count(&self, project: Option<ProjectId>) -> usize {
        self.by_project.get(&project).copied().unwrap_or(0)
    }
}
