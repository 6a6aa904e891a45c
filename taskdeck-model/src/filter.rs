//! Declarative task filtering for `TaskDeck`.
//!
//! A [`FilterSpec`] is a record of optional axes; an absent axis means "no
//! constraint". Evaluation is pure: a task is visible only if it passes
//! every specified axis (logical AND across axes), while within an axis a
//! set of allowed values is a logical OR.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Priority, ProjectId, Task, TaskStatus};

/// Constraint on the project axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectFilter {
    /// Only tasks filed under no project.
    Unassigned,
    /// Only tasks filed under exactly this project.
    Project(ProjectId),
}

/// A declarative filter over the task collection.
///
/// The default (empty) specification matches every task and preserves the
/// input order — it is the identity filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Statuses to include; empty means any status.
    pub statuses: BTreeSet<TaskStatus>,
    /// Priorities to include; empty means any priority.
    pub priorities: BTreeSet<Priority>,
    /// Project constraint; `None` means any project (or none).
    pub project: Option<ProjectFilter>,
    /// Inclusive lower bound on the due instant.
    pub due_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the due instant.
    pub due_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,
    /// Tags to match; a task qualifies if it carries any one of them.
    pub tags: BTreeSet<String>,
}

impl FilterSpec {
    /// Whether no axis is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
            && self.priorities.is_empty()
            && self.project.is_none()
            && self.due_after.is_none()
            && self.due_before.is_none()
            && self.search.as_ref().is_none_or(|s| s.is_empty())
            && self.tags.is_empty()
    }

    /// Evaluates the filter against a single task.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        match self.project {
            None => {}
            Some(ProjectFilter::Unassigned) => {
                if task.project_id.is_some() {
                    return false;
                }
            }
            Some(ProjectFilter::Project(id)) => {
                if task.project_id != Some(id) {
                    return false;
                }
            }
        }

        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }

        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }

        // OR across requested tags: any one shared tag qualifies.
        if !self.tags.is_empty() && task.tags.is_disjoint(&self.tags) {
            return false;
        }

        if let Some(needle) = &self.search
            && !needle.is_empty()
            && !search_matches(needle, task)
        {
            return false;
        }

        // Due bounds only filter tasks that have a due date.
        if let Some(due) = task.due_at {
            if let Some(after) = self.due_after
                && due < after
            {
                return false;
            }
            if let Some(before) = self.due_before
                && due > before
            {
                return false;
            }
        }

        true
    }

    /// Returns the visible subset of `tasks`, preserving input order.
    ///
    /// Never mutates its inputs; an empty specification returns the
    /// collection unchanged.
    #[must_use]
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        if self.is_empty() {
            return tasks.to_vec();
        }
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

/// Case-insensitive substring match over title and description.
fn search_matches(needle: &str, task: &Task) -> bool {
    let needle = needle.to_lowercase();
    if task.title.to_lowercase().contains(&needle) {
        return true;
    }
    task.description
        .as_ref()
        .is_some_and(|d| d.to_lowercase().contains(&needle))
}
