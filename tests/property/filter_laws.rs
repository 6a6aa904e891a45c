//! Property-based tests for the filter predicate engine.
//!
//! Uses proptest to verify the filter laws:
//! 1. The empty specification is the identity filter (content and order).
//! 2. Combining constraints across axes narrows the result: the filtered
//!    set is a subset of what either spec alone produces.
//! 3. A task without a due date is never excluded by a due bound.
//! 4. Filtering preserves the relative order of the input collection.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use taskdeck_model::{
    FilterSpec, Priority, ProjectFilter, ProjectId, Task, TaskDraft, TaskId, TaskStatus,
};

// --- Strategies for model types ---

/// Strategy for generating arbitrary `TaskStatus` values.
fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Backlog),
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
        Just(TaskStatus::Archived),
    ]
}

/// Strategy for generating arbitrary `Priority` values.
fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Urgent),
    ]
}

/// A small pool of project ids so collisions between tasks and filters
/// actually happen.
fn arb_project() -> impl Strategy<Value = Option<ProjectId>> {
    (0u128..4).prop_map(|n| {
        if n == 0 {
            None
        } else {
            Some(ProjectId::from_uuid(Uuid::from_u128(n)))
        }
    })
}

/// Due dates drawn from a narrow window (plus "no due date") so bounds
/// exercise both sides.
fn arb_due() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop_oneof![
        Just(None),
        (0u32..60).prop_map(|d| Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .map(|base| base + chrono::Duration::days(i64::from(d)))),
    ]
}

/// Tags drawn from a fixed vocabulary.
fn arb_tags() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(
        prop_oneof![
            Just("home".to_string()),
            Just("work".to_string()),
            Just("errand".to_string()),
            Just("deep".to_string()),
        ],
        0..3,
    )
}

/// Strategy for generating arbitrary `Task` values.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        "[a-z ]{1,20}",
        proptest::option::of("[a-z ]{0,30}"),
        arb_status(),
        arb_priority(),
        arb_due(),
        arb_tags(),
        arb_project(),
    )
        .prop_map(
            |(title, description, status, priority, due_at, tags, project_id)| {
                let mut task = TaskDraft::new(title).materialize(
                    TaskId::new(),
                    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
                        .single()
                        .expect("valid instant"),
                );
                task.description = description;
                task.status = status;
                task.priority = priority;
                task.due_at = due_at;
                task.tags = tags;
                task.project_id = project_id;
                task
            },
        )
}

/// Strategy for generating arbitrary task collections.
fn arb_collection() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_task(), 0..12)
}

/// Spec constraining only the status and tag axes.
fn arb_spec_status_tags() -> impl Strategy<Value = FilterSpec> {
    (
        prop::collection::btree_set(arb_status(), 0..3),
        arb_tags(),
    )
        .prop_map(|(statuses, tags)| FilterSpec {
            statuses,
            tags,
            ..FilterSpec::default()
        })
}

/// Spec constraining only the priority, project, and due axes.
fn arb_spec_priority_project_due() -> impl Strategy<Value = FilterSpec> {
    (
        prop::collection::btree_set(arb_priority(), 0..3),
        proptest::option::of(arb_project().prop_map(|p| match p {
            None => ProjectFilter::Unassigned,
            Some(id) => ProjectFilter::Project(id),
        })),
        arb_due(),
    )
        .prop_map(|(priorities, project, due_after)| FilterSpec {
            priorities,
            project,
            due_after,
            ..FilterSpec::default()
        })
}

/// Merges two specs that constrain disjoint axes.
fn merge_disjoint(a: &FilterSpec, b: &FilterSpec) -> FilterSpec {
    FilterSpec {
        statuses: a.statuses.clone(),
        tags: a.tags.clone(),
        priorities: b.priorities.clone(),
        project: b.project,
        due_after: b.due_after,
        due_before: b.due_before,
        search: None,
    }
}

// --- Property tests ---

proptest! {
    /// The empty specification returns the collection unchanged, in
    /// content and in order.
    #[test]
    fn empty_spec_is_the_identity_filter(collection in arb_collection()) {
        let spec = FilterSpec::default();
        prop_assert_eq!(spec.apply(&collection), collection);
    }

    /// Merging constraints across axes yields a subset of what either
    /// spec produces on its own (AND across axes).
    #[test]
    fn merged_axes_narrow_the_result(
        collection in arb_collection(),
        spec_a in arb_spec_status_tags(),
        spec_b in arb_spec_priority_project_due(),
    ) {
        let merged = merge_disjoint(&spec_a, &spec_b);
        let combined = merged.apply(&collection);
        let only_a = spec_a.apply(&collection);
        let only_b = spec_b.apply(&collection);

        for task in &combined {
            prop_assert!(only_a.contains(task));
            prop_assert!(only_b.contains(task));
        }
    }

    /// A task lacking a due date is never excluded by a due bound.
    #[test]
    fn due_bounds_never_exclude_dateless_tasks(
        mut task in arb_task(),
        bound in arb_due().prop_filter("need a bound", Option::is_some),
    ) {
        task.due_at = None;
        let from_spec = FilterSpec { due_after: bound, ..FilterSpec::default() };
        prop_assert!(from_spec.matches(&task));
        let to_spec = FilterSpec { due_before: bound, ..FilterSpec::default() };
        prop_assert!(to_spec.matches(&task));
    }

    /// Filtering preserves the relative order of the input.
    #[test]
    fn filtering_preserves_relative_order(
        collection in arb_collection(),
        spec in arb_spec_status_tags(),
    ) {
        let filtered = spec.apply(&collection);
        let positions: Vec<usize> = filtered
            .iter()
            .map(|task| {
                collection
                    .iter()
                    .position(|t| t.id == task.id)
                    .expect("filtered tasks come from the input")
            })
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    /// The filter never mutates its input.
    #[test]
    fn filtering_never_mutates_the_input(
        collection in arb_collection(),
        spec in arb_spec_priority_project_due(),
    ) {
        let before = collection.clone();
        let _ = spec.apply(&collection);
        prop_assert_eq!(collection, before);
    }
}
