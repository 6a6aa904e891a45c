//! Integration tests for the engine facade: filters, visible subset,
//! derived stats, and error/loading signals as the UI layer consumes them.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use taskdeck::config::EngineConfig;
use taskdeck::engine::{EngineEvent, SyncEngine};
use taskdeck::service::MemoryService;
use taskdeck_model::{
    FilterSpec, Priority, ProjectFilter, ProjectId, TaskDraft, TaskStatus,
};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn make_engine() -> (Arc<SyncEngine<MemoryService>>, mpsc::Receiver<EngineEvent>) {
    SyncEngine::new(MemoryService::new(), &EngineConfig::default())
}

fn draft(title: &str, status: TaskStatus, priority: Priority) -> TaskDraft {
    let mut draft = TaskDraft::new(title);
    draft.status = Some(status);
    draft.priority = Some(priority);
    draft
}

/// Drains all buffered engine events.
fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// --- filters and the visible subset ---

#[tokio::test]
async fn empty_filter_shows_the_whole_collection_in_order() {
    let (engine, _rx) = make_engine();
    for title in ["one", "two", "three"] {
        engine
            .create_task(&TaskDraft::new(title))
            .await
            .expect("create");
    }

    assert_eq!(engine.visible_tasks(), engine.tasks());
}

#[tokio::test]
async fn set_filters_recomputes_the_visible_subset() {
    let (engine, _rx) = make_engine();
    engine
        .create_task(&draft("urgent work", TaskStatus::Todo, Priority::Urgent))
        .await
        .expect("create");
    engine
        .create_task(&draft("background", TaskStatus::Backlog, Priority::Low))
        .await
        .expect("create");

    engine.set_filters(FilterSpec {
        statuses: BTreeSet::from([TaskStatus::Todo]),
        ..FilterSpec::default()
    });
    let visible = engine.visible_tasks();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].title, "urgent work");

    // Back to the identity filter.
    engine.set_filters(FilterSpec::default());
    assert_eq!(engine.visible_tasks().len(), 2);
}

#[tokio::test]
async fn visible_subset_follows_collection_changes() {
    let (engine, _rx) = make_engine();
    let task = engine
        .create_task(&draft("active item", TaskStatus::Todo, Priority::Medium))
        .await
        .expect("create");

    engine.set_filters(FilterSpec {
        statuses: BTreeSet::from([TaskStatus::Backlog, TaskStatus::Todo, TaskStatus::InProgress]),
        ..FilterSpec::default()
    });
    assert_eq!(engine.visible_tasks().len(), 1);

    // The optimistic DONE flip drops the task out of the active view at
    // once, before any remote round-trip.
    engine.mark_done(task.id).expect("mark_done");
    assert!(engine.visible_tasks().is_empty());

    // Undo brings it straight back.
    assert!(engine.undo_mark_done(task.id));
    assert_eq!(engine.visible_tasks().len(), 1);
}

#[tokio::test]
async fn project_filter_sentinel_separates_unassigned_tasks() {
    let (engine, _rx) = make_engine();
    let project = ProjectId::new();

    let mut filed = TaskDraft::new("filed");
    filed.project_id = Some(project);
    engine.create_task(&filed).await.expect("create");
    engine
        .create_task(&TaskDraft::new("loose"))
        .await
        .expect("create");

    engine.set_filters(FilterSpec {
        project: Some(ProjectFilter::Unassigned),
        ..FilterSpec::default()
    });
    assert_eq!(engine.visible_tasks()[0].title, "loose");

    engine.set_filters(FilterSpec {
        project: Some(ProjectFilter::Project(project)),
        ..FilterSpec::default()
    });
    assert_eq!(engine.visible_tasks()[0].title, "filed");
}

#[tokio::test]
async fn filter_spec_accessor_reflects_the_last_set_value() {
    let (engine, _rx) = make_engine();
    let spec = FilterSpec {
        search: Some("meeting".to_string()),
        ..FilterSpec::default()
    };
    engine.set_filters(spec.clone());
    assert_eq!(engine.filter_spec(), spec);
}

// --- derived stats ---

#[tokio::test]
async fn stats_track_every_collection_change() {
    let (engine, _rx) = make_engine();
    let project = ProjectId::new();

    let mut filed = draft("filed", TaskStatus::InProgress, Priority::High);
    filed.project_id = Some(project);
    engine.create_task(&filed).await.expect("create");
    engine
        .create_task(&draft("loose", TaskStatus::Todo, Priority::Low))
        .await
        .expect("create");

    let stats = engine.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.status_count(TaskStatus::InProgress), 1);
    assert_eq!(stats.status_count(TaskStatus::Todo), 1);
    assert_eq!(stats.project_count(Some(project)), 1);
    assert_eq!(stats.project_count(None), 1);

    let task = engine.tasks()[1].clone();
    engine.delete_task(task.id).await.expect("delete");
    assert_eq!(engine.stats().total, 1);
}

#[tokio::test]
async fn changing_filters_does_not_recompute_stats() {
    let (engine, _rx) = make_engine();
    engine
        .create_task(&TaskDraft::new("steady"))
        .await
        .expect("create");

    let recomputations = engine.stats_recomputations();
    engine.set_filters(FilterSpec {
        search: Some("anything".to_string()),
        ..FilterSpec::default()
    });
    assert_eq!(engine.stats_recomputations(), recomputations);
}

// --- events and error signals ---

#[tokio::test]
async fn mutations_emit_collection_and_stats_events() {
    let (engine, mut rx) = make_engine();
    engine
        .create_task(&TaskDraft::new("noisy"))
        .await
        .expect("create");

    let events = drain(&mut rx);
    assert!(events.contains(&EngineEvent::CollectionChanged));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::StatsChanged(stats) if stats.total == 1))
    );
}

#[tokio::test]
async fn write_failures_surface_through_last_error() {
    let (engine, _rx) = make_engine();
    engine.service().fail_next_write();
    let err = engine
        .create_task(&TaskDraft::new("unlucky"))
        .await
        .expect_err("create should fail");

    assert_eq!(engine.last_error(), Some(err));
    engine.clear_error();
    assert!(engine.last_error().is_none());
}

#[tokio::test]
async fn manual_refresh_recovers_from_a_failed_fetch() {
    let (engine, _rx) = make_engine();
    engine
        .create_task(&TaskDraft::new("kept remotely"))
        .await
        .expect("create");

    engine.service().fail_next_fetch();
    engine.refresh().await.expect_err("fetch should fail");
    assert!(engine.last_error().is_some());

    // A UI-driven retry.
    let tasks = engine.refresh().await.expect("retry succeeds");
    assert_eq!(tasks.len(), 1);
    assert!(engine.last_error().is_none());
}
