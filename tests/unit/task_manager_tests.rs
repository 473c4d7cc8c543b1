//! Unit tests for the in-memory task registry and its subscriptions.

use std::time::Duration;

use serde_json::json;

use agent_stream::models::task::TaskState;
use agent_stream::orchestrator::retention;
use agent_stream::orchestrator::task_manager::TaskManager;
use agent_stream::{AppError, Context};

#[tokio::test]
async fn create_uses_given_id_or_generates_one() {
    let tasks = TaskManager::new();
    let named = tasks.create(Some("t-1".into()), "echo").await.expect("create");
    assert_eq!(named.id, "t-1");
    assert_eq!(named.state, TaskState::Submitted);

    let generated = tasks.create(None, "echo").await.expect("create");
    assert!(!generated.id.is_empty());
    assert_ne!(generated.id, named.id);

    let blank = tasks.create(Some(String::new()), "echo").await.expect("create");
    assert!(!blank.id.is_empty());
    assert_eq!(tasks.len().await, 3);
}

#[tokio::test]
async fn duplicate_id_is_rejected() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    let err = tasks
        .create(Some("t-1".into()), "echo")
        .await
        .expect_err("duplicate");
    assert!(matches!(err, AppError::AlreadyExists(_)));
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let tasks = TaskManager::new();
    assert!(tasks.is_empty().await);
    assert!(matches!(tasks.get("nope").await, Err(AppError::NotFound(_))));
    assert!(matches!(
        tasks.set_state("nope", TaskState::Running).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        tasks.subscribe(&Context::background(), "nope").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn lifecycle_records_result() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    tasks.set_state("t-1", TaskState::Running).await.expect("run");

    let task = tasks
        .complete("t-1", json!({ "answer": 42 }))
        .await
        .expect("complete");
    assert_eq!(task.state, TaskState::Complete);
    assert!((task.progress - 1.0).abs() < f64::EPSILON);
    assert_eq!(task.result, Some(json!({ "answer": 42 })));
    assert!(task.updated_at >= task.created_at);
}

#[tokio::test]
async fn failure_records_message() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "fail").await.expect("create");
    tasks.set_state("t-1", TaskState::Running).await.expect("run");

    let task = tasks.fail("t-1", "agent: boom").await.expect("fail");
    assert_eq!(task.state, TaskState::Failed);
    assert_eq!(task.error.as_deref(), Some("agent: boom"));
}

#[tokio::test]
async fn terminal_task_rejects_further_changes() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    tasks.cancel("t-1").await.expect("cancel");

    assert!(matches!(
        tasks.set_state("t-1", TaskState::Running).await,
        Err(AppError::InvalidTransition(_))
    ));
    assert!(matches!(
        tasks.set_progress("t-1", 0.5).await,
        Err(AppError::InvalidTransition(_))
    ));
    assert!(matches!(
        tasks.complete("t-1", json!(null)).await,
        Err(AppError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn submitted_task_cannot_complete_directly() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    assert!(matches!(
        tasks.complete("t-1", json!(1)).await,
        Err(AppError::InvalidTransition(_))
    ));
    assert_eq!(tasks.get("t-1").await.expect("get").state, TaskState::Submitted);
}

#[tokio::test]
async fn progress_is_clamped() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    tasks.set_state("t-1", TaskState::Running).await.expect("run");

    let high = tasks.set_progress("t-1", 3.0).await.expect("progress");
    assert!((high.progress - 1.0).abs() < f64::EPSILON);
    let low = tasks.set_progress("t-1", -1.0).await.expect("progress");
    assert!(low.progress.abs() < f64::EPSILON);
}

// ── Subscriptions ────────────────────────────────────────────

#[tokio::test]
async fn subscription_yields_snapshot_then_updates_until_terminal() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    let mut updates = tasks
        .subscribe(&Context::background(), "t-1")
        .await
        .expect("subscribe");
    assert_eq!(updates.task_id(), "t-1");

    tasks.set_state("t-1", TaskState::Running).await.expect("run");
    tasks.set_progress("t-1", 0.5).await.expect("progress");
    tasks.complete("t-1", json!("done")).await.expect("complete");

    let states: Vec<_> = [
        updates.next().await,
        updates.next().await,
        updates.next().await,
        updates.next().await,
    ]
    .into_iter()
    .map(|update| update.expect("update").state)
    .collect();
    assert_eq!(
        states,
        vec![
            TaskState::Submitted,
            TaskState::Running,
            TaskState::Running,
            TaskState::Complete
        ]
    );
    assert!(updates.next().await.is_none());
    assert!(updates.next().await.is_none());
}

#[tokio::test]
async fn subscription_to_finished_task_yields_only_snapshot() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    tasks.cancel("t-1").await.expect("cancel");

    let mut updates = tasks
        .subscribe(&Context::background(), "t-1")
        .await
        .expect("subscribe");
    let first = updates.next().await.expect("snapshot");
    assert_eq!(first.state, TaskState::Cancelled);
    assert!(updates.next().await.is_none());
}

#[tokio::test]
async fn subscription_ends_when_context_stops() {
    let tasks = TaskManager::new();
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    let ctx = Context::background().with_cancel();
    let mut updates = tasks.subscribe(&ctx, "t-1").await.expect("subscribe");
    updates.next().await.expect("snapshot");

    let waiter = tokio::spawn(async move { updates.next().await });
    tokio::task::yield_now().await;
    ctx.cancel();

    let next = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("bounded response to cancellation")
        .expect("join");
    assert!(next.is_none());
}

#[tokio::test]
async fn lagging_subscriber_skips_but_still_sees_terminal_update() {
    let tasks = TaskManager::with_update_capacity(2);
    tasks.create(Some("t-1".into()), "echo").await.expect("create");
    let mut updates = tasks
        .subscribe(&Context::background(), "t-1")
        .await
        .expect("subscribe");
    updates.next().await.expect("snapshot");

    tasks.set_state("t-1", TaskState::Running).await.expect("run");
    for step in 1..=10 {
        tasks
            .set_progress("t-1", f64::from(step) / 10.0)
            .await
            .expect("progress");
    }
    tasks.complete("t-1", json!(1)).await.expect("complete");

    let mut last = None;
    while let Some(update) = updates.next().await {
        last = Some(update.state);
    }
    assert_eq!(last, Some(TaskState::Complete));
}

// ── Retention ────────────────────────────────────────────────

async fn finished(tasks: &TaskManager, id: &str) {
    tasks.create(Some(id.into()), "echo").await.expect("create");
    tasks.set_state(id, TaskState::Running).await.expect("run");
    tasks.complete(id, json!(null)).await.expect("complete");
}

#[tokio::test]
async fn purge_removes_only_finished_tasks_past_cutoff() {
    let tasks = TaskManager::new();
    finished(&tasks, "done").await;
    tasks.create(Some("pending".into()), "echo").await.expect("create");
    tasks.create(Some("running".into()), "echo").await.expect("create");
    tasks
        .set_state("running", TaskState::Running)
        .await
        .expect("run");

    let past = chrono::Utc::now() - chrono::Duration::hours(1);
    assert_eq!(tasks.purge_finished(past).await, 0);
    assert_eq!(tasks.len().await, 3);

    assert_eq!(tasks.purge_finished(chrono::Utc::now()).await, 1);
    assert!(matches!(
        tasks.get("done").await,
        Err(AppError::NotFound(_))
    ));
    assert!(tasks.get("pending").await.is_ok());
    assert!(tasks.get("running").await.is_ok());
}

#[tokio::test]
async fn retention_purge_honours_window() {
    let tasks = TaskManager::new();
    finished(&tasks, "t-1").await;

    assert_eq!(retention::purge(&tasks, Duration::from_secs(3600)).await, 0);
    assert!(tasks.get("t-1").await.is_ok());

    assert_eq!(retention::purge(&tasks, Duration::ZERO).await, 1);
    assert!(tasks.is_empty().await);
}

#[tokio::test]
async fn retention_task_stops_on_cancel() {
    let tasks = std::sync::Arc::new(TaskManager::new());
    finished(&tasks, "t-1").await;
    let cancel = tokio_util::sync::CancellationToken::new();

    let handle = retention::spawn_retention_task(
        std::sync::Arc::clone(&tasks),
        Duration::ZERO,
        cancel.clone(),
    );
    while !tasks.is_empty().await {
        tokio::task::yield_now().await;
    }
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("retention task exits")
        .expect("join");
}
