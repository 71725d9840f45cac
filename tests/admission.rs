//! Admission control and scheduling properties of the task manager

mod common;

use common::*;
use snapx::manager::TaskManager;
use snapx::task::TaskStatus;
use snapx::uploaders::UploaderRegistry;
use snapx::worker::WorkerEventKind;

#[tokio::test]
async fn fifteen_workers_with_limit_three() {
    let uploader = GatedUploader::new();
    let mut h = harness(3, registry_with(uploader.clone()));

    let workers: Vec<_> = (0..15).map(|i| text_worker(&format!("task-{i}"))).collect();
    for worker in &workers {
        h.tasks.start(worker.clone()).await;
    }

    eventually("three uploads in flight", || uploader.in_flight() == 3).await;
    assert_eq!(h.tasks.working_count().await, 3);
    assert_eq!(h.tasks.queued_count().await, 12);

    uploader.release(15);
    wait_idle(&h.tasks).await;

    assert_eq!(uploader.max_in_flight(), 3);
    for worker in &workers {
        assert_eq!(worker.status(), TaskStatus::Completed);
    }

    // Admission follows registration order
    let admitted: Vec<_> = drain_events(&mut h.events)
        .into_iter()
        .filter(|(_, kind)| matches!(kind, WorkerEventKind::StatusChanged(TaskStatus::Preparing)))
        .map(|(id, _)| id)
        .collect();
    let registered: Vec<_> = workers.iter().map(|w| w.id()).collect();
    assert_eq!(admitted, registered);

    let metrics = h.tasks.metrics();
    assert_eq!(metrics.tasks_started, 15);
    assert_eq!(metrics.tasks_completed, 15);
    assert_eq!(h.history.items().len(), 15);
}

#[tokio::test]
async fn limit_one_runs_strictly_in_order() {
    let uploader = GatedUploader::new();
    let h = harness(1, registry_with(uploader.clone()));

    for i in 0..5 {
        h.tasks.start(text_worker(&format!("task-{i}"))).await;
    }
    for expected in 1..=5 {
        eventually("next upload", || uploader.calls().len() == expected).await;
        assert_eq!(uploader.in_flight(), 1);
        uploader.release(1);
    }
    wait_idle(&h.tasks).await;

    assert_eq!(
        uploader.calls(),
        vec!["task-0", "task-1", "task-2", "task-3", "task-4"]
    );
    assert_eq!(uploader.max_in_flight(), 1);
}

#[tokio::test]
async fn zero_limit_is_unlimited() {
    let uploader = GatedUploader::new();
    let h = harness(0, registry_with(uploader.clone()));

    for i in 0..10 {
        h.tasks.start(text_worker(&format!("task-{i}"))).await;
    }

    eventually("all uploads in flight", || uploader.in_flight() == 10).await;
    assert_eq!(h.tasks.queued_count().await, 0);

    uploader.release(10);
    wait_idle(&h.tasks).await;
    assert_eq!(h.tasks.metrics().tasks_completed, 10);
}

#[tokio::test]
async fn progression_is_idempotent() {
    let uploader = GatedUploader::new();
    let h = harness(2, registry_with(uploader.clone()));

    for i in 0..4 {
        h.tasks.start(text_worker(&format!("task-{i}"))).await;
    }
    h.tasks.progress().await;
    h.tasks.progress().await;

    eventually("two uploads in flight", || uploader.in_flight() == 2).await;
    assert_eq!(h.tasks.working_count().await, 2);
    assert_eq!(h.tasks.queued_count().await, 2);

    uploader.release(4);
    wait_idle(&h.tasks).await;
    assert_eq!(uploader.max_in_flight(), 2);
}

#[tokio::test]
async fn remove_while_working_keeps_slot_until_terminal() {
    let uploader = GatedUploader::new();
    let mut h = harness(1, registry_with(uploader.clone()));

    let first = text_worker("first");
    let second = text_worker("second");
    h.tasks.start(first.clone()).await;
    h.tasks.start(second.clone()).await;

    eventually("first upload in flight", || uploader.in_flight() == 1).await;
    assert!(h.tasks.remove(&first).await);
    assert!(!h.tasks.remove(&first).await);

    eventually("second upload in flight", || uploader.calls().len() == 2).await;
    uploader.release(1);
    wait_idle(&h.tasks).await;

    assert_eq!(first.status(), TaskStatus::Stopped);
    assert_eq!(second.status(), TaskStatus::Completed);
    assert_eq!(first.image(), None);
    assert!(h.tasks.get(first.id()).await.is_none());
    assert_eq!(uploader.max_in_flight(), 1);

    // The second worker was admitted only after the first one stopped
    let events = drain_events(&mut h.events);
    let stopped_at = events
        .iter()
        .position(|(id, kind)| {
            *id == first.id() && matches!(kind, WorkerEventKind::StatusChanged(TaskStatus::Stopped))
        })
        .unwrap();
    let admitted_at = events
        .iter()
        .position(|(id, kind)| {
            *id == second.id()
                && matches!(kind, WorkerEventKind::StatusChanged(TaskStatus::Preparing))
        })
        .unwrap();
    assert!(stopped_at < admitted_at);
}

#[tokio::test]
async fn history_workers_are_listed_not_run() {
    let uploader = GatedUploader::new();
    let h = harness(1, registry_with(uploader.clone()));

    let done = text_worker("done");
    h.tasks.start(done.clone()).await;
    uploader.release(1);
    wait_idle(&h.tasks).await;
    assert_eq!(h.history.items().len(), 1);

    let fresh = TaskManager::builder()
        .context(context(UploaderRegistry::new()))
        .upload_limit(1)
        .history(h.history.clone())
        .build();
    assert_eq!(fresh.load_history(10).await, 1);

    let workers = fresh.workers().await;
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].id(), done.id());
    assert_eq!(workers[0].status(), TaskStatus::History);
    assert!(workers[0].info().await.result.has_url());

    fresh.progress().await;
    assert_eq!(workers[0].status(), TaskStatus::History);
    assert_eq!(fresh.working_count().await, 0);
    wait_idle(&fresh).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_event_precedes_admission_under_contention() {
    let uploader = GatedUploader::new();
    let mut h = harness(1, registry_with(uploader.clone()));
    uploader.release(20);

    let workers: Vec<_> = (0..20).map(|i| text_worker(&format!("task-{i}"))).collect();
    for worker in &workers {
        h.tasks.start(worker.clone()).await;
        tokio::task::yield_now().await;
    }
    wait_idle(&h.tasks).await;

    let events = per_worker(&drain_events(&mut h.events));
    for worker in &workers {
        let changes = status_changes(&events[&worker.id()]);
        assert_eq!(changes.first(), Some(&TaskStatus::InQueue), "{changes:?}");
        assert_eq!(changes.last(), Some(&TaskStatus::Completed));
    }
}
