use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

async fn sleep_forever() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

#[tokio::test]
async fn test_spawn_and_cancel_all() {
    let tracker = TaskTracker::new();
    tracker.spawn("long_task", sleep_forever()).await;
    assert!(tracker.is_running("long_task").await);

    tracker.cancel_all().await;
    assert!(!tracker.is_running("long_task").await);
    assert!(tracker.tasks.lock().await.is_empty());
}

#[tokio::test]
async fn test_spawn_replaces_existing() {
    let tracker = TaskTracker::new();
    let hits = Arc::new(AtomicU32::new(0));

    let first = hits.clone();
    tracker
        .spawn("task", async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            first.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    // Replacing aborts the first before it can increment
    tracker.spawn("task", sleep_forever()).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.tasks.lock().await.len(), 1);
    tracker.cancel_all().await;
}

#[tokio::test]
async fn test_abort_by_name() {
    let tracker = TaskTracker::new();
    tracker.spawn("a", sleep_forever()).await;
    tracker.spawn("b", sleep_forever()).await;

    assert!(tracker.abort("a").await);
    assert!(!tracker.abort("a").await);
    assert!(!tracker.is_running("a").await);
    assert!(tracker.is_running("b").await);
    tracker.cancel_all().await;
}

#[tokio::test]
async fn test_finished_task_is_not_running() {
    let tracker = TaskTracker::new();
    tracker.spawn("quick", async {}).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!tracker.is_running("quick").await);
}

#[tokio::test]
async fn test_cancel_all_on_empty() {
    let tracker = TaskTracker::new();
    tracker.cancel_all().await;
    assert!(tracker.tasks.lock().await.is_empty());
}
