use super::*;
use crate::clock::SystemClock;
use crate::reminders::types::DueTime;
use chrono::Local;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct RecordingNotifier {
    alerts: StdMutex<Vec<ReminderAlert>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    fn ids(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.entity_id.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &ReminderAlert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("notification center unavailable");
        }
        Ok(())
    }
}

fn setup() -> (Arc<RecordingNotifier>, ReminderScheduler) {
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler =
        ReminderScheduler::new(&ReminderConfig::default(), notifier.clone(), SystemClock::shared());
    (notifier, scheduler)
}

fn in_millis(ms: i64) -> NaiveDateTime {
    Local::now().naive_local() + TimeDelta::milliseconds(ms)
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test]
async fn test_fires_once_at_due_time() {
    let (notifier, scheduler) = setup();
    let mut rx = scheduler.subscribe();
    let due = in_millis(100);
    let entities = vec![TrackedEntity::due_at("t1", "stand-up", due)];

    scheduler.sync(&entities).await;
    assert_eq!(scheduler.scheduled_due("t1").await, Some(due));
    sleep_ms(50).await;
    assert!(notifier.ids().is_empty());

    sleep_ms(250).await;
    assert_eq!(notifier.ids(), vec!["t1"]);
    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.entity_id, "t1");
    assert_eq!(alert.title, "stand-up");
    assert_eq!(alert.due, due);

    // Re-observing the same due time never fires again
    scheduler.sync(&entities).await;
    sleep_ms(150).await;
    assert_eq!(notifier.ids().len(), 1);
    assert_eq!(scheduler.scheduled_count().await, 0);
    assert_eq!(scheduler.delivered_due("t1").await, Some(due));
}

#[tokio::test]
async fn test_replace_cancels_original_timer() {
    let (notifier, scheduler) = setup();
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", in_millis(100))])
        .await;
    let moved = in_millis(300);
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", moved)])
        .await;

    sleep_ms(200).await;
    assert!(notifier.ids().is_empty());

    sleep_ms(250).await;
    let alerts = notifier.alerts.lock().unwrap().clone();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].due, moved);
}

#[tokio::test]
async fn test_removal_suppresses_alert() {
    let (notifier, scheduler) = setup();
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", in_millis(100))])
        .await;
    scheduler.sync(&[]).await;
    assert_eq!(scheduler.scheduled_count().await, 0);

    sleep_ms(250).await;
    assert!(notifier.ids().is_empty());
}

#[tokio::test]
async fn test_bare_dates_are_not_tracked() {
    let (_notifier, scheduler) = setup();
    let today = Local::now().date_naive();
    scheduler
        .sync(&[
            TrackedEntity::new("t1", "taxes", Some(DueTime::Date(today))),
            TrackedEntity::new("t2", "someday", None),
        ])
        .await;
    assert_eq!(scheduler.scheduled_count().await, 0);
}

#[tokio::test]
async fn test_switching_to_bare_date_cancels_timer() {
    let (notifier, scheduler) = setup();
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "taxes", in_millis(100))])
        .await;
    let today = Local::now().date_naive();
    scheduler
        .sync(&[TrackedEntity::new("t1", "taxes", Some(DueTime::Date(today)))])
        .await;

    sleep_ms(250).await;
    assert!(notifier.ids().is_empty());
}

#[tokio::test]
async fn test_recently_missed_fires_immediately() {
    let (notifier, scheduler) = setup();
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", in_millis(-30_000))])
        .await;
    sleep_ms(100).await;
    assert_eq!(notifier.ids(), vec!["t1"]);
}

#[tokio::test]
async fn test_long_missed_is_ignored() {
    let (notifier, scheduler) = setup();
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", in_millis(-3_600_000))])
        .await;
    assert_eq!(scheduler.scheduled_count().await, 0);
    sleep_ms(100).await;
    assert!(notifier.ids().is_empty());
}

#[tokio::test]
async fn test_notifier_failure_still_marks_delivered() {
    let (notifier, scheduler) = setup();
    notifier.fail.store(true, Ordering::SeqCst);
    let due = in_millis(50);
    let entities = vec![TrackedEntity::due_at("t1", "stand-up", due)];

    scheduler.sync(&entities).await;
    sleep_ms(200).await;
    assert_eq!(scheduler.delivered_due("t1").await, Some(due));

    scheduler.sync(&entities).await;
    sleep_ms(150).await;
    assert_eq!(notifier.ids().len(), 1);
}

#[tokio::test]
async fn test_new_due_time_after_delivery_fires_again() {
    let (notifier, scheduler) = setup();
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", in_millis(50))])
        .await;
    sleep_ms(200).await;
    assert_eq!(notifier.ids().len(), 1);

    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", in_millis(50))])
        .await;
    sleep_ms(200).await;
    assert_eq!(notifier.ids().len(), 2);
}

#[tokio::test]
async fn test_title_change_keeps_timer() {
    let (notifier, scheduler) = setup();
    let due = in_millis(100);
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "stand-up", due)])
        .await;
    scheduler
        .sync(&[TrackedEntity::due_at("t1", "daily stand-up", due)])
        .await;

    sleep_ms(250).await;
    let alerts = notifier.alerts.lock().unwrap().clone();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "daily stand-up");
}

struct FixedSource(Vec<TrackedEntity>);

#[async_trait]
impl EntitySource for FixedSource {
    async fn tracked_entities(&self) -> Result<Vec<TrackedEntity>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_refresh_loop_feeds_sync() {
    let (notifier, scheduler) = setup();
    let source = Arc::new(FixedSource(vec![TrackedEntity::due_at(
        "t1",
        "stand-up",
        in_millis(100),
    )]));

    scheduler.start(source).await;
    sleep_ms(300).await;
    assert_eq!(notifier.ids(), vec!["t1"]);
    scheduler.stop().await;
}

#[tokio::test]
async fn test_stop_cancels_pending_timers() {
    let (notifier, scheduler) = setup();
    let source = Arc::new(FixedSource(vec![TrackedEntity::due_at(
        "t1",
        "stand-up",
        in_millis(200),
    )]));

    scheduler.start(source).await;
    sleep_ms(50).await;
    scheduler.stop().await;
    assert_eq!(scheduler.scheduled_count().await, 0);

    sleep_ms(300).await;
    assert!(notifier.ids().is_empty());
}
