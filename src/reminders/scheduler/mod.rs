//! Exact-time reminder delivery.
//!
//! Each tracked entity with a time-qualified due time gets one timer task.
//! A timer carries the generation it was armed with; when it wakes it only
//! fires if the entity's current record still has that generation, so a
//! timer that lost a race with a replace or removal does nothing.

use super::types::{DueTime, ReminderAlert, TrackedEntity};
use crate::clock::Clock;
use crate::config::ReminderConfig;
use crate::utils::task_tracker::TaskTracker;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const REFRESH_TASK: &str = "reminder_refresh";
const ALERT_CHANNEL_CAPACITY: usize = 64;

/// Delivers an alert to the user (platform toast, tray, chat message).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &ReminderAlert) -> Result<()>;
}

/// Supplies the current set of due-capable entities for the refresh loop.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn tracked_entities(&self) -> Result<Vec<TrackedEntity>>;
}

struct Scheduled {
    due: NaiveDateTime,
    title: String,
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    scheduled: HashMap<String, Scheduled>,
    delivered: HashMap<String, NaiveDateTime>,
    next_generation: u64,
}

impl SchedulerState {
    fn cancel(&mut self, id: &str) -> bool {
        match self.scheduled.remove(id) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct ReminderScheduler {
    state: Arc<Mutex<SchedulerState>>,
    notifier: Arc<dyn Notifier>,
    alerts: broadcast::Sender<ReminderAlert>,
    clock: Arc<dyn Clock>,
    missed_grace: TimeDelta,
    refresh_interval: Duration,
    task_tracker: TaskTracker,
}

impl ReminderScheduler {
    pub fn new(
        config: &ReminderConfig,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        let missed_grace = i64::try_from(config.missed_grace_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            state: Arc::new(Mutex::new(SchedulerState::default())),
            notifier,
            alerts,
            clock,
            missed_grace,
            refresh_interval: Duration::from_secs(config.refresh_interval_secs.max(1)),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Receive every alert as it fires.
    pub fn subscribe(&self) -> broadcast::Receiver<ReminderAlert> {
        self.alerts.subscribe()
    }

    /// Reconcile timers with the full current set of tracked entities.
    ///
    /// Entities missing from `entities`, or whose due time is a bare date,
    /// lose their timer and delivery history.
    pub async fn sync(&self, entities: &[TrackedEntity]) {
        let now = self.clock.now().naive_local();
        let mut state = self.state.lock().await;

        let mut seen = HashSet::new();
        for entity in entities {
            let Some(due) = entity.due.as_ref().and_then(DueTime::fire_at) else {
                continue;
            };
            seen.insert(entity.id.as_str());

            if state.delivered.get(&entity.id) == Some(&due) {
                continue;
            }
            // A different due time means the old delivery no longer applies
            state.delivered.remove(&entity.id);

            if let Some(existing) = state.scheduled.get_mut(&entity.id)
                && existing.due == due
            {
                existing.title.clone_from(&entity.title);
                continue;
            }

            if now - due > self.missed_grace {
                if state.cancel(&entity.id) {
                    debug!(
                        "cancelled reminder for {} (new due time long past)",
                        entity.id
                    );
                } else {
                    debug!("ignoring missed reminder for {} due {}", entity.id, due);
                }
                continue;
            }

            let replaced = state.cancel(&entity.id);
            let generation = state.next_generation;
            state.next_generation += 1;
            let delay = (due - now).to_std().unwrap_or(Duration::ZERO);
            let handle = self.arm(entity.id.clone(), due, generation, delay);
            state.scheduled.insert(
                entity.id.clone(),
                Scheduled {
                    due,
                    title: entity.title.clone(),
                    generation,
                    handle,
                },
            );
            if replaced {
                debug!(
                    "replaced reminder for {}: now due {} (in {:?})",
                    entity.id, due, delay
                );
            } else {
                debug!(
                    "scheduled reminder for {} due {} (in {:?})",
                    entity.id, due, delay
                );
            }
        }

        let gone: Vec<String> = state
            .scheduled
            .keys()
            .chain(state.delivered.keys())
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        for id in gone {
            if state.cancel(&id) {
                debug!("cancelled reminder for {} (no longer tracked)", id);
            }
            state.delivered.remove(&id);
        }
    }

    fn arm(
        &self,
        id: String,
        due: NaiveDateTime,
        generation: u64,
        delay: Duration,
    ) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(&id, due, generation).await;
        })
    }

    async fn fire(&self, id: &str, due: NaiveDateTime, generation: u64) {
        let alert = {
            let mut state = self.state.lock().await;
            let current = state
                .scheduled
                .get(id)
                .is_some_and(|s| s.generation == generation && s.due == due);
            if !current {
                debug!("stale reminder timer for {} ignored", id);
                return;
            }
            let Some(entry) = state.scheduled.remove(id) else {
                return;
            };
            // Mark before delivering: a failed notification is not retried
            state.delivered.insert(id.to_string(), due);
            ReminderAlert {
                id: Uuid::new_v4(),
                entity_id: id.to_string(),
                title: entry.title,
                due,
                fired_at: self.clock.now(),
            }
        };

        info!("reminder fired for {}: {}", alert.entity_id, alert.title);
        // No subscribers is fine
        let _ = self.alerts.send(alert.clone());
        if let Err(e) = self.notifier.notify(&alert).await {
            warn!("failed to deliver reminder for {}: {}", alert.entity_id, e);
        }
    }

    pub async fn scheduled_due(&self, id: &str) -> Option<NaiveDateTime> {
        self.state.lock().await.scheduled.get(id).map(|s| s.due)
    }

    pub async fn scheduled_count(&self) -> usize {
        self.state.lock().await.scheduled.len()
    }

    pub async fn delivered_due(&self, id: &str) -> Option<NaiveDateTime> {
        self.state.lock().await.delivered.get(id).copied()
    }

    /// Poll `source` every refresh interval and feed the result to [`sync`].
    ///
    /// [`sync`]: Self::sync
    pub async fn start(&self, source: Arc<dyn EntitySource>) {
        let scheduler = self.clone();
        let interval = self.refresh_interval;
        self.task_tracker
            .spawn(REFRESH_TASK, async move {
                loop {
                    match source.tracked_entities().await {
                        Ok(entities) => scheduler.sync(&entities).await,
                        Err(e) => warn!("failed to refresh tracked entities: {}", e),
                    }
                    tokio::time::sleep(interval).await;
                }
            })
            .await;
        info!("reminder scheduler started (refresh every {:?})", interval);
    }

    /// Stop the refresh loop and cancel every pending timer.
    pub async fn stop(&self) {
        self.task_tracker.abort(REFRESH_TASK).await;
        let mut state = self.state.lock().await;
        let count = state.scheduled.len();
        for (_, entry) in state.scheduled.drain() {
            entry.handle.abort();
        }
        info!(
            "reminder scheduler stopped ({} pending reminders cancelled)",
            count
        );
    }
}

#[cfg(test)]
mod tests;
