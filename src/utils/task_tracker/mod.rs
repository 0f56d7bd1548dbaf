//! Named background tasks.
//!
//! Each long-running loop (frame sampling, reminder refresh) is registered
//! under a name so it can be replaced or cancelled without leaking the
//! previous task.
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Default)]
pub struct TaskTracker {
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` under `name`, aborting any task already registered
    /// under the same name.
    pub async fn spawn<F>(&self, name: impl Into<String>, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        // Insert under the lock so a concurrent abort(name) can't miss it
        let mut tasks = self.tasks.lock().await;
        if let Some(old) = tasks.remove(&name) {
            warn!("aborting existing task '{}' before spawning new one", name);
            old.abort();
        }
        tasks.insert(name, tokio::spawn(future));
    }

    /// Abort the task registered under `name`. Returns whether one existed.
    pub async fn abort(&self, name: &str) -> bool {
        let handle = self.tasks.lock().await.remove(name);
        match handle {
            Some(handle) => {
                handle.abort();
                debug!("cancelled task '{}'", name);
                true
            }
            None => false,
        }
    }

    /// Whether a task is registered under `name` and has not finished.
    pub async fn is_running(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(name)
            .is_some_and(|h| !h.is_finished())
    }

    pub async fn cancel_all(&self) {
        let tasks: HashMap<String, JoinHandle<()>> = {
            let mut guard = self.tasks.lock().await;
            guard.drain().collect()
        };
        let count = tasks.len();
        for (name, handle) in tasks {
            handle.abort();
            debug!("cancelled task '{}'", name);
        }
        if count > 0 {
            info!("cancelled {} tracked tasks", count);
        }
    }
}

#[cfg(test)]
mod tests;
