// Shared test helpers, not all items used by every test binary.
#![allow(unused)]

use anyhow::Result;
use async_trait::async_trait;
use concierge::clock::{Clock, ManualClock};
use concierge::config::{CacheConfig, GuardConfig};
use concierge::guard::{ResponseCache, UsageGuard};
use concierge::pipeline::{AgentCallPipeline, CallRequest, LlmExecutor};
use concierge::reminders::{Notifier, ReminderAlert};
use concierge::storage::KeyValueStore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Executor that replays queued outcomes, then echoes the prompt.
pub struct MockExecutor {
    outcomes: Mutex<VecDeque<Result<String, String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_ok(&self, text: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
    }

    pub fn push_err(&self, message: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmExecutor for MockExecutor {
    async fn execute(&self, request: &CallRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(format!("echo: {}", request.prompt)),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<ReminderAlert>>,
}

impl RecordingNotifier {
    pub fn entity_ids(&self) -> Vec<String> {
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
        Ok(())
    }
}

pub struct PipelineHarness {
    pub clock: Arc<ManualClock>,
    pub executor: Arc<MockExecutor>,
    pub pipeline: AgentCallPipeline,
}

pub fn pipeline_with(
    guard_config: GuardConfig,
    store: Option<Arc<dyn KeyValueStore>>,
) -> PipelineHarness {
    let clock = Arc::new(ManualClock::starting_now());
    let shared: Arc<dyn Clock> = clock.clone();
    let guard = match store {
        Some(store) => UsageGuard::with_store(guard_config, shared.clone(), store),
        None => UsageGuard::new(guard_config, shared.clone()),
    };
    let cache = ResponseCache::new(&CacheConfig::default(), shared);
    let executor = Arc::new(MockExecutor::new());
    let pipeline = AgentCallPipeline::new(Arc::new(guard), Arc::new(cache), executor.clone());
    PipelineHarness {
        clock,
        executor,
        pipeline,
    }
}
