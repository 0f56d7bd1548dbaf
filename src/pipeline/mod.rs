//! Guarded, cached model calls.
//!
//! Every outbound call goes through the same ordered steps: usage guard
//! check, cache lookup, the call itself, outcome recording, then the cache
//! write on success. Cache hits never touch the usage counters.

use crate::errors::ConciergeError;
use crate::guard::{ResponseCache, UsageGuard};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// One model request as seen by the cache and the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub prompt: String,
    /// Whether an image or other binary context accompanies the prompt.
    pub has_attachment: bool,
}

impl CallRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            has_attachment: false,
        }
    }

    pub fn with_attachment(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            has_attachment: true,
        }
    }

    /// Cache key for this request.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prompt.as_bytes());
        hasher.update([0u8, u8::from(self.has_attachment)]);
        hex::encode(hasher.finalize())
    }
}

/// Performs the actual model call.
#[async_trait]
pub trait LlmExecutor: Send + Sync {
    async fn execute(&self, request: &CallRequest) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub calls: u64,
    #[serde(rename = "cacheHits")]
    pub cache_hits: u64,
    pub blocked: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    cache_hits: AtomicU64,
    blocked: AtomicU64,
    failures: AtomicU64,
}

pub struct AgentCallPipeline {
    guard: Arc<UsageGuard>,
    cache: Arc<ResponseCache>,
    executor: Arc<dyn LlmExecutor>,
    counters: Counters,
}

impl AgentCallPipeline {
    pub fn new(
        guard: Arc<UsageGuard>,
        cache: Arc<ResponseCache>,
        executor: Arc<dyn LlmExecutor>,
    ) -> Self {
        Self {
            guard,
            cache,
            executor,
            counters: Counters::default(),
        }
    }

    pub fn guard(&self) -> &Arc<UsageGuard> {
        &self.guard
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub async fn call(&self, request: &CallRequest) -> Result<String, ConciergeError> {
        let key = request.fingerprint();

        if let Some(reason) = self.guard.request_block_reason() {
            self.counters.blocked.fetch_add(1, Ordering::Relaxed);
            debug!("call blocked: {}", reason);
            return Err(ConciergeError::Blocked(reason));
        }

        if let Some(cached) = self.cache.get(&key) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!("serving cached response for {}", &key[..12]);
            return Ok(cached);
        }

        self.counters.calls.fetch_add(1, Ordering::Relaxed);
        match self.executor.execute(request).await {
            Ok(response) => {
                self.guard.record_success();
                self.cache.put(key, response.clone());
                Ok(response)
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                let message = format!("{:#}", e);
                let kind = self.guard.record_failure(&message);
                warn!("model call failed ({}): {}", kind, message);
                Err(ConciergeError::from_call_failure(kind, message))
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            calls: self.counters.calls.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            blocked: self.counters.blocked.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}
