use super::digest::PerceptionDigest;
use crate::clock::Clock;
use crate::config::PerceptionConfig;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// What the sampler should do with the current frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionDecision {
    /// Run the vision model on this frame.
    Analyze,
    /// Keep the previous summary (which may not exist yet).
    Reuse(Option<String>),
}

#[derive(Debug, Default)]
struct ThrottleState {
    last_digest: Option<PerceptionDigest>,
    last_vision_at_millis: Option<i64>,
    last_vision_summary: Option<String>,
}

/// Decides whether a frame warrants a fresh vision call.
///
/// A forced refresh is honored unless the previous call was less than
/// `forceMinIntervalSecs` ago. An unforced frame is analyzed only when its
/// digest differs from the last frame seen and `minVisionIntervalSecs` have
/// passed since the last call.
pub struct PerceptionThrottle {
    state: Mutex<ThrottleState>,
    min_interval_millis: i64,
    force_min_interval_millis: i64,
    clock: Arc<dyn Clock>,
}

impl PerceptionThrottle {
    pub fn new(config: &PerceptionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(ThrottleState::default()),
            min_interval_millis: secs_to_millis(config.min_vision_interval_secs),
            force_min_interval_millis: secs_to_millis(config.force_min_interval_secs),
            clock,
        }
    }

    /// Record `digest` as the latest frame and decide whether to analyze it.
    ///
    /// An `Analyze` decision stamps the call time immediately, so a failing
    /// vision call still counts against the interval.
    pub fn decide(&self, digest: PerceptionDigest, force: bool) -> VisionDecision {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let since_last = state.last_vision_at_millis.map(|at| now - at);
        let allowed = if force {
            since_last.is_none_or(|elapsed| elapsed >= self.force_min_interval_millis)
        } else {
            state.last_digest != Some(digest)
                && since_last.is_none_or(|elapsed| elapsed >= self.min_interval_millis)
        };
        state.last_digest = Some(digest);

        if allowed {
            state.last_vision_at_millis = Some(now);
            debug!("vision call accepted (force={})", force);
            VisionDecision::Analyze
        } else {
            VisionDecision::Reuse(state.last_vision_summary.clone())
        }
    }

    /// Store the result of a successful vision call.
    pub fn record_summary(&self, summary: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.last_vision_summary = Some(summary.into());
    }

    pub fn last_summary(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_vision_summary
            .clone()
    }

    pub fn last_vision_at_millis(&self) -> Option<i64> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_vision_at_millis
    }
}

fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}
