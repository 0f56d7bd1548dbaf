use super::digest::{DigestLimits, Frame, compute_digest};
use super::throttle::{PerceptionThrottle, VisionDecision};
use crate::utils::task_tracker::TaskTracker;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

const SAMPLER_TASK: &str = "frame_sampler";

/// Captures the current screen as text spans.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// `Ok(None)` means there is nothing to sample right now (screen locked,
    /// capture permission missing).
    async fn capture(&self) -> Result<Option<Frame>>;
}

/// Runs the vision model over a frame.
#[async_trait]
pub trait VisionSummarizer: Send + Sync {
    async fn summarize(&self, frame: &Frame) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    NoFrame,
    Analyzed(String),
    Reused(Option<String>),
    /// The vision call was attempted and failed; the previous summary stands.
    VisionFailed(Option<String>),
}

/// Periodically captures frames and refreshes the screen summary through
/// a [`PerceptionThrottle`].
#[derive(Clone)]
pub struct FrameSampler {
    source: Arc<dyn FrameSource>,
    summarizer: Arc<dyn VisionSummarizer>,
    throttle: Arc<PerceptionThrottle>,
    limits: DigestLimits,
    interval: Duration,
    force_next: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task_tracker: TaskTracker,
}

impl FrameSampler {
    pub fn new(
        source: Arc<dyn FrameSource>,
        summarizer: Arc<dyn VisionSummarizer>,
        throttle: Arc<PerceptionThrottle>,
        limits: DigestLimits,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            summarizer,
            throttle,
            limits,
            interval,
            force_next: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Ask for the next sample to bypass the digest check, e.g. when the
    /// user explicitly asks what is on screen.
    pub fn request_refresh(&self) {
        self.force_next.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn latest_summary(&self) -> Option<String> {
        self.throttle.last_summary()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Capture one frame and run the vision model if the throttle allows.
    pub async fn sample_once(&self) -> Result<SampleOutcome> {
        let Some(frame) = self.source.capture().await? else {
            return Ok(SampleOutcome::NoFrame);
        };

        let force = self.force_next.swap(false, Ordering::SeqCst);
        let digest = compute_digest(&frame, &self.limits);
        match self.throttle.decide(digest, force) {
            VisionDecision::Reuse(summary) => Ok(SampleOutcome::Reused(summary)),
            VisionDecision::Analyze => match self.summarizer.summarize(&frame).await {
                Ok(summary) => {
                    debug!("screen summary refreshed (digest {})", digest);
                    self.throttle.record_summary(summary.clone());
                    Ok(SampleOutcome::Analyzed(summary))
                }
                Err(e) => {
                    warn!("vision call failed: {}", e);
                    Ok(SampleOutcome::VisionFailed(self.throttle.last_summary()))
                }
            },
        }
    }

    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("frame sampler already running");
            return;
        }

        let sampler = self.clone();
        self.task_tracker
            .spawn(SAMPLER_TASK, async move {
                while sampler.running.load(Ordering::SeqCst) {
                    if let Err(e) = sampler.sample_once().await {
                        warn!("frame capture failed: {}", e);
                    }
                    tokio::select! {
                        () = tokio::time::sleep(sampler.interval) => {}
                        () = sampler.wake.notified() => {}
                    }
                }
                debug!("frame sampler loop exited");
            })
            .await;

        info!("frame sampler started (every {:?})", self.interval);
    }

    /// Stop sampling. A sample already in flight is allowed to finish.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.wake.notify_one();
            info!("frame sampler stopped");
        }
    }
}
