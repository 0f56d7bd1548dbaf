use crate::clock::Clock;
use crate::config::GuardConfig;
use crate::errors::FailureKind;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const USAGE_KEY_PREFIX: &str = "usage:";

const CREDENTIAL_PATTERNS: &[&str] = &[
    "invalid key",
    "invalid api key",
    "invalid_api_key",
    "api key not valid",
    "api_key_invalid",
    "expired",
];

const QUOTA_PATTERNS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "quota",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
];

/// Classify a provider error message.
///
/// Case-insensitive substring matching; credential problems win over quota
/// problems when both appear. Heuristic by nature: an unfamiliar provider
/// message falls through to [`FailureKind::Transient`].
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if CREDENTIAL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::InvalidCredential;
    }
    if QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) || contains_status_code(&lower, "429") {
        return FailureKind::RateLimited;
    }
    FailureKind::Transient
}

/// Match an HTTP status code only when it is not part of a longer number
/// ("4290 tokens" must not count as a 429).
fn contains_status_code(haystack: &str, code: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(code).any(|(pos, _)| {
        let before_ok = pos == 0 || !bytes[pos - 1].is_ascii_digit();
        let after = pos + code.len();
        let after_ok = after >= bytes.len() || !bytes[after].is_ascii_digit();
        before_ok && after_ok
    })
}

/// Why an outbound call was refused before it was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    DailyLimit { used: u32, limit: u32 },
    Cooldown { remaining_secs: u64, kind: FailureKind },
}

impl BlockReason {
    /// Whether the block lifts on its own. A credential cooldown needs the
    /// user to fix the key.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Cooldown {
                kind: FailureKind::InvalidCredential,
                ..
            }
        )
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyLimit { used, limit } => write!(
                f,
                "Daily limit reached ({}/{} requests). Try again tomorrow.",
                used, limit
            ),
            Self::Cooldown {
                remaining_secs,
                kind: FailureKind::InvalidCredential,
            } => write!(
                f,
                "API key was rejected or has expired. Update your credentials (calls paused for {}s).",
                remaining_secs
            ),
            Self::Cooldown {
                remaining_secs,
                kind: FailureKind::RateLimited,
            } => write!(
                f,
                "Provider rate limit or quota hit. Please wait {}s before retrying.",
                remaining_secs
            ),
            Self::Cooldown {
                remaining_secs,
                kind: FailureKind::Transient,
            } => write!(
                f,
                "Too many consecutive failures. Cooling down for {}s.",
                remaining_secs
            ),
        }
    }
}

/// Snapshot of today's usage for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStatus {
    #[serde(rename = "usedRequests")]
    pub used_requests: u32,
    #[serde(rename = "dailyLimit")]
    pub daily_limit: Option<u32>,
    pub exhausted: bool,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

/// What gets persisted per calendar day.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UsageRecord {
    #[serde(default, rename = "usedRequests")]
    used_requests: u32,
    #[serde(default, rename = "lastError")]
    last_error: Option<String>,
}

struct GuardState {
    used_requests: u32,
    daily_limit: Option<u32>,
    exhausted: bool,
    last_error: Option<String>,
    consecutive_failures: u32,
    blocked_until: Option<DateTime<Local>>,
    cooldown_kind: Option<FailureKind>,
    date: NaiveDate,
}

impl GuardState {
    /// Zero the day's counters if the local date moved. Returns whether a
    /// reset happened.
    fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.date == today {
            return false;
        }
        info!(
            "usage guard daily reset: {} -> {} ({} requests yesterday)",
            self.date, today, self.used_requests
        );
        self.used_requests = 0;
        self.exhausted = false;
        self.last_error = None;
        self.consecutive_failures = 0;
        self.blocked_until = None;
        self.cooldown_kind = None;
        self.date = today;
        true
    }

    /// Extend the cooldown to `until`; never shortens an existing one.
    fn extend_cooldown(&mut self, until: DateTime<Local>, kind: FailureKind) {
        if self.blocked_until.is_none_or(|current| until > current) {
            self.blocked_until = Some(until);
            self.cooldown_kind = Some(kind);
        }
    }

    fn record(&self) -> UsageRecord {
        UsageRecord {
            used_requests: self.used_requests,
            last_error: self.last_error.clone(),
        }
    }
}

/// Tracks request counts, the daily quota and failure cooldowns.
///
/// Every decision first checks for a local-midnight rollover, so a cooldown
/// never survives into a new day.
pub struct UsageGuard {
    state: Mutex<GuardState>,
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl UsageGuard {
    pub fn new(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        let today = clock.now().date_naive();
        Self {
            state: Mutex::new(GuardState {
                used_requests: 0,
                daily_limit: config.daily_limit,
                exhausted: false,
                last_error: None,
                consecutive_failures: 0,
                blocked_until: None,
                cooldown_kind: None,
                date: today,
            }),
            config,
            clock,
            store: None,
        }
    }

    /// Create a guard that persists today's request count and restores it
    /// on startup.
    pub fn with_store(
        config: GuardConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let mut guard = Self::new(config, clock);
        let today = guard.lock().date;
        match store.get(&usage_key(today)) {
            Ok(Some(raw)) => match serde_json::from_str::<UsageRecord>(&raw) {
                Ok(record) => {
                    let mut state = guard.lock();
                    state.used_requests = record.used_requests;
                    state.last_error = record.last_error;
                    info!(
                        "restored usage from store: {} requests today",
                        record.used_requests
                    );
                }
                Err(e) => warn!("ignoring unreadable usage record for {}: {}", today, e),
            },
            Ok(None) => {}
            Err(e) => warn!("failed to restore usage from store: {}", e),
        }
        guard.store = Some(store);
        // Short-lived processes never see a rollover, so clear old days here
        guard.prune_stale_records(today);
        guard
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-flight check before an outbound call. `None` means the call may
    /// proceed.
    pub fn request_block_reason(&self) -> Option<BlockReason> {
        let now = self.clock.now();
        let (reason, rolled) = {
            let mut state = self.lock();
            let rolled = state.roll_over(now.date_naive());
            (Self::evaluate(&mut state, now), rolled)
        };
        if rolled {
            self.prune_stale_records(now.date_naive());
        }
        if let Some(ref reason) = reason {
            debug!("usage guard blocked call: {}", reason);
        }
        reason
    }

    fn evaluate(state: &mut GuardState, now: DateTime<Local>) -> Option<BlockReason> {
        if let Some(limit) = state.daily_limit
            && state.used_requests >= limit
        {
            if !state.exhausted {
                warn!(
                    "daily request limit reached: {}/{}",
                    state.used_requests, limit
                );
            }
            state.exhausted = true;
            return Some(BlockReason::DailyLimit {
                used: state.used_requests,
                limit,
            });
        }

        if let Some(until) = state.blocked_until
            && now < until
        {
            return Some(BlockReason::Cooldown {
                remaining_secs: ceil_secs(until - now),
                kind: state.cooldown_kind.unwrap_or(FailureKind::Transient),
            });
        }

        None
    }

    pub fn record_success(&self) {
        let now = self.clock.now();
        let (date, rolled) = {
            let mut state = self.lock();
            let rolled = state.roll_over(now.date_naive());
            state.used_requests = state.used_requests.saturating_add(1);
            state.consecutive_failures = 0;
            state.blocked_until = None;
            state.cooldown_kind = None;
            state.exhausted = false;
            state.last_error = None;
            // Written under the lock so a slower, older count can't land last
            self.persist(state.date, &state.record());
            (state.date, rolled)
        };
        if rolled {
            self.prune_stale_records(date);
        }
    }

    /// Record a failed call. Returns how the error was classified.
    pub fn record_failure(&self, error: &str) -> FailureKind {
        let kind = classify_failure(error);
        let now = self.clock.now();
        let (date, rolled) = {
            let mut state = self.lock();
            let rolled = state.roll_over(now.date_naive());
            state.used_requests = state.used_requests.saturating_add(1);
            state.last_error = Some(error.to_string());

            match kind {
                FailureKind::InvalidCredential => {
                    let secs = self.config.credential_cooldown_secs;
                    state.extend_cooldown(cooldown_until(now, secs), kind);
                    warn!("credential failure, pausing calls for {}s: {}", secs, error);
                }
                FailureKind::RateLimited => {
                    let secs = self.config.rate_limit_cooldown_secs;
                    state.extend_cooldown(cooldown_until(now, secs), kind);
                    warn!("rate limited, pausing calls for {}s: {}", secs, error);
                }
                FailureKind::Transient => {
                    state.consecutive_failures += 1;
                    let failures = state.consecutive_failures;
                    if failures >= self.config.failure_threshold {
                        let secs = self.config.transient_cooldown_secs;
                        state.extend_cooldown(cooldown_until(now, secs), kind);
                        warn!(
                            "{} consecutive failures, pausing calls for {}s",
                            failures, secs
                        );
                    } else {
                        debug!(
                            "transient failure {}/{}: {}",
                            failures, self.config.failure_threshold, error
                        );
                    }
                }
            }
            self.persist(state.date, &state.record());
            (state.date, rolled)
        };
        if rolled {
            self.prune_stale_records(date);
        }
        kind
    }

    /// Change the daily quota. `None` disables quota blocking.
    pub fn set_daily_limit(&self, limit: Option<u32>) {
        let mut state = self.lock();
        if state.daily_limit != limit {
            info!(
                "usage guard daily limit updated: {:?} -> {:?}",
                state.daily_limit, limit
            );
            state.daily_limit = limit;
            // Re-evaluated on the next check against the new limit
            state.exhausted = false;
        }
    }

    pub fn status(&self) -> UsageStatus {
        let now = self.clock.now();
        let mut state = self.lock();
        state.roll_over(now.date_naive());
        UsageStatus {
            used_requests: state.used_requests,
            daily_limit: state.daily_limit,
            exhausted: state.exhausted,
            last_error: state.last_error.clone(),
        }
    }

    /// Time left on the active cooldown, if any.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.roll_over(now.date_naive());
        state
            .blocked_until
            .filter(|until| now < *until)
            .and_then(|until| (until - now).to_std().ok())
    }

    fn persist(&self, date: NaiveDate, record: &UsageRecord) {
        let Some(ref store) = self.store else {
            return;
        };
        let result = serde_json::to_string(record)
            .map_err(anyhow::Error::from)
            .and_then(|json| store.put(&usage_key(date), &json));
        if let Err(e) = result {
            warn!("failed to persist usage for {}: {}", date, e);
        }
    }

    fn prune_stale_records(&self, today: NaiveDate) {
        let Some(ref store) = self.store else {
            return;
        };
        let current = usage_key(today);
        match store.keys_with_prefix(USAGE_KEY_PREFIX) {
            Ok(keys) => {
                for key in keys.into_iter().filter(|k| *k != current) {
                    if let Err(e) = store.delete(&key) {
                        warn!("failed to prune usage record {}: {}", key, e);
                    }
                }
            }
            Err(e) => warn!("failed to list usage records: {}", e),
        }
    }
}

fn usage_key(date: NaiveDate) -> String {
    format!("{}{}", USAGE_KEY_PREFIX, date.format("%Y-%m-%d"))
}

fn cooldown_until(now: DateTime<Local>, secs: u64) -> DateTime<Local> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or_else(|| now + TimeDelta::days(365))
}

fn ceil_secs(delta: TimeDelta) -> u64 {
    let ms = delta.num_milliseconds().max(0) as u64;
    ms.div_ceil(1000)
}
