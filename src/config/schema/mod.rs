use crate::errors::ConciergeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Usage guard
// ---------------------------------------------------------------------------

fn default_credential_cooldown_secs() -> u64 {
    600
}

fn default_rate_limit_cooldown_secs() -> u64 {
    120
}

fn default_transient_cooldown_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Requests allowed per local calendar day. `None` disables quota blocking.
    #[serde(default, rename = "dailyLimit")]
    pub daily_limit: Option<u32>,
    #[serde(
        default = "default_credential_cooldown_secs",
        rename = "credentialCooldownSecs"
    )]
    pub credential_cooldown_secs: u64,
    #[serde(
        default = "default_rate_limit_cooldown_secs",
        rename = "rateLimitCooldownSecs"
    )]
    pub rate_limit_cooldown_secs: u64,
    #[serde(
        default = "default_transient_cooldown_secs",
        rename = "transientCooldownSecs"
    )]
    pub transient_cooldown_secs: u64,
    /// Consecutive transient failures before the transient cooldown applies.
    #[serde(default = "default_failure_threshold", rename = "failureThreshold")]
    pub failure_threshold: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            daily_limit: None,
            credential_cooldown_secs: default_credential_cooldown_secs(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            transient_cooldown_secs: default_transient_cooldown_secs(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// Response cache
// ---------------------------------------------------------------------------

fn default_cache_capacity() -> usize {
    50
}

fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs", rename = "ttlSecs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Perception
// ---------------------------------------------------------------------------

fn default_min_vision_interval_secs() -> u64 {
    60
}

fn default_force_min_interval_secs() -> u64 {
    5
}

fn default_max_spans() -> usize {
    40
}

fn default_max_span_chars() -> usize {
    200
}

fn default_sample_interval_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptionConfig {
    #[serde(
        default = "default_min_vision_interval_secs",
        rename = "minVisionIntervalSecs"
    )]
    pub min_vision_interval_secs: u64,
    #[serde(
        default = "default_force_min_interval_secs",
        rename = "forceMinIntervalSecs"
    )]
    pub force_min_interval_secs: u64,
    #[serde(default = "default_max_spans", rename = "maxTextSpans")]
    pub max_text_spans: usize,
    #[serde(default = "default_max_spans", rename = "maxElementSpans")]
    pub max_element_spans: usize,
    #[serde(default = "default_max_span_chars", rename = "maxSpanChars")]
    pub max_span_chars: usize,
    #[serde(default = "default_sample_interval_ms", rename = "sampleIntervalMs")]
    pub sample_interval_ms: u64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            min_vision_interval_secs: default_min_vision_interval_secs(),
            force_min_interval_secs: default_force_min_interval_secs(),
            max_text_spans: default_max_spans(),
            max_element_spans: default_max_spans(),
            max_span_chars: default_max_span_chars(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl PerceptionConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Reminders
// ---------------------------------------------------------------------------

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_missed_grace_secs() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(
        default = "default_refresh_interval_secs",
        rename = "refreshIntervalSecs"
    )]
    pub refresh_interval_secs: u64,
    /// How far in the past a never-delivered due time may be and still fire.
    #[serde(default = "default_missed_grace_secs", rename = "missedGraceSecs")]
    pub missed_grace_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            missed_grace_secs: default_missed_grace_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the state database. Defaults to `<home>/state.db`.
    #[serde(default, rename = "dbPath")]
    pub db_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConciergeError> {
        self.validate_guard()?;
        self.validate_cache()?;
        self.validate_perception()?;
        self.validate_reminders()?;
        Ok(())
    }

    fn validate_guard(&self) -> Result<(), ConciergeError> {
        let g = &self.guard;
        if g.failure_threshold == 0 {
            return Err(ConciergeError::Config(
                "guard.failureThreshold must be > 0".into(),
            ));
        }
        if g.daily_limit == Some(0) {
            return Err(ConciergeError::Config(
                "guard.dailyLimit must be > 0 (omit it to disable the quota)".into(),
            ));
        }
        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConciergeError> {
        if self.cache.capacity == 0 {
            return Err(ConciergeError::Config("cache.capacity must be > 0".into()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConciergeError::Config("cache.ttlSecs must be > 0".into()));
        }
        Ok(())
    }

    fn validate_perception(&self) -> Result<(), ConciergeError> {
        let p = &self.perception;
        if p.sample_interval_ms == 0 {
            return Err(ConciergeError::Config(
                "perception.sampleIntervalMs must be > 0".into(),
            ));
        }
        if p.max_text_spans == 0 && p.max_element_spans == 0 {
            return Err(ConciergeError::Config(
                "perception.maxTextSpans and perception.maxElementSpans cannot both be 0".into(),
            ));
        }
        if p.force_min_interval_secs > p.min_vision_interval_secs {
            return Err(ConciergeError::Config(
                "perception.forceMinIntervalSecs must not exceed perception.minVisionIntervalSecs"
                    .into(),
            ));
        }
        Ok(())
    }

    fn validate_reminders(&self) -> Result<(), ConciergeError> {
        if self.reminders.refresh_interval_secs == 0 {
            return Err(ConciergeError::Config(
                "reminders.refreshIntervalSecs must be > 0".into(),
            ));
        }
        Ok(())
    }
}
