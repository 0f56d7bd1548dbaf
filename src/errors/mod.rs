use crate::guard::BlockReason;
use thiserror::Error;

/// How a failed model call should be treated by the usage guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The key was rejected or has expired. Waiting does not help.
    InvalidCredential,
    /// Provider-side quota or rate limit.
    RateLimited,
    /// Anything else: network hiccups, 5xx responses, malformed output.
    Transient,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredential => write!(f, "invalid credential"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// Typed error hierarchy for concierge.
///
/// Use at module boundaries (model calls, storage, config validation).
/// Internal helpers can keep using `anyhow::Result`; the `Internal` variant
/// lets `?` convert them.
#[derive(Debug, Error)]
pub enum ConciergeError {
    #[error("{0}")]
    Blocked(BlockReason),

    #[error("Credential rejected: {0}")]
    Credential(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ConciergeError {
    /// Wrap a failed model call so the caller can tell the classes apart.
    pub fn from_call_failure(kind: FailureKind, message: String) -> Self {
        match kind {
            FailureKind::InvalidCredential => Self::Credential(message),
            FailureKind::RateLimited => Self::RateLimited(message),
            FailureKind::Transient => Self::Provider(message),
        }
    }

    /// Whether waiting and retrying later can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Blocked(reason) => reason.is_retryable(),
            Self::RateLimited(_) | Self::Provider(_) | Self::Storage(_) | Self::Internal(_) => {
                true
            }
            Self::Credential(_) | Self::Config(_) => false,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Credential(_) => Some(FailureKind::InvalidCredential),
            Self::RateLimited(_) => Some(FailureKind::RateLimited),
            Self::Provider(_) => Some(FailureKind::Transient),
            _ => None,
        }
    }
}

pub type ConciergeResult<T> = std::result::Result<T, ConciergeError>;
