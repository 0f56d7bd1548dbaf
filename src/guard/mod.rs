//! Resource guards that sit in front of every model call.

pub mod cache;
pub mod usage;

pub use cache::ResponseCache;
pub use usage::{BlockReason, UsageGuard, UsageStatus, classify_failure};
