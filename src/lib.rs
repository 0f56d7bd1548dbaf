#![warn(clippy::pedantic)]
// Noisy doc/signature lints; would require annotating every pub function
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Millisecond timestamps and counters move between i64/u64 freely
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod errors;
pub mod guard;
pub mod perception;
pub mod pipeline;
pub mod plan;
pub mod reminders;
pub mod storage;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ConciergeError, FailureKind};
pub use guard::{BlockReason, ResponseCache, UsageGuard, UsageStatus};
pub use perception::{FrameSampler, PerceptionThrottle};
pub use pipeline::{AgentCallPipeline, CallRequest, LlmExecutor};
pub use plan::{PendingPlan, PendingPlanStore, PlanStatus};
pub use reminders::{ReminderAlert, ReminderScheduler, TrackedEntity};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
