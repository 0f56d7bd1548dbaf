pub mod scheduler;
pub mod types;

pub use scheduler::{EntitySource, Notifier, ReminderScheduler};
pub use types::{DueTime, ReminderAlert, TrackedEntity};
