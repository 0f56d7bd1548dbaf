use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// When a task is due. Only time-qualified due times produce alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum DueTime {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl DueTime {
    /// The local wall-clock instant to fire at, or `None` for a bare date.
    pub fn fire_at(&self) -> Option<NaiveDateTime> {
        match self {
            DueTime::Date(_) => None,
            DueTime::DateTime(at) => Some(*at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub due: Option<DueTime>,
}

impl TrackedEntity {
    pub fn new(id: impl Into<String>, title: impl Into<String>, due: Option<DueTime>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            due,
        }
    }

    pub fn due_at(id: impl Into<String>, title: impl Into<String>, at: NaiveDateTime) -> Self {
        Self::new(id, title, Some(DueTime::DateTime(at)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderAlert {
    pub id: Uuid,
    #[serde(rename = "entityId")]
    pub entity_id: String,
    pub title: String,
    pub due: NaiveDateTime,
    #[serde(rename = "firedAt")]
    pub fired_at: DateTime<Local>,
}
