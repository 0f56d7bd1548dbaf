//! Single-slot store for a clarification the agent is waiting on.
//!
//! When the agent needs the user to answer a question before it can carry on
//! with a multi-step goal, the question and the half-built action are saved
//! here. The slot is backed by a [`KeyValueStore`], so a restart resumes the
//! exchange instead of re-deriving intent.

use crate::clock::Clock;
use crate::errors::ConciergeError;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed id of the one pending plan slot.
pub const PENDING_PLAN_ID: &str = "pending";

const PENDING_PLAN_KEY: &str = "pending_plan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// The agent asked a question and needs an answer to continue.
    AwaitingClarification,
    /// The agent has a concrete action and needs a yes/no before running it.
    AwaitingConfirmation,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingClarification => write!(f, "awaiting_clarification"),
            Self::AwaitingConfirmation => write!(f, "awaiting_confirmation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlan {
    pub id: String,
    pub status: PlanStatus,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, rename = "actionPayload", skip_serializing_if = "Option::is_none")]
    pub action_payload: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Local>,
}

pub struct PendingPlanStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl PendingPlanStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The plan currently waiting on the user, if any.
    ///
    /// A row that can no longer be parsed is treated as absent (and logged)
    /// so a format change never wedges the agent in a waiting state.
    pub fn get_pending(&self) -> Result<Option<PendingPlan>, ConciergeError> {
        let raw = self
            .store
            .get(PENDING_PLAN_KEY)
            .map_err(|e| ConciergeError::Storage(format!("{:#}", e)))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<PendingPlan>(&raw) {
            Ok(plan) => Ok(Some(plan)),
            Err(e) => {
                warn!("discarding unreadable pending plan: {}", e);
                Ok(None)
            }
        }
    }

    /// Overwrite the slot with a new pending plan.
    pub fn save_pending(
        &self,
        status: PlanStatus,
        question: impl Into<String>,
        context: Option<String>,
        action_payload: Option<String>,
    ) -> Result<PendingPlan, ConciergeError> {
        let plan = PendingPlan {
            id: PENDING_PLAN_ID.to_string(),
            status,
            question: question.into(),
            context,
            action_payload,
            updated_at: self.clock.now(),
        };
        let json = serde_json::to_string(&plan)
            .map_err(|e| ConciergeError::Storage(format!("failed to encode plan: {}", e)))?;
        self.store
            .put(PENDING_PLAN_KEY, &json)
            .map_err(|e| ConciergeError::Storage(format!("{:#}", e)))?;
        info!("saved pending plan ({}): {}", plan.status, plan.question);
        Ok(plan)
    }

    /// Empty the slot. Clearing an empty slot is a no-op.
    pub fn clear_pending(&self) -> Result<(), ConciergeError> {
        let removed = self
            .store
            .delete(PENDING_PLAN_KEY)
            .map_err(|e| ConciergeError::Storage(format!("{:#}", e)))?;
        if removed {
            debug!("cleared pending plan");
        }
        Ok(())
    }

    pub fn is_waiting(&self) -> Result<bool, ConciergeError> {
        Ok(self.get_pending()?.is_some())
    }
}
