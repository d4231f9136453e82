/// PER-ACTION VERIFICATION STATE
///
///   Available ──start──▶ Pending ──confirmed──▶ Completed
///                           │
///                           ├──attempts exhausted──▶ Failed(TimedOut)
///                           └──list closed────────▶ Failed(ListClosed)
///
/// Completed and Failed are terminal.

use castboard_core::{ActionId, ListId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Available,
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    TimedOut,
    /// The list was cancelled or ran past its end date while the action was pending
    ListClosed,
}

/// Result of a negative or failed check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissOutcome {
    Retry,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStatus {
    pub list_id: ListId,
    pub action_id: ActionId,
    pub points: u64,
    pub state: ActionState,
    /// Checks that came back negative or errored
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure: Option<FailureReason>,
}

impl ActionStatus {
    pub fn available(list_id: ListId, action_id: ActionId, points: u64) -> Self {
        Self {
            list_id,
            action_id,
            points,
            state: ActionState::Available,
            attempts: 0,
            started_at: None,
            completed_at: None,
            failure: None,
        }
    }

    /// Status for an action the participant already completed earlier
    pub fn completed(list_id: ListId, action_id: ActionId, points: u64) -> Self {
        Self {
            state: ActionState::Completed,
            ..Self::available(list_id, action_id, points)
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ActionState::Completed | ActionState::Failed)
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.require_state(ActionState::Available, "start")?;
        self.state = ActionState::Pending;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.require_state(ActionState::Pending, "complete")?;
        self.state = ActionState::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Counts one missed check; the action fails once `max_attempts` is reached.
    pub fn record_miss(&mut self, max_attempts: u32) -> Result<MissOutcome, TransitionError> {
        self.require_state(ActionState::Pending, "record a miss on")?;
        self.attempts += 1;
        if self.attempts >= max_attempts {
            self.state = ActionState::Failed;
            self.failure = Some(FailureReason::TimedOut);
            Ok(MissOutcome::Exhausted)
        } else {
            Ok(MissOutcome::Retry)
        }
    }

    pub fn close(&mut self) -> Result<(), TransitionError> {
        self.require_state(ActionState::Pending, "close")?;
        self.state = ActionState::Failed;
        self.failure = Some(FailureReason::ListClosed);
        Ok(())
    }

    fn require_state(&self, state: ActionState, operation: &'static str) -> Result<(), TransitionError> {
        if self.state == state {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.state,
                operation,
            })
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Cannot {operation} an action in state {from:?}")]
pub struct TransitionError {
    pub from: ActionState,
    pub operation: &'static str,
}
