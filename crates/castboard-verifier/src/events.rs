/// Notifications published by a verification session.

use castboard_core::{ActionId, Fid, ListId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VerificationEvent {
    Started {
        fid: Fid,
        list_id: ListId,
        action_id: ActionId,
    },
    /// `awarded` is false when the action had already been credited elsewhere
    Completed {
        fid: Fid,
        list_id: ListId,
        action_id: ActionId,
        points: u64,
        awarded: bool,
    },
    TimedOut {
        fid: Fid,
        list_id: ListId,
        action_id: ActionId,
        attempts: u32,
    },
    ListClosed {
        fid: Fid,
        list_id: ListId,
        action_id: ActionId,
    },
}

impl VerificationEvent {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Started { .. } => Severity::Info,
            Self::Completed { .. } => Severity::Success,
            Self::TimedOut { .. } | Self::ListClosed { .. } => Severity::Error,
        }
    }

    /// User-facing notification text
    pub fn message(&self) -> String {
        match self {
            Self::Started { .. } => "Action started! Checking for completion...".to_string(),
            Self::Completed { points, .. } => format!("Action completed! +{points} points"),
            Self::TimedOut { .. } => "Action verification timed out".to_string(),
            Self::ListClosed { .. } => "List closed before the action was verified".to_string(),
        }
    }

    pub fn list_id(&self) -> &ListId {
        match self {
            Self::Started { list_id, .. }
            | Self::Completed { list_id, .. }
            | Self::TimedOut { list_id, .. }
            | Self::ListClosed { list_id, .. } => list_id,
        }
    }

    pub fn action_id(&self) -> &ActionId {
        match self {
            Self::Started { action_id, .. }
            | Self::Completed { action_id, .. }
            | Self::TimedOut { action_id, .. }
            | Self::ListClosed { action_id, .. } => action_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let completed = VerificationEvent::Completed {
            fid: Fid::from("1"),
            list_id: ListId::from("l"),
            action_id: ActionId::from("a"),
            points: 50,
            awarded: true,
        };
        assert_eq!(completed.message(), "Action completed! +50 points");
        assert_eq!(completed.severity(), Severity::Success);

        let json = serde_json::to_value(&completed).unwrap();
        assert_eq!(json["event"], "completed");
        assert_eq!(json["points"], 50);
    }
}
