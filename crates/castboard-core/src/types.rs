/// REWARD LIST DATA MODEL
///
/// Reward lists, the social actions they pay for, the positional rewards they
/// hand out, and the per-participant score records derived from them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                $name(id)
            }
        }
    };
}

string_id!(
    /// Reward list identifier
    ListId
);
string_id!(
    /// Action identifier, unique across all lists
    ActionId
);
string_id!(
    /// Farcaster id of a user (participant, creator or admin)
    Fid
);

/// Kind of social action a list pays points for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Cast,
    Recast,
    Follow,
    Like,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cast => "cast",
            Self::Recast => "recast",
            Self::Follow => "follow",
            Self::Like => "like",
        }
    }

    /// Whether the action only makes sense against a target cast or user
    pub fn requires_target(&self) -> bool {
        !matches!(self, Self::Cast)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A social action inside a reward list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub id: ActionId,
    pub kind: ActionKind,
    pub description: String,
    /// Points awarded on verified completion (always > 0)
    pub points: u64,
    /// Cast URL/hash for recast and like, user handle for follow
    pub target: Option<String>,
}

impl ActionConfig {
    /// Content identifier of the target cast (last path segment of a cast URL)
    pub fn target_content(&self) -> Option<&str> {
        match self.kind {
            ActionKind::Cast | ActionKind::Recast | ActionKind::Like => self
                .target
                .as_deref()
                .and_then(|t| t.trim_end_matches('/').rsplit('/').next())
                .filter(|s| !s.is_empty()),
            ActionKind::Follow => None,
        }
    }

    /// Handle of the user to follow
    pub fn target_user(&self) -> Option<&str> {
        match self.kind {
            ActionKind::Follow => self.target.as_deref().map(|t| t.trim_start_matches('@')),
            _ => None,
        }
    }
}

/// Action as submitted by a creator, before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAction {
    pub kind: ActionKind,
    pub description: String,
    pub points: u64,
    pub target: Option<String>,
}

/// What a reward position pays out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RewardKind {
    Token { amount: u64, symbol: String },
    Nft { name: String, url: String },
}

/// Reward for the participant holding a given leaderboard position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Rank tier, 1-based
    pub position: u32,
    #[serde(flatten)]
    pub kind: RewardKind,
}

impl RewardConfig {
    pub fn token(position: u32, amount: u64, symbol: impl Into<String>) -> Self {
        RewardConfig {
            position,
            kind: RewardKind::Token { amount, symbol: symbol.into() },
        }
    }

    pub fn nft(position: u32, name: impl Into<String>, url: impl Into<String>) -> Self {
        RewardConfig {
            position,
            kind: RewardKind::Nft { name: name.into(), url: url.into() },
        }
    }

    pub fn is_nft(&self) -> bool {
        matches!(self.kind, RewardKind::Nft { .. })
    }
}

/// Administrative state of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStatus {
    Active,
    Paused,
    /// Terminal
    Cancelled,
}

/// Proof that the creator paid the activation fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub transaction_hash: String,
    /// Amount paid in whole USDC
    pub amount: u64,
}

/// Creator-submitted list definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewList {
    pub name: String,
    pub description: String,
    pub duration_days: u32,
    pub actions: Vec<NewAction>,
    pub rewards: Vec<RewardConfig>,
    pub creator: Fid,
    pub creator_wallet: String,
    pub payment: Option<PaymentReceipt>,
}

/// A creator-defined reward campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardList {
    pub id: ListId,
    pub name: String,
    pub description: String,
    pub creator: Fid,
    /// Creator payout address
    pub creator_wallet: String,
    pub duration_days: u32,
    pub start_date: DateTime<Utc>,
    /// Always `start_date + duration_days`
    pub end_date: DateTime<Utc>,
    /// Display order
    pub actions: Vec<ActionConfig>,
    /// Keyed by unique position
    pub rewards: BTreeMap<u32, RewardConfig>,
    pub status: ListStatus,
    pub is_paid: bool,
    pub activation_tx: Option<String>,
    pub cancellation_reason: Option<String>,
    pub participants: BTreeSet<Fid>,
}

impl RewardList {
    /// `None` when the end falls outside the representable date range
    pub fn end_for(start: DateTime<Utc>, duration_days: u32) -> Option<DateTime<Utc>> {
        start.checked_add_signed(Duration::days(i64::from(duration_days)))
    }

    pub fn is_active(&self) -> bool {
        self.status == ListStatus::Active
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ListStatus::Cancelled
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date
    }

    /// `active ∧ paid ∧ now < end`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.is_paid && !self.has_ended(now)
    }

    pub fn action(&self, action_id: &ActionId) -> Option<&ActionConfig> {
        self.actions.iter().find(|a| &a.id == action_id)
    }

    pub fn reward_at(&self, position: u32) -> Option<&RewardConfig> {
        self.rewards.get(&position)
    }

    pub fn total_participants(&self) -> usize {
        self.participants.len()
    }
}

/// Per-participant, per-list score record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantScore {
    pub list_id: ListId,
    pub fid: Fid,
    pub display_name: String,
    pub total_points: u64,
    pub completed_actions: BTreeSet<ActionId>,
    /// Disjoint from `completed_actions`
    pub pending_actions: BTreeSet<ActionId>,
    /// 1-based rank within the list, recomputed on every score change
    pub position: u32,
    /// Rewards configured at `position`
    pub eligible_rewards: Vec<RewardConfig>,
    pub joined_at: DateTime<Utc>,
    /// Join ordinal within the list, used as the ranking tie-break
    pub join_seq: u64,
}

impl ParticipantScore {
    pub fn new(list_id: ListId, fid: Fid, display_name: String, joined_at: DateTime<Utc>, join_seq: u64) -> Self {
        ParticipantScore {
            list_id,
            fid,
            display_name,
            total_points: 0,
            completed_actions: BTreeSet::new(),
            pending_actions: BTreeSet::new(),
            position: 0,
            eligible_rewards: Vec::new(),
            joined_at,
            join_seq,
        }
    }

    pub fn has_completed(&self, action_id: &ActionId) -> bool {
        self.completed_actions.contains(action_id)
    }
}

/// Row of the cross-list leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStanding {
    pub fid: Fid,
    pub display_name: String,
    pub total_points: u64,
    pub lists_participated: u32,
    /// 1-based rank in the global leaderboard
    pub position: u32,
    #[serde(skip)]
    pub(crate) first_joined_at: Option<DateTime<Utc>>,
}
