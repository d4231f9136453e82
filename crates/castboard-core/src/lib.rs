//! CASTBOARD CORE: LIST, SCORE & LEADERBOARD BOOKKEEPING
//!
//! This crate owns all reward-list state:
//! - Reward lists with their actions, positional rewards and participants
//! - Participant scores with exactly-once point awards
//! - Deterministic ranking and reward eligibility
//! - Per-list and global leaderboards
//! - Reward claims once a list has ended
//! - Platform policy and admin roles
//!
//! Storage is reached only through the repository traits, so every service
//! here can run against the in-memory repositories or a durable backend.

pub mod types;
pub mod clock;
pub mod error;
pub mod repository;
pub mod scoring;
pub mod store;
pub mod leaderboard;
pub mod claims;
pub mod platform;
pub mod admin;

pub use types::{
    ActionConfig, ActionId, ActionKind, Fid, GlobalStanding, ListId, ListStatus, NewAction,
    NewList, ParticipantScore, PaymentReceipt, RewardConfig, RewardKind, RewardList,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AccessError, ValidationError};
pub use repository::{InMemoryListRepository, InMemoryScoreRepository, ListRepository, ScoreRepository};
pub use scoring::{rank_scores, ScoringEngine};
pub use store::{ListOrder, RewardListStore};
pub use leaderboard::{Leaderboard, ListAnalytics};
pub use claims::{ClaimError, ClaimReceipt, EarnedReward, RewardLedger, RewardStatus};
pub use platform::{ActivationQuote, PlatformConfig, PlatformConfigUpdate};
pub use admin::{AdminRegistry, PlatformMetrics};
