/// REWARD CLAIMS LEDGER
///
/// Positional rewards lock in when a list ends: until then they follow the live
/// ranking and are reported as provisional. After the end the scores are frozen
/// and the holder of each position can record exactly one claim for its reward.
/// Settlement of the claim (token transfer, NFT mint) happens elsewhere.

use crate::clock::Clock;
use crate::scoring::ScoringEngine;
use crate::store::RewardListStore;
use crate::types::{Fid, ListId, RewardConfig};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    /// List still running, position may change
    Provisional,
    Claimable,
    Claimed,
}

/// A reward a participant currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnedReward {
    pub list_id: ListId,
    pub list_name: String,
    pub position: u32,
    pub reward: RewardConfig,
    pub status: RewardStatus,
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub claim_id: String,
    pub list_id: ListId,
    pub fid: Fid,
    pub position: u32,
    pub reward: RewardConfig,
    /// Wallet that funds the payout
    pub creator_wallet: String,
    pub claimed_at: DateTime<Utc>,
}

type ClaimKey = (ListId, Fid, u32);

pub struct RewardLedger {
    store: Arc<RewardListStore>,
    scoring: Arc<ScoringEngine>,
    clock: Arc<dyn Clock>,
    claims: DashMap<ClaimKey, ClaimReceipt>,
}

impl RewardLedger {
    pub fn new(store: Arc<RewardListStore>, scoring: Arc<ScoringEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            scoring,
            clock,
            claims: DashMap::new(),
        }
    }

    /// Rewards held by `fid` across every non-cancelled list
    pub fn rewards_for(&self, fid: &Fid) -> Vec<EarnedReward> {
        let now = self.clock.now();
        let mut earned = Vec::new();

        for list in self.store.lists_joined_by(fid) {
            if list.is_cancelled() {
                continue;
            }
            let Some(score) = self.scoring.score(&list.id, fid) else {
                continue;
            };
            for reward in score.eligible_rewards {
                let key = (list.id.clone(), fid.clone(), reward.position);
                let claimed_at = self.claims.get(&key).map(|c| c.claimed_at);
                let status = match claimed_at {
                    Some(_) => RewardStatus::Claimed,
                    None if list.has_ended(now) => RewardStatus::Claimable,
                    None => RewardStatus::Provisional,
                };
                earned.push(EarnedReward {
                    list_id: list.id.clone(),
                    list_name: list.name.clone(),
                    position: score.position,
                    reward,
                    status,
                    claimed_at,
                });
            }
        }
        earned
    }

    /// Records the claim for the reward at `position` of an ended list.
    pub fn claim(&self, list_id: &ListId, fid: &Fid, position: u32) -> Result<ClaimReceipt, ClaimError> {
        let list = self
            .store
            .list_by_id(list_id)
            .ok_or_else(|| ClaimError::ListNotFound(list_id.clone()))?;
        if list.is_cancelled() {
            return Err(ClaimError::ListCancelled(list_id.clone()));
        }
        let now = self.clock.now();
        if !list.has_ended(now) {
            return Err(ClaimError::ListStillRunning { ends_at: list.end_date });
        }

        let score = self
            .scoring
            .score(list_id, fid)
            .ok_or(ClaimError::NotEligible { position })?;
        let reward = score
            .eligible_rewards
            .iter()
            .find(|r| r.position == position && score.position == position)
            .cloned()
            .ok_or(ClaimError::NotEligible { position })?;

        match self.claims.entry((list_id.clone(), fid.clone(), position)) {
            Entry::Occupied(_) => Err(ClaimError::AlreadyClaimed { position }),
            Entry::Vacant(slot) => {
                let receipt = ClaimReceipt {
                    claim_id: Uuid::new_v4().to_string(),
                    list_id: list_id.clone(),
                    fid: fid.clone(),
                    position,
                    reward,
                    creator_wallet: list.creator_wallet.clone(),
                    claimed_at: now,
                };
                slot.insert(receipt.clone());
                info!(list_id = %list_id, fid = %fid, position, "Reward claim recorded");
                Ok(receipt)
            }
        }
    }

    pub fn claims(&self) -> Vec<ClaimReceipt> {
        let mut claims: Vec<_> = self.claims.iter().map(|c| c.value().clone()).collect();
        claims.sort_by(|a, b| a.claimed_at.cmp(&b.claimed_at).then_with(|| a.claim_id.cmp(&b.claim_id)));
        claims
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("List {0} not found")]
    ListNotFound(ListId),
    #[error("List {0} was cancelled")]
    ListCancelled(ListId),
    #[error("List is still running until {ends_at}")]
    ListStillRunning { ends_at: DateTime<Utc> },
    #[error("Participant does not hold position {position}")]
    NotEligible { position: u32 },
    #[error("Reward for position {position} already claimed")]
    AlreadyClaimed { position: u32 },
}
