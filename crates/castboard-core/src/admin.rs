/// ADMIN ROLES & PLATFORM METRICS
///
/// The super admin is the app creator and is the only role allowed to grant or
/// revoke admin rights. Admins moderate lists and edit platform configuration.

use crate::claims::RewardLedger;
use crate::error::AccessError;
use crate::scoring::ScoringEngine;
use crate::store::RewardListStore;
use crate::types::{Fid, RewardKind};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug)]
pub struct AdminRegistry {
    super_admin: Fid,
    admins: RwLock<BTreeSet<Fid>>,
}

impl AdminRegistry {
    pub fn new(super_admin: Fid) -> Self {
        Self {
            super_admin,
            admins: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn super_admin(&self) -> &Fid {
        &self.super_admin
    }

    pub fn is_super_admin(&self, fid: &Fid) -> bool {
        fid == &self.super_admin
    }

    /// The super admin counts as an admin
    pub fn is_admin(&self, fid: &Fid) -> bool {
        self.is_super_admin(fid) || self.admins.read().contains(fid)
    }

    pub fn ensure_admin(&self, fid: &Fid) -> Result<(), AccessError> {
        if self.is_admin(fid) {
            Ok(())
        } else {
            Err(AccessError::NotAuthorized(fid.clone()))
        }
    }

    fn ensure_super_admin(&self, fid: &Fid) -> Result<(), AccessError> {
        if self.is_super_admin(fid) {
            Ok(())
        } else {
            Err(AccessError::NotSuperAdmin(fid.clone()))
        }
    }

    /// Returns false when `fid` already was an admin
    pub fn add_admin(&self, caller: &Fid, fid: Fid) -> Result<bool, AccessError> {
        self.ensure_super_admin(caller)?;
        if self.is_super_admin(&fid) {
            return Ok(false);
        }
        let added = self.admins.write().insert(fid.clone());
        if added {
            info!(fid = %fid, "Admin role granted");
        }
        Ok(added)
    }

    pub fn remove_admin(&self, caller: &Fid, fid: &Fid) -> Result<bool, AccessError> {
        self.ensure_super_admin(caller)?;
        if self.is_super_admin(fid) {
            return Err(AccessError::CannotRemoveSuperAdmin);
        }
        let removed = self.admins.write().remove(fid);
        if removed {
            info!(fid = %fid, "Admin role revoked");
        }
        Ok(removed)
    }

    /// Granted admins, excluding the super admin
    pub fn admins(&self) -> Vec<Fid> {
        self.admins.read().iter().cloned().collect()
    }
}

/// Super admin dashboard snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMetrics {
    /// Distinct participants across all lists
    pub total_users: usize,
    pub active_lists: usize,
    pub total_lists: usize,
    /// Sum of configured token reward amounts, all symbols
    pub token_rewards_configured: u64,
    pub nft_rewards_configured: usize,
    pub claims_recorded: usize,
    pub total_points_awarded: u64,
    pub collected_at: DateTime<Utc>,
}

impl PlatformMetrics {
    pub fn collect(
        store: &RewardListStore,
        scoring: &ScoringEngine,
        ledger: &RewardLedger,
        now: DateTime<Utc>,
    ) -> Self {
        let lists = store.all_lists();
        let scores = scoring.all_scores();

        let mut token_rewards_configured = 0u64;
        let mut nft_rewards_configured = 0usize;
        for reward in lists.iter().flat_map(|l| l.rewards.values()) {
            match &reward.kind {
                RewardKind::Token { amount, .. } => {
                    token_rewards_configured = token_rewards_configured.saturating_add(*amount)
                }
                RewardKind::Nft { .. } => nft_rewards_configured += 1,
            }
        }

        PlatformMetrics {
            total_users: scores.iter().map(|s| &s.fid).collect::<BTreeSet<_>>().len(),
            active_lists: lists.iter().filter(|l| l.is_open(now)).count(),
            total_lists: lists.len(),
            token_rewards_configured,
            nft_rewards_configured,
            claims_recorded: ledger.claim_count(),
            total_points_awarded: scores.iter().fold(0u64, |acc, s| acc.saturating_add(s.total_points)),
            collected_at: now,
        }
    }
}
