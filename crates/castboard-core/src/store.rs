/// REWARD LIST STORE
///
/// Canonical owner of reward lists: creation, status transitions, participant
/// joins and list queries. Status commands on unknown ids are silent no-ops;
/// check existence with `list_by_id` first when the distinction matters.

use crate::clock::Clock;
use crate::error::ValidationError;
use crate::repository::ListRepository;
use crate::scoring::ScoringEngine;
use crate::types::{
    ActionConfig, ActionId, Fid, ListId, ListStatus, NewList, RewardConfig, RewardKind, RewardList,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Ordering of the public list feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    /// Oldest first
    #[default]
    All,
    /// Most participants first
    Trending,
    /// Latest start first
    #[serde(rename = "new")]
    Newest,
    /// Soonest end first
    #[serde(rename = "ending")]
    EndingSoon,
}

pub struct RewardListStore {
    lists: Arc<dyn ListRepository>,
    scoring: Arc<ScoringEngine>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl RewardListStore {
    pub fn new(lists: Arc<dyn ListRepository>, scoring: Arc<ScoringEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            lists,
            scoring,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Validates and activates a paid list starting now.
    pub fn create_list(&self, spec: NewList) -> Result<RewardList, ValidationError> {
        validate_new_list(&spec)?;
        let payment = spec.payment.ok_or(ValidationError::MissingPayment)?;

        let id = ListId::new(Uuid::new_v4().simple().to_string());
        let actions = spec
            .actions
            .into_iter()
            .map(|a| ActionConfig {
                id: ActionId::new(Uuid::new_v4().simple().to_string()),
                kind: a.kind,
                description: a.description.trim().to_string(),
                points: a.points,
                target: a.target.filter(|t| !t.trim().is_empty()),
            })
            .collect();
        let rewards: BTreeMap<u32, RewardConfig> =
            spec.rewards.into_iter().map(|r| (r.position, r)).collect();

        let start_date = self.clock.now();
        let end_date = RewardList::end_for(start_date, spec.duration_days)
            .ok_or(ValidationError::InvalidDuration(spec.duration_days))?;
        let list = RewardList {
            id,
            name: spec.name.trim().to_string(),
            description: spec.description.trim().to_string(),
            creator: spec.creator,
            creator_wallet: spec.creator_wallet,
            duration_days: spec.duration_days,
            start_date,
            end_date,
            actions,
            rewards,
            status: ListStatus::Active,
            is_paid: true,
            activation_tx: Some(payment.transaction_hash),
            cancellation_reason: None,
            participants: BTreeSet::new(),
        };

        self.lists.put(list.clone());
        info!(
            list_id = %list.id,
            creator = %list.creator,
            duration_days = list.duration_days,
            actions = list.actions.len(),
            rewards = list.rewards.len(),
            "Reward list created"
        );
        Ok(list)
    }

    /// Lists currently open for participation (`active ∧ paid ∧ end > now`)
    pub fn active_lists(&self) -> Vec<RewardList> {
        let now = self.clock.now();
        self.all_lists().into_iter().filter(|l| l.is_open(now)).collect()
    }

    /// Open lists whose name or description contains `query` (case-insensitive).
    /// An empty query matches every open list. Ties keep the oldest-first order.
    pub fn search_active(&self, query: &str, order: ListOrder) -> Vec<RewardList> {
        let needle = query.trim().to_lowercase();
        let mut lists: Vec<RewardList> = self
            .active_lists()
            .into_iter()
            .filter(|l| {
                needle.is_empty()
                    || l.name.to_lowercase().contains(&needle)
                    || l.description.to_lowercase().contains(&needle)
            })
            .collect();
        match order {
            ListOrder::All => {}
            ListOrder::Trending => lists.sort_by_key(|l| Reverse(l.total_participants())),
            ListOrder::Newest => lists.sort_by_key(|l| Reverse(l.start_date)),
            ListOrder::EndingSoon => lists.sort_by_key(|l| l.end_date),
        }
        lists
    }

    pub fn list_by_id(&self, id: &ListId) -> Option<RewardList> {
        self.lists.get(id)
    }

    pub fn lists_by_creator(&self, creator: &Fid) -> Vec<RewardList> {
        self.all_lists().into_iter().filter(|l| &l.creator == creator).collect()
    }

    /// Every list regardless of status, oldest first
    pub fn all_lists(&self) -> Vec<RewardList> {
        let mut lists = self.lists.list();
        lists.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        lists
    }

    /// Toggles between active and paused. Cancelled lists and unknown ids are
    /// left untouched. Returns whether the status changed.
    pub fn update_status(&self, id: &ListId, status: ListStatus) -> bool {
        if status == ListStatus::Cancelled {
            warn!(list_id = %id, "update_status cannot cancel, use cancel_list");
            return false;
        }
        let _guard = self.write_lock.lock();
        let Some(mut list) = self.lists.get(id) else {
            return false;
        };
        if list.is_cancelled() || list.status == status {
            return false;
        }
        list.status = status;
        self.lists.put(list);
        info!(list_id = %id, status = ?status, "List status updated");
        true
    }

    /// Terminal cancellation. Idempotent; the first reason is kept.
    pub fn cancel_list(&self, id: &ListId, reason: &str) -> bool {
        let _guard = self.write_lock.lock();
        let Some(mut list) = self.lists.get(id) else {
            return false;
        };
        if list.is_cancelled() {
            return true;
        }
        list.status = ListStatus::Cancelled;
        list.cancellation_reason = Some(reason.to_string());
        self.lists.put(list);
        info!(list_id = %id, reason, "List cancelled");
        true
    }

    /// Adds the participant to an open list and initializes their score.
    /// Joining twice is a no-op that still returns true.
    pub fn join_list(&self, id: &ListId, fid: &Fid, display_name: &str) -> bool {
        let _guard = self.write_lock.lock();
        let Some(mut list) = self.lists.get(id) else {
            return false;
        };
        if !list.is_open(self.clock.now()) {
            return false;
        }

        if list.participants.insert(fid.clone()) {
            self.lists.put(list);
            info!(list_id = %id, fid = %fid, "Participant joined list");
        }
        self.scoring.init_score(id, fid, display_name).is_some()
    }

    /// Lists the participant has joined, in any status
    pub fn lists_joined_by(&self, fid: &Fid) -> Vec<RewardList> {
        self.all_lists()
            .into_iter()
            .filter(|l| l.participants.contains(fid))
            .collect()
    }
}

fn validate_new_list(spec: &NewList) -> Result<(), ValidationError> {
    if spec.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if spec.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    if spec.duration_days < 1 {
        return Err(ValidationError::InvalidDuration(spec.duration_days));
    }
    if spec.actions.is_empty() {
        return Err(ValidationError::NoActions);
    }
    for action in &spec.actions {
        if action.points == 0 {
            return Err(ValidationError::NonPositivePoints(action.description.clone()));
        }
        let has_target = action.target.as_deref().map_or(false, |t| !t.trim().is_empty());
        if action.kind.requires_target() && !has_target {
            return Err(ValidationError::MissingTarget {
                kind: action.kind,
                description: action.description.clone(),
            });
        }
    }

    let mut positions = BTreeSet::new();
    for reward in &spec.rewards {
        if reward.position == 0 {
            return Err(ValidationError::InvalidRewardPosition);
        }
        if !positions.insert(reward.position) {
            return Err(ValidationError::DuplicateRewardPosition(reward.position));
        }
        if let RewardKind::Token { amount: 0, .. } = reward.kind {
            return Err(ValidationError::ZeroRewardAmount);
        }
    }

    match &spec.payment {
        Some(p) if !p.transaction_hash.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::MissingPayment),
    }
}
