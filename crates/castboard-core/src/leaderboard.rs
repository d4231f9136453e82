/// LEADERBOARD INDEX
///
/// Read-side views over the scoring engine. Everything is recomputed on demand
/// from score snapshots; nothing here mutates state.

use crate::scoring::ScoringEngine;
use crate::store::RewardListStore;
use crate::types::{Fid, GlobalStanding, ListId, ParticipantScore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creator dashboard numbers for one list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAnalytics {
    pub list_id: ListId,
    pub participants: usize,
    pub completed_actions: usize,
    pub pending_actions: usize,
    pub total_points_awarded: u64,
    pub reward_tiers: usize,
    /// Share of (participant × action) slots completed, 0-100
    pub completion_rate: u8,
}

pub struct Leaderboard {
    store: Arc<RewardListStore>,
    scoring: Arc<ScoringEngine>,
}

impl Leaderboard {
    pub fn new(store: Arc<RewardListStore>, scoring: Arc<ScoringEngine>) -> Self {
        Self { store, scoring }
    }

    /// Top `limit` participants of a list, position 1 first. Empty for unknown lists.
    pub fn list_leaderboard(&self, list_id: &ListId, limit: usize) -> Vec<ParticipantScore> {
        let mut scores = self.scoring.list_scores(list_id);
        scores.truncate(limit);
        scores
    }

    /// Points and participation aggregated over every list ever created,
    /// including paused, cancelled and ended ones.
    ///
    /// Ties on points go to the participant who joined any list first, then fid.
    pub fn global_leaderboard(&self, limit: usize) -> Vec<GlobalStanding> {
        let mut standings: BTreeMap<Fid, GlobalStanding> = BTreeMap::new();

        for score in self.scoring.all_scores() {
            let entry = standings.entry(score.fid.clone()).or_insert_with(|| GlobalStanding {
                fid: score.fid.clone(),
                display_name: score.display_name.clone(),
                total_points: 0,
                lists_participated: 0,
                position: 0,
                first_joined_at: None,
            });
            entry.total_points = entry.total_points.saturating_add(score.total_points);
            entry.lists_participated += 1;
            if entry.first_joined_at.map_or(true, |t| score.joined_at < t) {
                entry.first_joined_at = Some(score.joined_at);
                entry.display_name = score.display_name.clone();
            }
        }

        let mut ranked: Vec<GlobalStanding> = standings.into_values().collect();
        ranked.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then(a.first_joined_at.cmp(&b.first_joined_at))
                .then_with(|| a.fid.cmp(&b.fid))
        });
        for (index, standing) in ranked.iter_mut().enumerate() {
            standing.position = index as u32 + 1;
        }
        ranked.truncate(limit);
        ranked
    }

    pub fn list_analytics(&self, list_id: &ListId) -> Option<ListAnalytics> {
        let list = self.store.list_by_id(list_id)?;
        let scores = self.scoring.list_scores(list_id);

        let completed_actions: usize = scores.iter().map(|s| s.completed_actions.len()).sum();
        let slots = scores.len() * list.actions.len();
        let completion_rate = if slots == 0 {
            0
        } else {
            ((completed_actions.min(slots) * 100) / slots) as u8
        };

        Some(ListAnalytics {
            list_id: list.id.clone(),
            participants: list.total_participants(),
            completed_actions,
            pending_actions: scores.iter().map(|s| s.pending_actions.len()).sum(),
            total_points_awarded: scores.iter().map(|s| s.total_points).sum(),
            reward_tiers: list.rewards.len(),
            completion_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::{InMemoryListRepository, InMemoryScoreRepository, ListRepository};
    use crate::types::{ActionId, ActionKind, NewAction, NewList, PaymentReceipt, RewardConfig};
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> (Arc<RewardListStore>, Arc<ScoringEngine>, Leaderboard, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        let lists: Arc<dyn ListRepository> = Arc::new(InMemoryListRepository::new());
        let scoring = Arc::new(ScoringEngine::new(
            lists.clone(),
            Arc::new(InMemoryScoreRepository::new()),
            Arc::new(clock.clone()),
        ));
        let store = Arc::new(RewardListStore::new(lists, scoring.clone(), Arc::new(clock.clone())));
        let board = Leaderboard::new(store.clone(), scoring.clone());
        (store, scoring, board, clock)
    }

    fn spec(name: &str) -> NewList {
        NewList {
            name: name.into(),
            description: "desc".into(),
            duration_days: 5,
            actions: vec![NewAction {
                kind: ActionKind::Cast,
                description: "cast".into(),
                points: 50,
                target: None,
            }],
            rewards: vec![RewardConfig::token(1, 100, "CAST")],
            creator: Fid::from("999"),
            creator_wallet: "0x1234567890123456789012345678901234567890".into(),
            payment: Some(PaymentReceipt {
                transaction_hash: "0x01".into(),
                amount: 10,
            }),
        }
    }

    #[test]
    fn test_list_leaderboard_limit() {
        let (store, scoring, board, _) = setup();
        let list = store.create_list(spec("x")).unwrap();
        for (i, fid) in ["a", "b", "c"].iter().enumerate() {
            store.join_list(&list.id, &Fid::from(*fid), fid);
            scoring.record_completion(&list.id, &Fid::from(*fid), &ActionId::from("x"), (i as u64 + 1) * 10);
        }

        let top = board.list_leaderboard(&list.id, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].fid, Fid::from("c"));
        assert_eq!(top[0].position, 1);
        assert_eq!(top[1].fid, Fid::from("b"));
        assert!(board.list_leaderboard(&ListId::from("missing"), 10).is_empty());
    }

    #[test]
    fn test_global_aggregation() {
        let (store, scoring, board, clock) = setup();
        let x = store.create_list(spec("x")).unwrap();
        let y = store.create_list(spec("y")).unwrap();
        let p = Fid::from("12345");
        let q = Fid::from("777");

        store.join_list(&x.id, &p, "cryptouser");
        store.join_list(&y.id, &p, "cryptouser");
        store.join_list(&x.id, &q, "other");
        scoring.record_completion(&x.id, &p, &ActionId::from("a"), 50);
        scoring.record_completion(&y.id, &p, &ActionId::from("b"), 30);
        scoring.record_completion(&x.id, &q, &ActionId::from("a"), 60);

        // ended lists still count
        clock.advance(Duration::days(30));
        let global = board.global_leaderboard(10);

        assert_eq!(global.len(), 2);
        assert_eq!(global[0].fid, p);
        assert_eq!(global[0].total_points, 80);
        assert_eq!(global[0].lists_participated, 2);
        assert_eq!(global[0].position, 1);
        assert_eq!(global[1].total_points, 60);
        assert_eq!(board.global_leaderboard(1).len(), 1);
    }

    #[test]
    fn test_global_ties_go_to_earliest_joiner() {
        let (store, scoring, board, clock) = setup();
        let x = store.create_list(spec("x")).unwrap();
        store.join_list(&x.id, &Fid::from("zed"), "zed");
        clock.advance(Duration::minutes(5));
        store.join_list(&x.id, &Fid::from("amy"), "amy");
        scoring.record_completion(&x.id, &Fid::from("zed"), &ActionId::from("a"), 10);
        scoring.record_completion(&x.id, &Fid::from("amy"), &ActionId::from("a"), 10);

        let global = board.global_leaderboard(10);
        assert_eq!(global[0].fid, Fid::from("zed"));
        assert_eq!(global[1].fid, Fid::from("amy"));
    }

    #[test]
    fn test_list_analytics() {
        let (store, scoring, board, _) = setup();
        let list = store.create_list(spec("x")).unwrap();
        let action = list.actions[0].id.clone();
        store.join_list(&list.id, &Fid::from("a"), "a");
        store.join_list(&list.id, &Fid::from("b"), "b");
        scoring.mark_pending(&list.id, &Fid::from("b"), &action);
        scoring.record_completion(&list.id, &Fid::from("a"), &action, 50);

        let stats = board.list_analytics(&list.id).unwrap();
        assert_eq!(stats.participants, 2);
        assert_eq!(stats.completed_actions, 1);
        assert_eq!(stats.pending_actions, 1);
        assert_eq!(stats.total_points_awarded, 50);
        assert_eq!(stats.completion_rate, 50);
        assert!(board.list_analytics(&ListId::from("missing")).is_none());
    }
}
