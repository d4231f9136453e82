/// SCORING ENGINE
///
/// Owns every participant score. Points only move on the pending -> completed
/// transition of an action, so duplicate completion signals never double-award.
/// Every score change is followed by a full deterministic re-rank of the list:
///
/// 1. total points, descending
/// 2. join order within the list (`join_seq`), ascending
/// 3. fid, ascending (only reachable for records written by foreign storage)
///
/// Eligible rewards are re-derived from the new position each time, so a
/// reward shown while the list runs is provisional until the list ends and the
/// scores freeze.
///
/// Unknown list or participant ids are no-ops with `false`/`None`/empty results.

use crate::clock::Clock;
use crate::repository::{ListRepository, ScoreRepository};
use crate::types::{ActionId, Fid, ListId, ParticipantScore, RewardConfig, RewardList};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ScoringEngine {
    lists: Arc<dyn ListRepository>,
    scores: Arc<dyn ScoreRepository>,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write cycles on the score repository
    write_lock: Mutex<()>,
}

impl ScoringEngine {
    pub fn new(
        lists: Arc<dyn ListRepository>,
        scores: Arc<dyn ScoreRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lists,
            scores,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a zero score for the pair if none exists yet.
    ///
    /// Returns `None` when the list is unknown, cancelled or already ended.
    pub fn init_score(&self, list_id: &ListId, fid: &Fid, display_name: &str) -> Option<ParticipantScore> {
        let _guard = self.write_lock.lock();
        let list = self.lists.get(list_id)?;

        if let Some(existing) = self.scores.get(list_id, fid) {
            return Some(existing);
        }
        if list.is_cancelled() || list.has_ended(self.clock.now()) {
            return None;
        }

        let join_seq = self
            .scores
            .list_scores(list_id)
            .iter()
            .map(|s| s.join_seq + 1)
            .max()
            .unwrap_or(0);

        self.scores.put(ParticipantScore::new(
            list_id.clone(),
            fid.clone(),
            display_name.to_string(),
            self.clock.now(),
            join_seq,
        ));
        debug!(list_id = %list_id, fid = %fid, join_seq, "Initialized participant score");

        self.recompute_locked(&list);
        self.scores.get(list_id, fid)
    }

    /// Marks an action as awaiting verification. False if the action is already
    /// completed, the participant has not joined, or the list no longer accepts scores.
    pub fn mark_pending(&self, list_id: &ListId, fid: &Fid, action_id: &ActionId) -> bool {
        let _guard = self.write_lock.lock();
        let Some(list) = self.lists.get(list_id) else {
            return false;
        };
        if !list.is_open(self.clock.now()) {
            return false;
        }
        let Some(mut score) = self.scores.get(list_id, fid) else {
            return false;
        };
        if score.has_completed(action_id) {
            return false;
        }

        score.pending_actions.insert(action_id.clone());
        self.scores.put(score);
        true
    }

    /// Drops an action from the pending set (verification gave up).
    pub fn clear_pending(&self, list_id: &ListId, fid: &Fid, action_id: &ActionId) -> bool {
        let _guard = self.write_lock.lock();
        let Some(mut score) = self.scores.get(list_id, fid) else {
            return false;
        };
        let removed = score.pending_actions.remove(action_id);
        if removed {
            self.scores.put(score);
        }
        removed
    }

    /// Moves `action_id` into the completed set and awards `points`.
    ///
    /// Returns true only when points were awarded. A second call for the same
    /// action, a call for a participant who never joined, or a call against a
    /// paused, cancelled or ended list changes nothing.
    pub fn record_completion(&self, list_id: &ListId, fid: &Fid, action_id: &ActionId, points: u64) -> bool {
        let _guard = self.write_lock.lock();
        let Some(list) = self.lists.get(list_id) else {
            return false;
        };
        if !list.is_open(self.clock.now()) {
            debug!(list_id = %list_id, fid = %fid, "Completion ignored, list not accepting scores");
            return false;
        }
        let Some(mut score) = self.scores.get(list_id, fid) else {
            return false;
        };
        if score.has_completed(action_id) {
            return false;
        }

        score.pending_actions.remove(action_id);
        score.completed_actions.insert(action_id.clone());
        score.total_points = score.total_points.saturating_add(points);
        let total = score.total_points;
        self.scores.put(score);

        info!(
            list_id = %list_id,
            fid = %fid,
            action_id = %action_id,
            points,
            total,
            "Action completion recorded"
        );

        self.recompute_locked(&list);
        true
    }

    /// Re-ranks every participant of the list and re-derives eligible rewards.
    /// Returns the ranked scores (position 1 first).
    pub fn recompute_ranks(&self, list_id: &ListId) -> Vec<ParticipantScore> {
        let _guard = self.write_lock.lock();
        match self.lists.get(list_id) {
            Some(list) => self.recompute_locked(&list),
            None => Vec::new(),
        }
    }

    fn recompute_locked(&self, list: &RewardList) -> Vec<ParticipantScore> {
        let mut scores = self.scores.list_scores(&list.id);
        rank_scores(&mut scores, &list.rewards);
        self.scores.put_all(scores.clone());
        debug!(list_id = %list.id, participants = scores.len(), "Recomputed ranks");
        scores
    }

    pub fn score(&self, list_id: &ListId, fid: &Fid) -> Option<ParticipantScore> {
        self.scores.get(list_id, fid)
    }

    /// Scores of one list ordered by position
    pub fn list_scores(&self, list_id: &ListId) -> Vec<ParticipantScore> {
        let mut scores = self.scores.list_scores(list_id);
        scores.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| rank_order(a, b)));
        scores
    }

    pub fn all_scores(&self) -> Vec<ParticipantScore> {
        self.scores.all_scores()
    }
}

/// Ranking comparator: points descending, then join order, then fid.
pub fn rank_order(a: &ParticipantScore, b: &ParticipantScore) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then(a.join_seq.cmp(&b.join_seq))
        .then_with(|| a.fid.cmp(&b.fid))
}

/// Sorts `scores` into rank order and assigns positions 1..=N and the rewards
/// configured at each position. Pure in the score set: input order is irrelevant.
pub fn rank_scores(scores: &mut [ParticipantScore], rewards: &BTreeMap<u32, RewardConfig>) {
    scores.sort_by(rank_order);
    for (index, score) in scores.iter_mut().enumerate() {
        let position = index as u32 + 1;
        score.position = position;
        score.eligible_rewards = rewards.get(&position).cloned().into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::{InMemoryListRepository, InMemoryScoreRepository};
    use crate::types::{ActionConfig, ActionKind, ListStatus};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeSet;

    struct Fixture {
        clock: ManualClock,
        lists: Arc<InMemoryListRepository>,
        engine: ScoringEngine,
        list_id: ListId,
    }

    fn fixture() -> Fixture {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let lists = Arc::new(InMemoryListRepository::new());
        let list_id = ListId::from("list-1");

        let mut rewards = BTreeMap::new();
        rewards.insert(1, RewardConfig::token(1, 1000, "CAST"));
        rewards.insert(3, RewardConfig::nft(3, "Bronze Badge", "https://example.com/nft/bronze"));

        lists.put(RewardList {
            id: list_id.clone(),
            name: "Growth".into(),
            description: "Grow".into(),
            creator: Fid::from("999"),
            creator_wallet: "0x1234567890123456789012345678901234567890".into(),
            duration_days: 7,
            start_date: start,
            end_date: RewardList::end_for(start, 7).unwrap(),
            actions: vec![ActionConfig {
                id: ActionId::from("cast-1"),
                kind: ActionKind::Cast,
                description: "Cast".into(),
                points: 50,
                target: None,
            }],
            rewards,
            status: ListStatus::Active,
            is_paid: true,
            activation_tx: Some("0xabc".into()),
            cancellation_reason: None,
            participants: BTreeSet::new(),
        });

        let engine = ScoringEngine::new(
            lists.clone(),
            Arc::new(InMemoryScoreRepository::new()),
            Arc::new(clock.clone()),
        );
        Fixture { clock, lists, engine, list_id }
    }

    #[test]
    fn test_init_score_is_idempotent() {
        let f = fixture();
        let fid = Fid::from("1");
        let first = f.engine.init_score(&f.list_id, &fid, "alice").unwrap();
        f.engine.record_completion(&f.list_id, &fid, &ActionId::from("cast-1"), 50);
        let second = f.engine.init_score(&f.list_id, &fid, "alice").unwrap();

        assert_eq!(first.total_points, 0);
        assert_eq!(second.total_points, 50);
        assert_eq!(f.engine.list_scores(&f.list_id).len(), 1);
    }

    #[test]
    fn test_completion_is_idempotent() {
        let f = fixture();
        let fid = Fid::from("1");
        let action = ActionId::from("cast-1");
        f.engine.init_score(&f.list_id, &fid, "alice");
        assert!(f.engine.mark_pending(&f.list_id, &fid, &action));

        assert!(f.engine.record_completion(&f.list_id, &fid, &action, 50));
        assert!(!f.engine.record_completion(&f.list_id, &fid, &action, 50));

        let score = f.engine.score(&f.list_id, &fid).unwrap();
        assert_eq!(score.total_points, 50);
        assert_eq!(score.completed_actions.len(), 1);
        assert!(score.pending_actions.is_empty());
        assert!(!f.engine.mark_pending(&f.list_id, &fid, &action));
    }

    #[test]
    fn test_ranks_follow_points_then_join_order() {
        let f = fixture();
        for (fid, name) in [("a", "alice"), ("b", "bob"), ("c", "carol")] {
            f.engine.init_score(&f.list_id, &Fid::from(fid), name);
        }
        f.engine.record_completion(&f.list_id, &Fid::from("c"), &ActionId::from("x"), 30);

        let ranked = f.engine.list_scores(&f.list_id);
        let order: Vec<_> = ranked.iter().map(|s| (s.fid.as_str(), s.position)).collect();
        assert_eq!(order, vec![("c", 1), ("a", 2), ("b", 3)]);

        assert_eq!(ranked[0].eligible_rewards, vec![RewardConfig::token(1, 1000, "CAST")]);
        assert!(ranked[1].eligible_rewards.is_empty());
        assert!(ranked[2].eligible_rewards[0].is_nft());
    }

    #[test]
    fn test_reward_moves_with_position() {
        let f = fixture();
        let (a, b) = (Fid::from("a"), Fid::from("b"));
        f.engine.init_score(&f.list_id, &a, "alice");
        f.engine.init_score(&f.list_id, &b, "bob");
        f.engine.record_completion(&f.list_id, &a, &ActionId::from("x"), 10);
        assert_eq!(f.engine.score(&f.list_id, &a).unwrap().position, 1);

        f.engine.record_completion(&f.list_id, &b, &ActionId::from("y"), 20);
        let a_score = f.engine.score(&f.list_id, &a).unwrap();
        let b_score = f.engine.score(&f.list_id, &b).unwrap();
        assert_eq!((a_score.position, b_score.position), (2, 1));
        assert!(a_score.eligible_rewards.is_empty());
        assert_eq!(b_score.eligible_rewards.len(), 1);
    }

    #[test]
    fn test_scores_freeze_after_end() {
        let f = fixture();
        let fid = Fid::from("1");
        f.engine.init_score(&f.list_id, &fid, "alice");
        f.clock.advance(Duration::days(7));

        assert!(!f.engine.record_completion(&f.list_id, &fid, &ActionId::from("cast-1"), 50));
        assert!(f.engine.init_score(&f.list_id, &Fid::from("late"), "late").is_none());
        assert_eq!(f.engine.score(&f.list_id, &fid).unwrap().total_points, 0);
    }

    #[test]
    fn test_paused_list_rejects_completion() {
        let f = fixture();
        let fid = Fid::from("1");
        f.engine.init_score(&f.list_id, &fid, "alice");

        let mut list = f.lists.get(&f.list_id).unwrap();
        list.status = ListStatus::Paused;
        f.lists.put(list);

        assert!(!f.engine.record_completion(&f.list_id, &fid, &ActionId::from("cast-1"), 50));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let f = fixture();
        let missing = ListId::from("nope");
        assert!(f.engine.init_score(&missing, &Fid::from("1"), "x").is_none());
        assert!(!f.engine.record_completion(&missing, &Fid::from("1"), &ActionId::from("a"), 5));
        assert!(f.engine.recompute_ranks(&missing).is_empty());
        assert!(f.engine.score(&missing, &Fid::from("1")).is_none());
        assert!(!f.engine.record_completion(&f.list_id, &Fid::from("stranger"), &ActionId::from("a"), 5));
    }
}
