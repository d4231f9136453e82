/// STORAGE SEAM
///
/// The store and the scoring engine persist through these traits. Records handed
/// out are owned copies: mutating one does not change what is stored until it is
/// written back with `put`.

use crate::types::{Fid, ListId, ParticipantScore, RewardList};
use dashmap::DashMap;
use std::collections::BTreeMap;

pub trait ListRepository: Send + Sync {
    fn get(&self, id: &ListId) -> Option<RewardList>;
    fn put(&self, list: RewardList);
    fn list(&self) -> Vec<RewardList>;
}

pub trait ScoreRepository: Send + Sync {
    fn get(&self, list_id: &ListId, fid: &Fid) -> Option<ParticipantScore>;
    fn put(&self, score: ParticipantScore);
    /// All scores of one list, in no particular order
    fn list_scores(&self, list_id: &ListId) -> Vec<ParticipantScore>;
    fn all_scores(&self) -> Vec<ParticipantScore>;

    fn put_all(&self, scores: Vec<ParticipantScore>) {
        for score in scores {
            self.put(score);
        }
    }
}

/// Process-memory list storage
#[derive(Debug, Default)]
pub struct InMemoryListRepository {
    lists: DashMap<ListId, RewardList>,
}

impl InMemoryListRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListRepository for InMemoryListRepository {
    fn get(&self, id: &ListId) -> Option<RewardList> {
        self.lists.get(id).map(|entry| entry.value().clone())
    }

    fn put(&self, list: RewardList) {
        self.lists.insert(list.id.clone(), list);
    }

    fn list(&self) -> Vec<RewardList> {
        self.lists.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// Process-memory score storage, indexed by list then participant
#[derive(Debug, Default)]
pub struct InMemoryScoreRepository {
    scores: DashMap<ListId, BTreeMap<Fid, ParticipantScore>>,
}

impl InMemoryScoreRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreRepository for InMemoryScoreRepository {
    fn get(&self, list_id: &ListId, fid: &Fid) -> Option<ParticipantScore> {
        self.scores.get(list_id).and_then(|list| list.get(fid).cloned())
    }

    fn put(&self, score: ParticipantScore) {
        self.scores
            .entry(score.list_id.clone())
            .or_default()
            .insert(score.fid.clone(), score);
    }

    fn list_scores(&self, list_id: &ListId) -> Vec<ParticipantScore> {
        self.scores
            .get(list_id)
            .map(|list| list.values().cloned().collect())
            .unwrap_or_default()
    }

    fn all_scores(&self) -> Vec<ParticipantScore> {
        self.scores
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }
}
