/// VERIFICATION SESSION
///
/// One session per participant. It tracks the status of every action in the
/// lists the participant joined and, once per cycle, asks the oracle about each
/// pending action:
/// - confirmed: points are awarded once and the action completes
/// - denied or errored: the attempt is counted, the action times out at the cap
/// - list cancelled or past its end: the action fails as closed, no oracle call
/// - list paused: the action is left alone for this cycle
///
/// Checks within a cycle run concurrently up to `max_concurrent_checks`, and an
/// action never has more than one check in flight. Results that arrive after
/// the session closed, or after the list stopped accepting scores, are dropped.

use crate::config::VerificationConfig;
use crate::events::VerificationEvent;
use crate::oracle::{ActionDescriptor, ActionOracle, OracleError};
use crate::status::{ActionState, ActionStatus, MissOutcome, TransitionError};
use castboard_core::{ActionId, Clock, Fid, ListId, ListStatus, RewardListStore, ScoringEngine};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct ActionKey {
    list_id: ListId,
    action_id: ActionId,
}

struct VerificationJob {
    key: ActionKey,
    descriptor: ActionDescriptor,
    points: u64,
}

/// Counters for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// Oracle calls made
    pub polled: usize,
    pub completed: usize,
    pub retried: usize,
    /// Timed out this cycle
    pub failed: usize,
    /// Failed because their list closed
    pub closed: usize,
    /// Paused list or check already in flight
    pub skipped: usize,
    pub discarded: usize,
    pub oracle_errors: usize,
}

pub struct VerificationSession {
    participant: Fid,
    display_name: String,
    store: Arc<RewardListStore>,
    scoring: Arc<ScoringEngine>,
    oracle: Arc<dyn ActionOracle>,
    clock: Arc<dyn Clock>,
    config: VerificationConfig,
    statuses: Mutex<BTreeMap<ActionKey, ActionStatus>>,
    in_flight: Mutex<HashSet<ActionKey>>,
    events: broadcast::Sender<VerificationEvent>,
    shutdown: CancellationToken,
    cycles: AtomicU64,
}

impl VerificationSession {
    pub fn new(
        participant: Fid,
        display_name: impl Into<String>,
        store: Arc<RewardListStore>,
        scoring: Arc<ScoringEngine>,
        oracle: Arc<dyn ActionOracle>,
        clock: Arc<dyn Clock>,
        config: VerificationConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            participant,
            display_name: display_name.into(),
            store,
            scoring,
            oracle,
            clock,
            config,
            statuses: Mutex::new(BTreeMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            events,
            shutdown: CancellationToken::new(),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn participant(&self) -> &Fid {
        &self.participant
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VerificationEvent> {
        self.events.subscribe()
    }

    /// Joins every open list and tracks its actions. Returns lists newly joined.
    pub fn join_active_lists(&self) -> usize {
        let joined = self
            .store
            .active_lists()
            .iter()
            .filter(|list| self.store.join_list(&list.id, &self.participant, &self.display_name))
            .count();
        self.track_joined_lists();
        joined
    }

    /// Registers statuses for the actions of open lists the participant joined.
    /// Returns the number of actions newly tracked.
    pub fn track_joined_lists(&self) -> usize {
        let now = self.clock.now();
        let mut statuses = self.statuses.lock();
        let mut tracked = 0;

        for list in self.store.lists_joined_by(&self.participant) {
            if !list.is_open(now) {
                continue;
            }
            let score = self.scoring.score(&list.id, &self.participant);
            for action in &list.actions {
                let key = ActionKey {
                    list_id: list.id.clone(),
                    action_id: action.id.clone(),
                };
                if statuses.contains_key(&key) {
                    continue;
                }
                let done = score.as_ref().map_or(false, |s| s.has_completed(&action.id));
                let status = if done {
                    ActionStatus::completed(list.id.clone(), action.id.clone(), action.points)
                } else {
                    ActionStatus::available(list.id.clone(), action.id.clone(), action.points)
                };
                statuses.insert(key, status);
                tracked += 1;
            }
        }
        tracked
    }

    pub fn status(&self, list_id: &ListId, action_id: &ActionId) -> Option<ActionStatus> {
        let key = ActionKey {
            list_id: list_id.clone(),
            action_id: action_id.clone(),
        };
        self.statuses.lock().get(&key).cloned()
    }

    pub fn statuses(&self) -> Vec<ActionStatus> {
        self.statuses.lock().values().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.statuses
            .lock()
            .values()
            .filter(|s| s.state == ActionState::Pending)
            .count()
    }

    /// Moves an available action to pending. Verification happens on later cycles.
    pub fn start_action(&self, list_id: &ListId, action_id: &ActionId) -> Result<ActionStatus, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let now = self.clock.now();
        let list = self
            .store
            .list_by_id(list_id)
            .ok_or_else(|| SessionError::UnknownList(list_id.clone()))?;
        if !list.is_open(now) {
            return Err(SessionError::ListNotOpen(list_id.clone()));
        }
        let action = list
            .action(action_id)
            .ok_or_else(|| SessionError::UnknownAction(action_id.clone()))?;
        let score = self
            .scoring
            .score(list_id, &self.participant)
            .ok_or_else(|| SessionError::NotJoined(list_id.clone()))?;

        let key = ActionKey {
            list_id: list_id.clone(),
            action_id: action_id.clone(),
        };
        let mut statuses = self.statuses.lock();
        let status = statuses
            .entry(key)
            .or_insert_with(|| ActionStatus::available(list_id.clone(), action_id.clone(), action.points));

        if score.has_completed(action_id) {
            if !status.is_terminal() {
                *status = ActionStatus::completed(list_id.clone(), action_id.clone(), action.points);
            }
            return Err(SessionError::AlreadyCompleted(action_id.clone()));
        }

        let mut next = status.clone();
        next.start(now)?;
        if !self.scoring.mark_pending(list_id, &self.participant, action_id) {
            return Err(SessionError::ListNotOpen(list_id.clone()));
        }
        *status = next;

        info!(fid = %self.participant, list_id = %list_id, action_id = %action_id, "Action started");
        self.publish(VerificationEvent::Started {
            fid: self.participant.clone(),
            list_id: list_id.clone(),
            action_id: action_id.clone(),
        });
        Ok(status.clone())
    }

    /// Runs one verification cycle over every pending action.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };
        if self.is_closed() {
            return report;
        }

        let jobs = self.collect_jobs(self.clock.now(), &mut report);
        report.polled = jobs.len();
        if jobs.is_empty() {
            return report;
        }

        let oracle = &self.oracle;
        let fid = &self.participant;
        let mut outcomes = stream::iter(jobs)
            .map(|job| async move {
                let outcome = oracle.verify_action(fid, &job.descriptor).await;
                (job, outcome)
            })
            .buffer_unordered(self.config.max_concurrent_checks.max(1));

        while let Some((job, outcome)) = outcomes.next().await {
            self.apply_outcome(job, outcome, &mut report);
        }

        debug!(
            fid = %self.participant,
            cycle,
            polled = report.polled,
            completed = report.completed,
            failed = report.failed,
            "Verification cycle finished"
        );
        report
    }

    fn collect_jobs(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Vec<VerificationJob> {
        let mut statuses = self.statuses.lock();
        let mut in_flight = self.in_flight.lock();
        let mut jobs = Vec::new();

        for (key, status) in statuses.iter_mut() {
            if status.state != ActionState::Pending {
                continue;
            }
            let list = self.store.list_by_id(&key.list_id);
            let action = list
                .as_ref()
                .filter(|l| l.is_open(now))
                .and_then(|l| l.action(&key.action_id).cloned());

            if let Some(action) = action {
                if !in_flight.insert(key.clone()) {
                    report.skipped += 1;
                    continue;
                }
                jobs.push(VerificationJob {
                    key: key.clone(),
                    descriptor: ActionDescriptor::from(&action).with_started_at(status.started_at),
                    points: action.points,
                });
                continue;
            }

            let paused = list
                .as_ref()
                .map_or(false, |l| l.status == ListStatus::Paused && l.is_paid && !l.has_ended(now));
            if paused {
                report.skipped += 1;
                continue;
            }

            if let Err(e) = status.close() {
                warn!(error = %e, "Could not close pending action");
                continue;
            }
            self.scoring.clear_pending(&key.list_id, &self.participant, &key.action_id);
            report.closed += 1;
            info!(
                fid = %self.participant,
                list_id = %key.list_id,
                action_id = %key.action_id,
                "Pending action closed with its list"
            );
            self.publish(VerificationEvent::ListClosed {
                fid: self.participant.clone(),
                list_id: key.list_id.clone(),
                action_id: key.action_id.clone(),
            });
        }
        jobs
    }

    fn apply_outcome(&self, job: VerificationJob, outcome: Result<bool, OracleError>, report: &mut CycleReport) {
        self.in_flight.lock().remove(&job.key);
        if let Err(e) = &outcome {
            report.oracle_errors += 1;
            warn!(
                fid = %self.participant,
                list_id = %job.key.list_id,
                action_id = %job.key.action_id,
                error = %e,
                "Oracle check failed"
            );
        }
        if self.is_closed() {
            report.discarded += 1;
            return;
        }

        let now = self.clock.now();
        let open = self
            .store
            .list_by_id(&job.key.list_id)
            .map_or(false, |l| l.is_open(now));
        let mut statuses = self.statuses.lock();
        let Some(status) = statuses.get_mut(&job.key) else {
            report.discarded += 1;
            return;
        };
        if status.state != ActionState::Pending || !open {
            report.discarded += 1;
            return;
        }

        let ActionKey { list_id, action_id } = &job.key;
        match outcome {
            Ok(true) => {
                let awarded = self
                    .scoring
                    .record_completion(list_id, &self.participant, action_id, job.points);
                let credited = awarded
                    || self
                        .scoring
                        .score(list_id, &self.participant)
                        .map_or(false, |s| s.has_completed(action_id));
                if !credited {
                    report.discarded += 1;
                    return;
                }
                if let Err(e) = status.complete(now) {
                    warn!(error = %e, "Could not complete action");
                    return;
                }
                report.completed += 1;
                self.publish(VerificationEvent::Completed {
                    fid: self.participant.clone(),
                    list_id: list_id.clone(),
                    action_id: action_id.clone(),
                    points: job.points,
                    awarded,
                });
            }
            Ok(false) | Err(_) => match status.record_miss(self.config.max_attempts) {
                Ok(MissOutcome::Retry) => report.retried += 1,
                Ok(MissOutcome::Exhausted) => {
                    self.scoring.clear_pending(list_id, &self.participant, action_id);
                    report.failed += 1;
                    warn!(
                        fid = %self.participant,
                        list_id = %list_id,
                        action_id = %action_id,
                        attempts = status.attempts,
                        "Action verification timed out"
                    );
                    self.publish(VerificationEvent::TimedOut {
                        fid: self.participant.clone(),
                        list_id: list_id.clone(),
                        action_id: action_id.clone(),
                        attempts: status.attempts,
                    });
                }
                Err(e) => warn!(error = %e, "Could not record missed check"),
            },
        }
    }

    fn publish(&self, event: VerificationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Runs a cycle every poll interval until the session is closed.
    /// The first cycle runs one interval after spawning.
    pub fn spawn(self: &Arc<Self>) -> SessionHandle {
        let session = Arc::clone(self);
        let token = self.shutdown.clone();
        let period = self.config.poll_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(fid = %session.participant, interval_secs = period.as_secs(), "Verification loop started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        session.run_cycle().await;
                    }
                }
            }
            info!(fid = %session.participant, "Verification loop stopped");
        });

        SessionHandle {
            shutdown: self.shutdown.clone(),
            task,
        }
    }

    /// Stops the loop. Checks still in flight finish but their results are dropped.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!(fid = %self.participant, "Closing verification session");
            self.shutdown.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

pub struct SessionHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the session and waits for the loop to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Verification loop ended abnormally");
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Verification session is closed")]
    Closed,
    #[error("List {0} not found")]
    UnknownList(ListId),
    #[error("List {0} is not accepting actions")]
    ListNotOpen(ListId),
    #[error("Participant has not joined list {0}")]
    NotJoined(ListId),
    #[error("Action {0} not found in list")]
    UnknownAction(ActionId),
    #[error("Action {0} already completed")]
    AlreadyCompleted(ActionId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}
