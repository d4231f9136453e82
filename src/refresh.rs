/// Periodic reader refresh: the global leaderboard and the open lists are
/// recomputed on their own intervals and published through a watch channel.

use crate::app::Platform;
use castboard_core::{GlobalStanding, RewardList};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub active_lists: Vec<RewardList>,
    pub global: Vec<GlobalStanding>,
    pub leaderboard_refreshed_at: Option<DateTime<Utc>>,
    pub lists_refreshed_at: Option<DateTime<Utc>>,
}

pub struct RefreshHandle {
    snapshots: watch::Receiver<BoardSnapshot>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> BoardSnapshot {
        self.snapshots.borrow().clone()
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Refresh task ended abnormally");
        }
    }
}

/// Both snapshots are filled immediately, then on every tick.
pub fn spawn_refresh(platform: Arc<Platform>, limit: usize) -> RefreshHandle {
    let (tx, rx) = watch::channel(BoardSnapshot::default());
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let refresh = platform.settings().refresh.clone();

    let task = tokio::spawn(async move {
        let mut leaderboard_tick = tokio::time::interval(Duration::from_secs(refresh.leaderboard_secs.max(1)));
        let mut lists_tick = tokio::time::interval(Duration::from_secs(refresh.lists_secs.max(1)));
        leaderboard_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        lists_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = leaderboard_tick.tick() => {
                    let global = platform.leaderboard().global_leaderboard(limit);
                    let now = platform.clock().now();
                    debug!(entries = global.len(), "Leaderboard refreshed");
                    tx.send_modify(|s| {
                        s.global = global;
                        s.leaderboard_refreshed_at = Some(now);
                    });
                }
                _ = lists_tick.tick() => {
                    let lists = platform.store().active_lists();
                    let now = platform.clock().now();
                    debug!(open_lists = lists.len(), "Active lists refreshed");
                    tx.send_modify(|s| {
                        s.active_lists = lists;
                        s.lists_refreshed_at = Some(now);
                    });
                }
            }
        }
    });

    RefreshHandle {
        snapshots: rx,
        shutdown,
        task,
    }
}
