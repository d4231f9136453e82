use castboard_core::{
    ActionKind, Fid, InMemoryListRepository, InMemoryScoreRepository, ListRepository, ManualClock, NewAction,
    NewList, PaymentReceipt, RewardConfig, RewardList, RewardListStore, ScoringEngine,
};
use castboard_verifier::{
    ActionOracle, ActionState, FailureReason, Script, ScriptedOracle, VerificationConfig, VerificationEvent,
    VerificationSession,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<RewardListStore>,
    scoring: Arc<ScoringEngine>,
    clock: ManualClock,
    oracle: Arc<ScriptedOracle>,
    list: RewardList,
}

impl Harness {
    fn new(oracle: ScriptedOracle, duration_days: u32) -> Self {
        Self::with_actions(
            oracle,
            duration_days,
            vec![NewAction {
                kind: ActionKind::Cast,
                description: "Cast about Farcaster".into(),
                points: 50,
                target: None,
            }],
        )
    }

    fn with_actions(oracle: ScriptedOracle, duration_days: u32, actions: Vec<NewAction>) -> Self {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        let lists: Arc<dyn ListRepository> = Arc::new(InMemoryListRepository::new());
        let scoring = Arc::new(ScoringEngine::new(
            lists.clone(),
            Arc::new(InMemoryScoreRepository::new()),
            Arc::new(clock.clone()),
        ));
        let store = Arc::new(RewardListStore::new(lists, scoring.clone(), Arc::new(clock.clone())));
        let list = store
            .create_list(NewList {
                name: "Farcaster Growth Challenge".into(),
                description: "Help grow the Farcaster ecosystem".into(),
                duration_days,
                actions,
                rewards: vec![RewardConfig::token(1, 1000, "CAST"), RewardConfig::token(2, 500, "CAST")],
                creator: Fid::from("999"),
                creator_wallet: "0x1234567890123456789012345678901234567890".into(),
                payment: Some(PaymentReceipt {
                    transaction_hash: "0xabc".into(),
                    amount: u64::from(duration_days) * 2,
                }),
            })
            .unwrap();

        Self {
            store,
            scoring,
            clock,
            oracle: Arc::new(oracle),
            list,
        }
    }

    fn session(&self, fid: &str, config: VerificationConfig) -> Arc<VerificationSession> {
        let oracle: Arc<dyn ActionOracle> = self.oracle.clone();
        Arc::new(VerificationSession::new(
            Fid::from(fid),
            format!("user{fid}"),
            self.store.clone(),
            self.scoring.clone(),
            oracle,
            Arc::new(self.clock.clone()),
            config,
        ))
    }

    fn start_all(&self, session: &VerificationSession) {
        session.join_active_lists();
        for action in &self.list.actions {
            session.start_action(&self.list.id, &action.id).unwrap();
        }
    }
}

#[tokio::test]
async fn always_false_oracle_fails_after_exactly_max_attempts() {
    let h = Harness::new(ScriptedOracle::new(Script::AlwaysDeny), 30);
    let session = h.session("7", VerificationConfig::default());
    h.start_all(&session);
    let action_id = &h.list.actions[0].id;

    for _ in 0..119 {
        session.run_cycle().await;
    }
    let status = session.status(&h.list.id, action_id).unwrap();
    assert_eq!(status.state, ActionState::Pending);
    assert_eq!(status.attempts, 119);

    let report = session.run_cycle().await;
    assert_eq!(report.failed, 1);
    let status = session.status(&h.list.id, action_id).unwrap();
    assert_eq!(status.state, ActionState::Failed);
    assert_eq!(status.failure, Some(FailureReason::TimedOut));
    assert_eq!(h.oracle.calls_for(&Fid::from("7")), 120);

    for _ in 0..10 {
        session.run_cycle().await;
    }
    assert_eq!(session.status(&h.list.id, action_id).unwrap().state, ActionState::Failed);
    assert_eq!(h.oracle.calls_for(&Fid::from("7")), 120);
    tokio_test::assert_err!(session.start_action(&h.list.id, action_id));
    assert_eq!(h.scoring.score(&h.list.id, &Fid::from("7")).unwrap().total_points, 0);
}

#[tokio::test]
async fn full_flow_two_participants() {
    let oracle = ScriptedOracle::new(Script::AlwaysDeny)
        .with_script("1", Script::ConfirmOnCall(1))
        .with_script("2", Script::ConfirmOnCall(2));
    let h = Harness::new(oracle, 1);
    let a = h.session("1", VerificationConfig::default());
    let b = h.session("2", VerificationConfig::default());
    h.start_all(&a);
    h.start_all(&b);

    a.run_cycle().await;
    b.run_cycle().await;
    let a_score = h.scoring.score(&h.list.id, &Fid::from("1")).unwrap();
    let b_score = h.scoring.score(&h.list.id, &Fid::from("2")).unwrap();
    assert_eq!((a_score.total_points, a_score.position), (50, 1));
    assert_eq!((b_score.total_points, b_score.position), (0, 2));
    assert_eq!(a_score.eligible_rewards, vec![RewardConfig::token(1, 1000, "CAST")]);

    a.run_cycle().await;
    b.run_cycle().await;
    let a_score = h.scoring.score(&h.list.id, &Fid::from("1")).unwrap();
    let b_score = h.scoring.score(&h.list.id, &Fid::from("2")).unwrap();
    assert_eq!((a_score.total_points, a_score.position), (50, 1));
    assert_eq!((b_score.total_points, b_score.position), (50, 2));
    assert_eq!(h.oracle.calls_for(&Fid::from("1")), 1);
}

#[tokio::test]
async fn pending_action_closes_when_list_expires() {
    let h = Harness::new(ScriptedOracle::new(Script::AlwaysDeny), 1);
    let session = h.session("7", VerificationConfig::default());
    h.start_all(&session);
    let mut events = session.subscribe();

    session.run_cycle().await;
    h.clock.advance(chrono::Duration::days(1));
    let report = session.run_cycle().await;
    assert_eq!(report.closed, 1);
    assert_eq!(report.polled, 0);

    let status = session.status(&h.list.id, &h.list.actions[0].id).unwrap();
    assert_eq!(status.failure, Some(FailureReason::ListClosed));
    assert!(matches!(events.try_recv(), Ok(VerificationEvent::ListClosed { .. })));
    assert_eq!(h.oracle.calls_for(&Fid::from("7")), 1);
}

#[tokio::test]
async fn cancelled_list_stops_awarding() {
    let h = Harness::new(ScriptedOracle::new(Script::ConfirmOnCall(2)), 7);
    let session = h.session("7", VerificationConfig::default());
    h.start_all(&session);

    session.run_cycle().await;
    assert!(h.store.cancel_list(&h.list.id, "spam"));
    let report = session.run_cycle().await;
    assert_eq!(report.closed, 1);
    assert_eq!(h.scoring.score(&h.list.id, &Fid::from("7")).unwrap().total_points, 0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycles_never_double_check_an_action() {
    let oracle = ScriptedOracle::new(Script::AlwaysDeny).with_latency(Duration::from_secs(10));
    let h = Harness::new(oracle, 7);
    let session = h.session("7", VerificationConfig::default());
    h.start_all(&session);

    let (first, second) = tokio::join!(session.run_cycle(), session.run_cycle());
    assert_eq!(first.polled, 1);
    assert_eq!(second.polled, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(h.oracle.calls_for(&Fid::from("7")), 1);
    assert_eq!(session.status(&h.list.id, &h.list.actions[0].id).unwrap().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_checks_respect_the_configured_cap() {
    let oracle = ScriptedOracle::new(Script::AlwaysDeny).with_latency(Duration::from_secs(10));
    let actions = (1..=5)
        .map(|i| NewAction {
            kind: ActionKind::Like,
            description: format!("Like launch cast #{i}"),
            points: 10,
            target: Some(format!("0x{i:05}")),
        })
        .collect();
    let h = Harness::with_actions(oracle, 7, actions);
    let session = h.session(
        "7",
        VerificationConfig {
            max_concurrent_checks: 2,
            ..VerificationConfig::default()
        },
    );
    h.start_all(&session);
    assert_eq!(session.pending_count(), 5);

    let report = session.run_cycle().await;
    assert_eq!(report.polled, 5);
    assert_eq!(report.retried, 5);
    assert_eq!(h.oracle.calls_for(&Fid::from("7")), 5);
    assert_eq!(h.oracle.peak_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn results_after_close_are_discarded() {
    let oracle = ScriptedOracle::new(Script::ConfirmOnCall(1)).with_latency(Duration::from_secs(10));
    let h = Harness::new(oracle, 7);
    let session = h.session("7", VerificationConfig::default());
    h.start_all(&session);

    let (report, _) = tokio::join!(session.run_cycle(), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        session.close();
    });
    assert_eq!(report.discarded, 1);
    assert_eq!(report.completed, 0);
    assert_eq!(
        session.status(&h.list.id, &h.list.actions[0].id).unwrap().state,
        ActionState::Pending
    );
    assert_eq!(h.scoring.score(&h.list.id, &Fid::from("7")).unwrap().total_points, 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn spawned_loop_polls_on_interval_until_shutdown() {
    let h = Harness::new(ScriptedOracle::new(Script::AlwaysDeny), 7);
    let session = h.session(
        "7",
        VerificationConfig {
            poll_interval_secs: 30,
            max_attempts: 120,
            max_concurrent_checks: 4,
        },
    );
    h.start_all(&session);
    let fid = Fid::from("7");

    let handle = session.spawn();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.oracle.calls_for(&fid), 0);

    tokio::time::sleep(Duration::from_secs(85)).await;
    assert_eq!(h.oracle.calls_for(&fid), 3);

    handle.shutdown().await;
    assert!(session.is_closed());
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.oracle.calls_for(&fid), 3);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn spawned_loop_completes_confirmed_action() {
    let h = Harness::new(ScriptedOracle::new(Script::ConfirmOnCall(2)), 7);
    let session = h.session("7", VerificationConfig::default());
    h.start_all(&session);
    let mut events = session.subscribe();

    let handle = session.spawn();
    tokio::time::sleep(Duration::from_secs(65)).await;

    let event = events.recv().await.unwrap();
    assert_eq!(event.message(), "Action completed! +50 points");
    assert_eq!(h.scoring.score(&h.list.id, &Fid::from("7")).unwrap().total_points, 50);
    handle.shutdown().await;
}
