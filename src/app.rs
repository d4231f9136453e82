/// PLATFORM FACADE
///
/// Wires the stores, the scoring engine, the leaderboard, the claims ledger and
/// the admin registry around one shared clock, and hands out verification
/// sessions bound to the configured oracle. Role checks live here; the core
/// services assume their callers are authorised.

use crate::settings::{OracleMode, OracleSettings, Settings, SettingsError};
use castboard_core::{
    AccessError, ActivationQuote, AdminRegistry, ClaimError, ClaimReceipt, Clock, EarnedReward, Fid,
    InMemoryListRepository, InMemoryScoreRepository, Leaderboard, ListAnalytics, ListId, ListRepository,
    ListStatus, NewList, PlatformConfig, PlatformConfigUpdate, PlatformMetrics, RewardLedger, RewardList,
    RewardListStore, ScoreRepository, ScoringEngine, ValidationError,
};
use castboard_verifier::{ActionOracle, NeynarOracle, OracleError, SimulatedOracle, VerificationSession};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub struct Platform {
    settings: Settings,
    config: RwLock<PlatformConfig>,
    clock: Arc<dyn Clock>,
    store: Arc<RewardListStore>,
    scoring: Arc<ScoringEngine>,
    leaderboard: Leaderboard,
    ledger: RewardLedger,
    admins: AdminRegistry,
    oracle: Arc<dyn ActionOracle>,
}

impl Platform {
    /// Platform over in-memory repositories
    pub fn new(settings: Settings, oracle: Arc<dyn ActionOracle>, clock: Arc<dyn Clock>) -> Result<Self, PlatformError> {
        Self::with_repositories(
            settings,
            Arc::new(InMemoryListRepository::new()),
            Arc::new(InMemoryScoreRepository::new()),
            oracle,
            clock,
        )
    }

    pub fn with_repositories(
        settings: Settings,
        lists: Arc<dyn ListRepository>,
        scores: Arc<dyn ScoreRepository>,
        oracle: Arc<dyn ActionOracle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PlatformError> {
        settings.validate()?;

        let scoring = Arc::new(ScoringEngine::new(lists.clone(), scores, clock.clone()));
        let store = Arc::new(RewardListStore::new(lists, scoring.clone(), clock.clone()));
        let leaderboard = Leaderboard::new(store.clone(), scoring.clone());
        let ledger = RewardLedger::new(store.clone(), scoring.clone(), clock.clone());
        let admins = AdminRegistry::new(Fid::new(settings.platform.app_creator_fid.clone()));

        info!(
            super_admin = %admins.super_admin(),
            poll_interval_secs = settings.verification.poll_interval_secs,
            max_attempts = settings.verification.max_attempts,
            "Platform initialised"
        );

        Ok(Self {
            config: RwLock::new(settings.platform.clone()),
            settings,
            clock,
            store,
            scoring,
            leaderboard,
            ledger,
            admins,
            oracle,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<RewardListStore> {
        &self.store
    }

    pub fn scoring(&self) -> &Arc<ScoringEngine> {
        &self.scoring
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    pub fn admins(&self) -> &AdminRegistry {
        &self.admins
    }

    pub fn platform_config(&self) -> PlatformConfig {
        self.config.read().clone()
    }

    pub fn quote(&self, days: u32) -> Result<ActivationQuote, PlatformError> {
        Ok(self.config.read().activation_quote(days)?)
    }

    /// Creates a list after checking platform policy (wallet, tokens, caps, payment).
    pub fn create_list(&self, spec: NewList) -> Result<RewardList, PlatformError> {
        self.config.read().check_new_list(&spec)?;
        Ok(self.store.create_list(spec)?)
    }

    pub fn join_list(&self, list_id: &ListId, fid: &Fid, display_name: &str) -> bool {
        self.store.join_list(list_id, fid, display_name)
    }

    /// Verification session for `fid`, tracking every open list it has joined
    pub fn open_session(&self, fid: Fid, display_name: impl Into<String>) -> Arc<VerificationSession> {
        let session = VerificationSession::new(
            fid,
            display_name,
            self.store.clone(),
            self.scoring.clone(),
            self.oracle.clone(),
            self.clock.clone(),
            self.settings.verification.clone(),
        );
        session.track_joined_lists();
        Arc::new(session)
    }

    /// Pause or resume a list. Allowed for the list's creator and admins.
    pub fn set_list_status(&self, caller: &Fid, list_id: &ListId, status: ListStatus) -> Result<bool, PlatformError> {
        let list = self
            .store
            .list_by_id(list_id)
            .ok_or_else(|| PlatformError::ListNotFound(list_id.clone()))?;
        if &list.creator != caller {
            self.admins.ensure_admin(caller)?;
        }
        Ok(self.store.update_status(list_id, status))
    }

    pub fn cancel_list(&self, caller: &Fid, list_id: &ListId, reason: &str) -> Result<bool, PlatformError> {
        self.admins.ensure_admin(caller)?;
        if self.store.list_by_id(list_id).is_none() {
            return Err(PlatformError::ListNotFound(list_id.clone()));
        }
        Ok(self.store.cancel_list(list_id, reason))
    }

    pub fn update_platform_config(
        &self,
        caller: &Fid,
        update: PlatformConfigUpdate,
    ) -> Result<PlatformConfig, PlatformError> {
        self.admins.ensure_admin(caller)?;
        let mut config = self.config.write();
        let next = config.apply(update)?;
        *config = next.clone();
        info!(fid = %caller, fee_percentage = next.fee_percentage, "Platform configuration updated");
        Ok(next)
    }

    pub fn add_admin(&self, caller: &Fid, fid: Fid) -> Result<bool, PlatformError> {
        Ok(self.admins.add_admin(caller, fid)?)
    }

    pub fn remove_admin(&self, caller: &Fid, fid: &Fid) -> Result<bool, PlatformError> {
        Ok(self.admins.remove_admin(caller, fid)?)
    }

    pub fn rewards_for(&self, fid: &Fid) -> Vec<EarnedReward> {
        self.ledger.rewards_for(fid)
    }

    pub fn claim(&self, list_id: &ListId, fid: &Fid, position: u32) -> Result<ClaimReceipt, PlatformError> {
        Ok(self.ledger.claim(list_id, fid, position)?)
    }

    /// Creator dashboard; visible to the list's creator and admins
    pub fn list_analytics(&self, caller: &Fid, list_id: &ListId) -> Result<ListAnalytics, PlatformError> {
        let list = self
            .store
            .list_by_id(list_id)
            .ok_or_else(|| PlatformError::ListNotFound(list_id.clone()))?;
        if &list.creator != caller {
            self.admins.ensure_admin(caller)?;
        }
        self.leaderboard
            .list_analytics(list_id)
            .ok_or_else(|| PlatformError::ListNotFound(list_id.clone()))
    }

    /// Super admin dashboard
    pub fn metrics(&self, caller: &Fid) -> Result<PlatformMetrics, PlatformError> {
        if !self.admins.is_super_admin(caller) {
            return Err(AccessError::NotSuperAdmin(caller.clone()).into());
        }
        Ok(PlatformMetrics::collect(
            &self.store,
            &self.scoring,
            &self.ledger,
            self.clock.now(),
        ))
    }
}

/// Oracle selected by the `oracle.mode` setting
pub fn build_oracle(settings: &OracleSettings) -> Result<Arc<dyn ActionOracle>, OracleError> {
    match settings.mode {
        OracleMode::Neynar => Ok(Arc::new(NeynarOracle::new(&settings.neynar())?)),
        OracleMode::Simulated => Ok(Arc::new(SimulatedOracle::new(settings.success_rate, settings.seed))),
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("List {0} not found")]
    ListNotFound(ListId),
}
