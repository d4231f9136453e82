/// ACTION VERIFICATION ORACLE
///
/// The only external boundary of the verification loop: given a participant
/// and an action descriptor, report whether the action has been observed.
/// Callers treat `Ok(false)` and every `Err` the same way (a missed attempt).

use async_trait::async_trait;
use castboard_core::{ActionConfig, ActionKind, Fid};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// What the oracle needs to know about an action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    /// Cast hash for cast/recast/like
    pub target_content: Option<String>,
    /// User handle or fid for follow
    pub target_user: Option<String>,
    /// When the participant started the action; evidence older than this does not count
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&ActionConfig> for ActionDescriptor {
    fn from(action: &ActionConfig) -> Self {
        ActionDescriptor {
            kind: action.kind,
            target_content: action.target_content().map(str::to_string),
            target_user: action.target_user().map(str::to_string),
            started_at: None,
        }
    }
}

impl ActionDescriptor {
    pub fn with_started_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.started_at = at;
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionOracle: Send + Sync {
    async fn verify_action(&self, fid: &Fid, action: &ActionDescriptor) -> Result<bool, OracleError>;
}

/// Random outcomes at a fixed success rate, for demos and load simulation
pub struct SimulatedOracle {
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedOracle {
    pub fn new(success_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        // NaN and infinities never succeed
        let success_rate = if success_rate.is_finite() {
            success_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            success_rate,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl ActionOracle for SimulatedOracle {
    async fn verify_action(&self, _fid: &Fid, _action: &ActionDescriptor) -> Result<bool, OracleError> {
        Ok(self.rng.lock().gen_bool(self.success_rate))
    }
}

/// Deterministic oracle behaviour for one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Deny until the n-th check of an action, confirm from then on
    ConfirmOnCall(u32),
    AlwaysDeny,
    AlwaysError,
}

/// Scripted oracle: per-participant behaviour, per-action call counting
pub struct ScriptedOracle {
    default: Script,
    scripts: Mutex<HashMap<Fid, Script>>,
    calls: Mutex<HashMap<(Fid, ActionDescriptor), u32>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_script(self, fid: impl Into<Fid>, script: Script) -> Self {
        self.scripts.lock().insert(fid.into(), script);
        self
    }

    /// Every check sleeps this long before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_script(&self, fid: impl Into<Fid>, script: Script) {
        self.scripts.lock().insert(fid.into(), script);
    }

    /// Total checks made for a participant, over all actions
    pub fn calls_for(&self, fid: &Fid) -> u32 {
        self.calls
            .lock()
            .iter()
            .filter(|((f, _), _)| f == fid)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Highest number of checks observed running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionOracle for ScriptedOracle {
    async fn verify_action(&self, fid: &Fid, action: &ActionDescriptor) -> Result<bool, OracleError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry((fid.clone(), action.clone())).or_insert(0);
            *count += 1;
            *count
        };
        let script = self.scripts.lock().get(fid).copied().unwrap_or(self.default);
        match script {
            Script::ConfirmOnCall(n) => Ok(call >= n),
            Script::AlwaysDeny => Ok(false),
            Script::AlwaysError => Err(OracleError::Unavailable("scripted failure".into())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Oracle transport error: {0}")]
    Transport(String),
    #[error("Oracle returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("Could not decode oracle response: {0}")]
    Decode(String),
    #[error("Fid {0} is not numeric")]
    InvalidFid(String),
    #[error("{0} action has no target to verify against")]
    MissingTarget(ActionKind),
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}
