use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
/// 120 checks at 30s gives a one hour verification window
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
    /// Oracle calls in flight per session cycle
    pub max_concurrent_checks: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
        }
    }
}

impl VerificationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Total time a pending action is checked before it times out
    pub fn verification_window(&self) -> Duration {
        self.poll_interval() * self.max_attempts
    }
}
