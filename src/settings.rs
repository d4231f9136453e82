/// Layered runtime settings: built-in defaults, then an optional TOML file,
/// then `CASTBOARD__SECTION__KEY` environment variables.

use castboard_core::{PlatformConfig, ValidationError};
use castboard_verifier::{NeynarConfig, VerificationConfig};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const ENV_PREFIX: &str = "CASTBOARD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
    pub verification: VerificationConfig,
    pub refresh: RefreshConfig,
    pub platform: PlatformConfig,
    pub oracle: OracleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            verification: VerificationConfig::default(),
            refresh: RefreshConfig::default(),
            platform: PlatformConfig::default(),
            oracle: OracleSettings::default(),
        }
    }
}

/// Reader refresh cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub leaderboard_secs: u64,
    pub lists_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            leaderboard_secs: 10,
            lists_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleMode {
    Neynar,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub mode: OracleMode,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Simulated mode only
    pub success_rate: f64,
    pub seed: Option<u64>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        let neynar = NeynarConfig::default();
        Self {
            mode: OracleMode::Simulated,
            base_url: neynar.base_url,
            api_key: neynar.api_key,
            timeout_secs: neynar.timeout_secs,
            success_rate: 0.3,
            seed: None,
        }
    }
}

impl OracleSettings {
    pub fn neynar(&self) -> NeynarConfig {
        NeynarConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

impl Settings {
    /// Loads settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("platform.allowed_tokens")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(source: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Switches to the simulated oracle, as the CLI `--success-rate` flag does.
    pub fn with_simulated_oracle(mut self, success_rate: f64, seed: Option<u64>) -> Result<Self, SettingsError> {
        self.oracle.mode = OracleMode::Simulated;
        self.oracle.success_rate = success_rate;
        self.oracle.seed = seed.or(self.oracle.seed);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let v = &self.verification;
        if v.poll_interval_secs == 0 {
            return Err(SettingsError::invalid("verification.poll_interval_secs", "must be positive"));
        }
        if v.max_attempts == 0 {
            return Err(SettingsError::invalid("verification.max_attempts", "must be positive"));
        }
        if v.max_concurrent_checks == 0 {
            return Err(SettingsError::invalid("verification.max_concurrent_checks", "must be positive"));
        }
        if self.refresh.leaderboard_secs == 0 || self.refresh.lists_secs == 0 {
            return Err(SettingsError::invalid("refresh", "intervals must be positive"));
        }
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&self.oracle.success_rate) {
            return Err(SettingsError::invalid("oracle.success_rate", "must be between 0 and 1"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(SettingsError::invalid("oracle.timeout_secs", "must be positive"));
        }
        self.platform.validate()?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
    #[error("Invalid platform settings: {0}")]
    Platform(#[from] ValidationError),
}

impl SettingsError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
