//! CASTBOARD
//!
//! Social reward lists for Farcaster mini-apps. Creators fund time-boxed lists
//! of social actions with positional rewards; participants join, perform the
//! actions and climb the per-list and global leaderboards as each action is
//! verified.
//!
//! This crate wires the workspace together:
//! - `app::Platform`: service facade with role checks and platform policy
//! - `settings`: layered configuration
//! - `refresh`: periodic leaderboard and list snapshots for readers
//! - `telemetry`: logging bootstrap

pub mod app;
pub mod refresh;
pub mod settings;
pub mod telemetry;

pub use app::{build_oracle, Platform, PlatformError};
pub use refresh::{spawn_refresh, BoardSnapshot, RefreshHandle};
pub use settings::{OracleMode, OracleSettings, RefreshConfig, Settings, SettingsError};
