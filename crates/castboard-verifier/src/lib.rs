//! CASTBOARD VERIFIER: ACTION VERIFICATION LOOP
//!
//! Drives participant actions from "started" to "completed" by polling an
//! external oracle on a fixed interval, with a bounded number of attempts.
//!
//! - `oracle`: the oracle trait plus simulated and scripted implementations
//! - `neynar`: HTTP oracle against the Neynar Farcaster API
//! - `status`: per-action state machine
//! - `events`: notifications broadcast to subscribers
//! - `session`: per-participant session and its cancellable periodic task

pub mod config;
pub mod events;
pub mod neynar;
pub mod oracle;
pub mod session;
pub mod status;

pub use config::VerificationConfig;
pub use events::{Severity, VerificationEvent};
pub use neynar::{NeynarConfig, NeynarOracle};
pub use oracle::{ActionDescriptor, ActionOracle, OracleError, Script, ScriptedOracle, SimulatedOracle};
pub use session::{CycleReport, SessionError, SessionHandle, VerificationSession};
pub use status::{ActionState, ActionStatus, FailureReason, MissOutcome, TransitionError};
