use crate::types::{ActionKind, Fid};
use thiserror::Error;

/// Malformed input to a list or platform command
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("List name must not be empty")]
    EmptyName,
    #[error("List description must not be empty")]
    EmptyDescription,
    #[error("Duration must be at least 1 day (got {0})")]
    InvalidDuration(u32),
    #[error("List must define at least one action")]
    NoActions,
    #[error("Action '{0}' must award a positive number of points")]
    NonPositivePoints(String),
    #[error("Action '{description}' of kind {kind} requires a target")]
    MissingTarget { kind: ActionKind, description: String },
    #[error("Reward position must be >= 1")]
    InvalidRewardPosition,
    #[error("Duplicate reward position {0}")]
    DuplicateRewardPosition(u32),
    #[error("Token reward amount must be positive")]
    ZeroRewardAmount,
    #[error("Token {0} is not allowed on this platform")]
    TokenNotAllowed(String),
    #[error("Reward amount {amount} exceeds platform maximum {max}")]
    RewardAmountTooLarge { amount: u64, max: u64 },
    #[error("Activation payment is missing")]
    MissingPayment,
    #[error("Activation payment of {paid} is below the required {required}")]
    InsufficientPayment { paid: u64, required: u64 },
    #[error("Invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("Fee percentage must be within 0-100 (got {0})")]
    InvalidFeePercentage(u8),
    #[error("Activation cost for {days} days at {daily_cost} per day overflows")]
    CostOverflow { days: u32, daily_cost: u64 },
}

/// Caller lacks the role a command requires
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("{0} is not the super admin")]
    NotSuperAdmin(Fid),
    #[error("{0} is not authorized for this operation")]
    NotAuthorized(Fid),
    #[error("The super admin role cannot be revoked")]
    CannotRemoveSuperAdmin,
}
