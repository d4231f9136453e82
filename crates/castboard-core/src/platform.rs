/// PLATFORM POLICY
///
/// Admin-managed configuration: contract addresses, treasury, platform fee,
/// reward caps, allowed reward tokens and list activation pricing.

use crate::error::ValidationError;
use crate::types::{NewList, RewardConfig, RewardKind};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FEE_PERCENTAGE: u8 = 5;
pub const DEFAULT_MAX_REWARD_AMOUNT: u64 = 10_000;
/// USDC per day of list runtime
pub const DEFAULT_DAILY_LIST_COST: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Super admin (app creator) fid
    pub app_creator_fid: String,
    pub nft_contract_address: String,
    pub token_contract_address: String,
    pub treasury_wallet: String,
    pub fee_percentage: u8,
    pub max_reward_amount: u64,
    pub allowed_tokens: Vec<String>,
    pub daily_list_cost: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            app_creator_fid: String::new(),
            nft_contract_address: String::new(),
            token_contract_address: String::new(),
            treasury_wallet: String::new(),
            fee_percentage: DEFAULT_FEE_PERCENTAGE,
            max_reward_amount: DEFAULT_MAX_REWARD_AMOUNT,
            allowed_tokens: ["DEGEN", "BPLUS", "USDC", "ETH"].iter().map(|s| s.to_string()).collect(),
            daily_list_cost: DEFAULT_DAILY_LIST_COST,
        }
    }
}

/// Partial admin update; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfigUpdate {
    pub nft_contract_address: Option<String>,
    pub token_contract_address: Option<String>,
    pub treasury_wallet: Option<String>,
    pub fee_percentage: Option<u8>,
    pub max_reward_amount: Option<u64>,
    pub allowed_tokens: Option<Vec<String>>,
    pub daily_list_cost: Option<u64>,
}

/// Price of activating a list for a number of days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationQuote {
    pub days: u32,
    /// Whole USDC
    pub total_cost: u64,
    /// Platform share of `total_cost`
    pub platform_fee: u64,
}

/// `0x` followed by 40 hex digits
pub fn is_valid_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn check_optional_address(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || is_valid_address(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        })
    }
}

impl PlatformConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_optional_address("nft_contract_address", &self.nft_contract_address)?;
        check_optional_address("token_contract_address", &self.token_contract_address)?;
        check_optional_address("treasury_wallet", &self.treasury_wallet)?;
        if self.fee_percentage > 100 {
            return Err(ValidationError::InvalidFeePercentage(self.fee_percentage));
        }
        Ok(())
    }

    /// Returns the merged configuration; `self` is untouched when validation fails.
    pub fn apply(&self, update: PlatformConfigUpdate) -> Result<PlatformConfig, ValidationError> {
        let mut next = self.clone();
        if let Some(v) = update.nft_contract_address {
            next.nft_contract_address = v;
        }
        if let Some(v) = update.token_contract_address {
            next.token_contract_address = v;
        }
        if let Some(v) = update.treasury_wallet {
            next.treasury_wallet = v;
        }
        if let Some(v) = update.fee_percentage {
            next.fee_percentage = v;
        }
        if let Some(v) = update.max_reward_amount {
            next.max_reward_amount = v;
        }
        if let Some(v) = update.allowed_tokens {
            next.allowed_tokens = v.into_iter().map(|t| t.trim().to_uppercase()).collect();
        }
        if let Some(v) = update.daily_list_cost {
            next.daily_list_cost = v;
        }
        next.validate()?;
        Ok(next)
    }

    pub fn activation_quote(&self, days: u32) -> Result<ActivationQuote, ValidationError> {
        if days < 1 {
            return Err(ValidationError::InvalidDuration(days));
        }
        let overflow = ValidationError::CostOverflow {
            days,
            daily_cost: self.daily_list_cost,
        };
        let total_cost = u64::from(days)
            .checked_mul(self.daily_list_cost)
            .ok_or_else(|| overflow.clone())?;
        let platform_fee = total_cost
            .checked_mul(u64::from(self.fee_percentage))
            .ok_or(overflow)?
            / 100;
        Ok(ActivationQuote {
            days,
            total_cost,
            platform_fee,
        })
    }

    pub fn is_token_allowed(&self, symbol: &str) -> bool {
        self.allowed_tokens.iter().any(|t| t.eq_ignore_ascii_case(symbol))
    }

    pub fn check_rewards(&self, rewards: &[RewardConfig]) -> Result<(), ValidationError> {
        for reward in rewards {
            if let RewardKind::Token { amount, symbol } = &reward.kind {
                if !self.is_token_allowed(symbol) {
                    return Err(ValidationError::TokenNotAllowed(symbol.clone()));
                }
                if *amount > self.max_reward_amount {
                    return Err(ValidationError::RewardAmountTooLarge {
                        amount: *amount,
                        max: self.max_reward_amount,
                    });
                }
            }
        }
        Ok(())
    }

    /// Platform rules a new list must satisfy on top of the store's own validation
    pub fn check_new_list(&self, spec: &NewList) -> Result<(), ValidationError> {
        if !is_valid_address(&spec.creator_wallet) {
            return Err(ValidationError::InvalidAddress {
                field: "creator_wallet",
                value: spec.creator_wallet.clone(),
            });
        }
        self.check_rewards(&spec.rewards)?;

        let quote = self.activation_quote(spec.duration_days)?;
        match &spec.payment {
            None => Err(ValidationError::MissingPayment),
            Some(p) if p.amount < quote.total_cost => Err(ValidationError::InsufficientPayment {
                paid: p.amount,
                required: quote.total_cost,
            }),
            Some(_) => Ok(()),
        }
    }
}
