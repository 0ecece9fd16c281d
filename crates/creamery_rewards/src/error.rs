//! # Reward Error Types
//!
//! All errors that can occur while configuring rewards or processing a claim.
//!
//! Every error is surfaced synchronously to the immediate caller. Nothing is
//! retried internally and every failure path leaves persisted state exactly as
//! it was before the call.

use thiserror::Error;

use crate::catalog::RewardType;
use crate::collaborators::{AccountId, Timestamp};
use crate::rarity::RarityTier;

/// Errors that can occur in the reward engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    /// Setter input violates an ordering or non-empty invariant.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Caller lacks the privileged role.
    #[error("unauthorized: account {account} is missing the admin role")]
    Unauthorized {
        /// The account that attempted the privileged operation.
        account: AccountId,
    },

    /// The account already claimed inside the current cooldown window.
    #[error("can claim once a day: account {account} may claim again at {retry_at}")]
    ClaimTooSoon {
        /// The claiming account.
        account: AccountId,
        /// Earliest timestamp at which the next claim succeeds.
        retry_at: Timestamp,
    },

    /// The resolver needed a catalog entry that was never configured.
    #[error("no reward configured for {reward_type:?} / {tier:?}")]
    UnconfiguredReward {
        /// Reward type that was rolled.
        reward_type: RewardType,
        /// Rarity tier that was rolled.
        tier: RarityTier,
    },

    /// The downstream mint/grant collaborator rejected the payout.
    #[error("payout failed: {reason}")]
    PayoutFailed {
        /// Reason reported by the collaborator.
        reason: String,
    },

    /// Journal I/O failure or on-disk corruption.
    #[error("journal error: {0}")]
    Journal(String),

    /// Arithmetic overflow in an amount calculation.
    #[error("arithmetic overflow in reward calculation")]
    ArithmeticOverflow,
}

impl RewardError {
    /// Shorthand for an [`RewardError::InvalidConfiguration`] with a static message.
    #[must_use]
    pub fn invalid(message: &str) -> Self {
        Self::InvalidConfiguration(message.to_string())
    }
}

/// Result type for reward operations.
pub type RewardResult<T> = Result<T, RewardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_too_soon_mentions_daily_limit() {
        let err = RewardError::ClaimTooSoon {
            account: 7,
            retry_at: 86_400,
        };
        assert!(err.to_string().contains("can claim once a day"));
    }

    #[test]
    fn test_invalid_configuration_keeps_message() {
        let err = RewardError::invalid("empty ids");
        assert_eq!(err, RewardError::InvalidConfiguration("empty ids".to_string()));
        assert_eq!(err.to_string(), "invalid configuration: empty ids");
    }
}
