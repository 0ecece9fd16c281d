//! # Reward Resolver
//!
//! Pure mapping from `(roll, reward type)` to a concrete payout:
//!
//! 1. The rarity table turns the roll into a tier.
//! 2. Legendary short-circuits to the grand prize: one unit of a reserved item
//!    id, reported as an item reward whatever type was rolled. The catalog is
//!    not consulted.
//! 3. Otherwise the catalog slot for `(type, tier)` must exist, or the claim
//!    fails closed.
//! 4. Quantity and item pick come from separate expansions of the roll.
//!
//! No side effects. The same roll against the same configuration always gives
//! the same answer.

use crate::amount::TokenAmount;
use crate::catalog::{ItemId, RewardType};
use crate::codec;
use crate::config::RewardConfig;
use crate::entropy;
use crate::error::{RewardError, RewardResult};
use crate::rarity::RarityTier;

/// Item id of the Legendary grand prize unless configured otherwise.
pub const DEFAULT_GRAND_PRIZE_ITEM: ItemId = 1;

/// A resolved payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payout {
    /// Mint `amount` of currency.
    Currency {
        /// Amount in token base units.
        amount: TokenAmount,
    },
    /// Grant `amount` units of `item_id`.
    Item {
        /// Item granted.
        item_id: ItemId,
        /// Units granted.
        amount: u128,
    },
    /// The Legendary grand prize: exactly one unit of `item_id`.
    GrandPrize {
        /// The reserved grand-prize item.
        item_id: ItemId,
    },
}

impl Payout {
    /// Event form of this payout.
    #[must_use]
    pub const fn encoded(&self) -> EncodedPayout {
        match *self {
            Self::GrandPrize { .. } => EncodedPayout::Empty,
            Self::Currency { amount } => EncodedPayout::Amount(amount.base_units()),
            Self::Item { item_id, amount } => EncodedPayout::Item { item_id, amount },
        }
    }

    /// Canonical bytes of [`Payout::encoded`].
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        self.encoded().encode()
    }
}

/// Payout payload as carried by claim events.
///
/// The grand prize carries nothing: its item and quantity are fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodedPayout {
    /// Legendary grand prize.
    Empty,
    /// Currency amount in base units.
    Amount(u128),
    /// Item grant.
    Item {
        /// Item granted.
        item_id: ItemId,
        /// Units granted.
        amount: u128,
    },
}

impl EncodedPayout {
    /// Canonical byte form:
    ///
    /// - `Empty`: no bytes
    /// - `Amount`: `[amount]`
    /// - `Item`: `[item_id][amount]`
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match *self {
            Self::Empty => {}
            Self::Amount(amount) => codec::push_word(&mut buf, amount),
            Self::Item { item_id, amount } => {
                codec::push_word(&mut buf, u128::from(item_id));
                codec::push_word(&mut buf, amount);
            }
        }
        buf
    }
}

/// Result of resolving one roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Effective reward type (always `Item` for Legendary).
    pub reward_type: RewardType,
    /// Tier the roll landed on.
    pub tier: RarityTier,
    /// What to pay out.
    pub payout: Payout,
}

/// Resolves rolls against one configuration snapshot.
#[derive(Clone, Copy, Debug)]
pub struct RewardResolver<'a> {
    config: &'a RewardConfig,
    grand_prize_item: ItemId,
}

impl<'a> RewardResolver<'a> {
    /// Creates a resolver over `config`.
    #[must_use]
    pub const fn new(config: &'a RewardConfig, grand_prize_item: ItemId) -> Self {
        Self {
            config,
            grand_prize_item,
        }
    }

    /// Resolves `roll` for the already-chosen `reward_type`.
    ///
    /// `roll` is expected in `[0, max_roll)`; anything at or above the epic
    /// threshold is Legendary.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::UnconfiguredReward`] if the catalog has no entry
    /// for a non-Legendary `(reward_type, tier)`.
    pub fn resolve(&self, roll: u64, reward_type: RewardType) -> RewardResult<Resolution> {
        let tier = self.config.rarity.tier_for(roll);

        if tier == RarityTier::Legendary {
            return Ok(Resolution {
                reward_type: RewardType::Item,
                tier,
                payout: Payout::GrandPrize {
                    item_id: self.grand_prize_item,
                },
            });
        }

        let spec = self
            .config
            .catalog
            .get(reward_type, tier)
            .ok_or(RewardError::UnconfiguredReward { reward_type, tier })?;

        let amount = entropy::amount_in(roll, spec.min(), spec.max());
        let payout = match reward_type {
            RewardType::Currency => Payout::Currency {
                amount: TokenAmount::from_base_units(amount),
            },
            RewardType::Item => {
                let ids = spec.item_ids();
                Payout::Item {
                    item_id: ids[entropy::pick_index(roll, ids.len())],
                    amount,
                }
            }
        };

        Ok(Resolution {
            reward_type,
            tier,
            payout,
        })
    }
}
