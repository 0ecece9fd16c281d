//! # Reward Catalog
//!
//! One [`RewardSpec`] per (reward type, rarity tier) pair: 2 x 5 = 10 slots.
//!
//! Slots start empty. A claim that resolves to an empty slot fails closed with
//! [`RewardError::UnconfiguredReward`]; there is no fallback reward. Writing a
//! slot replaces whatever was there before, no history is kept.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{RewardError, RewardResult};
use crate::rarity::RarityTier;

/// Unique identifier for an item type.
pub type ItemId = u32;

/// What a claim pays out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RewardType {
    /// Fungible currency, minted through the currency collaborator.
    Currency = 0,
    /// A quantity of one item id, granted through the item collaborator.
    Item = 1,
}

impl RewardType {
    /// Both reward types.
    pub const ALL: [Self; 2] = [Self::Currency, Self::Item];

    /// Index of this type (0 = Currency).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Converts from u8.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Currency),
            1 => Some(Self::Item),
            _ => None,
        }
    }
}

/// Payout bounds for one (type, tier) slot.
///
/// `min..=max` is inclusive. `item_ids` is the ordered candidate list for item
/// rewards; currency rewards carry it too but never read it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardSpec {
    min: u128,
    max: u128,
    item_ids: Vec<ItemId>,
}

impl RewardSpec {
    /// Validates and builds a spec.
    ///
    /// The id list must be non-empty for every reward type, currency
    /// included, so callers configuring currency pass a placeholder id.
    ///
    /// # Errors
    ///
    /// - `"invalid min max value"` if `min >= max`
    /// - `"empty ids"` if `item_ids` is empty
    pub fn new(min: u128, max: u128, item_ids: Vec<ItemId>) -> RewardResult<Self> {
        if min >= max {
            return Err(RewardError::invalid("invalid min max value"));
        }
        if item_ids.is_empty() {
            return Err(RewardError::invalid("empty ids"));
        }
        Ok(Self { min, max, item_ids })
    }

    /// Decodes and validates a word-encoded `(min, max, ids[])` spec.
    ///
    /// # Errors
    ///
    /// Decoding errors first, then the same validation as [`RewardSpec::new`].
    pub fn decode(data: &[u8]) -> RewardResult<Self> {
        let (min, max, ids) = codec::decode_reward_spec(data)?;
        Self::new(min, max, ids)
    }

    /// Word-encodes this spec.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        codec::encode_reward_spec(self.min, self.max, &self.item_ids)
    }

    /// Inclusive lower bound.
    #[inline]
    #[must_use]
    pub const fn min(&self) -> u128 {
        self.min
    }

    /// Inclusive upper bound.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> u128 {
        self.max
    }

    /// Candidate item ids, in configured order.
    #[inline]
    #[must_use]
    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }
}

/// The (type, tier) -> spec mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardCatalog {
    slots: [[Option<RewardSpec>; 5]; 2],
}

impl RewardCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the spec for a slot, if configured.
    #[must_use]
    pub fn get(&self, reward_type: RewardType, tier: RarityTier) -> Option<&RewardSpec> {
        self.slots[reward_type.index()][tier.index()].as_ref()
    }

    /// Replaces the spec for a slot.
    pub fn set(&mut self, reward_type: RewardType, tier: RarityTier, spec: RewardSpec) {
        self.slots[reward_type.index()][tier.index()] = Some(spec);
    }

    /// Number of configured slots (0..=10).
    #[must_use]
    pub fn configured_count(&self) -> usize {
        self.slots.iter().flatten().filter(|slot| slot.is_some()).count()
    }

    /// Iterates over every configured slot.
    pub fn iter(&self) -> impl Iterator<Item = (RewardType, RarityTier, &RewardSpec)> {
        RewardType::ALL.into_iter().flat_map(move |reward_type| {
            RarityTier::ALL.into_iter().filter_map(move |tier| {
                self.get(reward_type, tier)
                    .map(|spec| (reward_type, tier, spec))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_must_be_below_max() {
        assert_eq!(
            RewardSpec::new(10, 10, vec![1]),
            Err(RewardError::invalid("invalid min max value"))
        );
        assert_eq!(
            RewardSpec::new(20, 10, vec![1]),
            Err(RewardError::invalid("invalid min max value"))
        );
    }

    #[test]
    fn test_empty_ids_rejected() {
        assert_eq!(
            RewardSpec::new(10, 20, Vec::new()),
            Err(RewardError::invalid("empty ids"))
        );
    }

    #[test]
    fn test_min_max_checked_before_ids() {
        assert_eq!(
            RewardSpec::new(10, 10, Vec::new()),
            Err(RewardError::invalid("invalid min max value"))
        );
    }

    #[test]
    fn test_decode_validates() {
        let spec = RewardSpec::decode(&codec::encode_reward_spec(10, 20, &[1, 2, 3, 4, 5])).unwrap();
        assert_eq!(spec.min(), 10);
        assert_eq!(spec.max(), 20);
        assert_eq!(spec.item_ids(), &[1, 2, 3, 4, 5]);
        assert_eq!(RewardSpec::decode(&spec.encode()).unwrap(), spec);

        assert_eq!(
            RewardSpec::decode(&codec::encode_reward_spec(10, 10, &[1])),
            Err(RewardError::invalid("invalid min max value"))
        );
        assert_eq!(
            RewardSpec::decode(&codec::encode_reward_spec(10, 20, &[])),
            Err(RewardError::invalid("empty ids"))
        );
    }

    #[test]
    fn test_catalog_starts_empty() {
        let catalog = RewardCatalog::new();
        assert_eq!(catalog.configured_count(), 0);
        for reward_type in RewardType::ALL {
            for tier in RarityTier::ALL {
                assert!(catalog.get(reward_type, tier).is_none());
            }
        }
    }

    #[test]
    fn test_set_replaces_existing_slot() {
        let mut catalog = RewardCatalog::new();
        catalog.set(RewardType::Item, RarityTier::Rare, RewardSpec::new(1, 2, vec![7]).unwrap());
        catalog.set(RewardType::Item, RarityTier::Rare, RewardSpec::new(4, 8, vec![3, 4]).unwrap());

        let spec = catalog.get(RewardType::Item, RarityTier::Rare).unwrap();
        assert_eq!(spec.min(), 4);
        assert_eq!(spec.item_ids(), &[3, 4]);
        assert_eq!(catalog.configured_count(), 1);
        assert!(catalog.get(RewardType::Currency, RarityTier::Rare).is_none());
    }

    #[test]
    fn test_iter_visits_configured_slots_in_order() {
        let mut catalog = RewardCatalog::new();
        catalog.set(RewardType::Item, RarityTier::Common, RewardSpec::new(1, 2, vec![1]).unwrap());
        catalog.set(RewardType::Currency, RarityTier::Epic, RewardSpec::new(1, 2, vec![0]).unwrap());

        let slots: Vec<_> = catalog.iter().map(|(t, r, _)| (t, r)).collect();
        assert_eq!(
            slots,
            vec![
                (RewardType::Currency, RarityTier::Epic),
                (RewardType::Item, RarityTier::Common),
            ]
        );
    }

    #[test]
    fn test_reward_type_from_u8() {
        assert_eq!(RewardType::from_u8(0), Some(RewardType::Currency));
        assert_eq!(RewardType::from_u8(1), Some(RewardType::Item));
        assert_eq!(RewardType::from_u8(2), None);
    }
}
