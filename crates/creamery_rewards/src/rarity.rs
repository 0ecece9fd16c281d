//! # Rarity Table
//!
//! Five ordered roll thresholds partition the roll space `[0, max)` into
//! half-open tier bands:
//!
//! ```text
//! 0 ──── common ──── uncommon ──── rare ──── epic ──────────── max
//! │ Common │ Uncommon │   Rare   │   Epic   │     Legendary      │
//! ```
//!
//! A roll equal to a threshold belongs to the *next* tier. Anything at or above
//! `epic` is Legendary, so the Legendary band is `[epic, max)`. The
//! `legendary` threshold takes part in validation only: it must sit above
//! `epic` and must not exceed `max`.
//!
//! Tables are only ever built through [`RarityTable::from_rolls`], so a live
//! table always satisfies
//! `common < uncommon < rare < epic < legendary <= max`.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{RewardError, RewardResult};

/// Rarity tier of a reward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RarityTier {
    /// Common rewards (gray).
    Common = 0,
    /// Uncommon rewards (green).
    Uncommon = 1,
    /// Rare rewards (blue).
    Rare = 2,
    /// Epic rewards (purple).
    Epic = 3,
    /// Legendary rewards (orange) - always the grand prize.
    Legendary = 4,
}

impl RarityTier {
    /// All tiers, lowest first.
    pub const ALL: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
    ];

    /// Index of this tier (0 = Common).
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
            0 => Some(Self::Common),
            1 => Some(Self::Uncommon),
            2 => Some(Self::Rare),
            3 => Some(Self::Epic),
            4 => Some(Self::Legendary),
            _ => None,
        }
    }
}

/// Raw, unvalidated roll thresholds as supplied by an operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityRolls {
    /// Rolls below this are Common.
    pub common: u64,
    /// Rolls below this (and at/above `common`) are Uncommon.
    pub uncommon: u64,
    /// Rolls below this are Rare.
    pub rare: u64,
    /// Rolls below this are Epic.
    pub epic: u64,
    /// Upper rarity threshold; must not exceed `max`.
    pub legendary: u64,
    /// Size of the roll space; rolls are reduced into `[0, max)`.
    pub max: u64,
}

impl RarityRolls {
    /// Creates a roll set from the six thresholds, lowest first.
    #[must_use]
    pub const fn new(common: u64, uncommon: u64, rare: u64, epic: u64, legendary: u64, max: u64) -> Self {
        Self {
            common,
            uncommon,
            rare,
            epic,
            legendary,
            max,
        }
    }
}

/// Validated rarity thresholds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RarityTable {
    rolls: RarityRolls,
}

impl RarityTable {
    /// The degenerate all-zero table every instance starts with.
    #[must_use]
    pub const fn unconfigured() -> Self {
        Self {
            rolls: RarityRolls::new(0, 0, 0, 0, 0, 0),
        }
    }

    /// Validates `rolls` and builds a table.
    ///
    /// Checks run in order and the first violated pair is reported.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::InvalidConfiguration`] naming the first violated pair.
    pub fn from_rolls(rolls: RarityRolls) -> RewardResult<Self> {
        if rolls.common >= rolls.uncommon {
            return Err(RewardError::invalid("Common must be less rare than uncommon"));
        }
        if rolls.uncommon >= rolls.rare {
            return Err(RewardError::invalid("Uncommon must be less rare than rare"));
        }
        if rolls.rare >= rolls.epic {
            return Err(RewardError::invalid("Rare must be less rare than epic"));
        }
        if rolls.epic >= rolls.legendary {
            return Err(RewardError::invalid("Epic must be less rare than legendary"));
        }
        if rolls.legendary > rolls.max {
            return Err(RewardError::invalid(
                "Legendary rarity level must be less than or equal to the max rarity roll",
            ));
        }
        Ok(Self { rolls })
    }

    /// Returns the thresholds.
    #[inline]
    #[must_use]
    pub const fn rolls(&self) -> RarityRolls {
        self.rolls
    }

    /// Size of the roll space.
    #[inline]
    #[must_use]
    pub const fn max_roll(&self) -> u64 {
        self.rolls.max
    }

    /// False for the initial all-zero table.
    #[inline]
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.rolls.max > 0
    }

    /// Maps a roll to its tier. Boundaries belong to the next tier.
    #[inline]
    #[must_use]
    pub const fn tier_for(&self, roll: u64) -> RarityTier {
        if roll < self.rolls.common {
            RarityTier::Common
        } else if roll < self.rolls.uncommon {
            RarityTier::Uncommon
        } else if roll < self.rolls.rare {
            RarityTier::Rare
        } else if roll < self.rolls.epic {
            RarityTier::Epic
        } else {
            RarityTier::Legendary
        }
    }

    /// The rolls inside `[0, max)` that land on `tier`.
    #[must_use]
    pub fn band(&self, tier: RarityTier) -> Range<u64> {
        let r = &self.rolls;
        let (start, end) = match tier {
            RarityTier::Common => (0, r.common),
            RarityTier::Uncommon => (r.common, r.uncommon),
            RarityTier::Rare => (r.uncommon, r.rare),
            RarityTier::Epic => (r.rare, r.epic),
            RarityTier::Legendary => (r.epic, r.max),
        };
        start.min(r.max)..end.min(r.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> RarityTable {
        RarityTable::from_rolls(RarityRolls::new(50, 75, 85, 92, 100, 100)).unwrap()
    }

    #[test]
    fn test_valid_table_keeps_all_fields() {
        let table = standard();
        assert_eq!(table.rolls(), RarityRolls::new(50, 75, 85, 92, 100, 100));
        assert_eq!(table.max_roll(), 100);
        assert!(table.is_configured());
    }

    #[test]
    fn test_each_violation_reports_its_own_pair() {
        let cases = [
            (RarityRolls::new(50, 49, 85, 92, 100, 100), "Common must be less rare than uncommon"),
            (RarityRolls::new(50, 75, 74, 92, 100, 100), "Uncommon must be less rare than rare"),
            (RarityRolls::new(50, 75, 85, 84, 100, 100), "Rare must be less rare than epic"),
            (RarityRolls::new(50, 75, 85, 92, 91, 100), "Epic must be less rare than legendary"),
            (
                RarityRolls::new(50, 75, 85, 92, 100, 99),
                "Legendary rarity level must be less than or equal to the max rarity roll",
            ),
        ];

        for (rolls, message) in cases {
            assert_eq!(
                RarityTable::from_rolls(rolls),
                Err(RewardError::InvalidConfiguration(message.to_string()))
            );
        }
    }

    #[test]
    fn test_first_violation_wins() {
        // Both the common/uncommon and legendary/max pairs are broken.
        let err = RarityTable::from_rolls(RarityRolls::new(80, 75, 85, 92, 100, 10)).unwrap_err();
        assert_eq!(err, RewardError::invalid("Common must be less rare than uncommon"));
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let err = RarityTable::from_rolls(RarityRolls::new(50, 50, 85, 92, 100, 100)).unwrap_err();
        assert_eq!(err, RewardError::invalid("Common must be less rare than uncommon"));
    }

    #[test]
    fn test_boundaries_belong_to_next_tier() {
        let table = standard();
        assert_eq!(table.tier_for(0), RarityTier::Common);
        assert_eq!(table.tier_for(49), RarityTier::Common);
        assert_eq!(table.tier_for(50), RarityTier::Uncommon);
        assert_eq!(table.tier_for(75), RarityTier::Rare);
        assert_eq!(table.tier_for(85), RarityTier::Epic);
        assert_eq!(table.tier_for(92), RarityTier::Legendary);
        assert_eq!(table.tier_for(100), RarityTier::Legendary);
        assert_eq!(table.tier_for(u64::MAX), RarityTier::Legendary);
    }

    #[test]
    fn test_bands_cover_roll_space() {
        let table = standard();
        let total: u64 = RarityTier::ALL
            .iter()
            .map(|&tier| {
                let band = table.band(tier);
                band.end - band.start
            })
            .sum();
        assert_eq!(total, table.max_roll());

        for tier in RarityTier::ALL {
            for roll in table.band(tier) {
                assert_eq!(table.tier_for(roll), tier);
            }
        }
    }

    #[test]
    fn test_unconfigured_table() {
        let table = RarityTable::unconfigured();
        assert!(!table.is_configured());
        assert_eq!(table, RarityTable::default());
    }

    #[test]
    fn test_tier_order_and_index() {
        assert!(RarityTier::Common < RarityTier::Uncommon);
        assert!(RarityTier::Epic < RarityTier::Legendary);
        for (i, tier) in RarityTier::ALL.iter().enumerate() {
            assert_eq!(tier.index(), i);
            assert_eq!(RarityTier::from_u8(u8::try_from(i).unwrap()), Some(*tier));
        }
        assert_eq!(RarityTier::from_u8(5), None);
    }
}
