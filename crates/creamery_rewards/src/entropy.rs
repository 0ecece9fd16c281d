//! # Entropy Derivation
//!
//! The caller supplies one 64-bit seed per claim. Four values are derived from
//! it, each through SipHash-2-4 keyed with its own domain key:
//!
//! | purpose          | input       | output                               |
//! |------------------|-------------|--------------------------------------|
//! | reward type      | claim seed  | low bit: 0 = Currency, 1 = Item      |
//! | rarity roll      | claim seed  | `h % max_roll`                       |
//! | payout magnitude | rarity roll | `min + h % (max - min + 1)`          |
//! | item selection   | rarity roll | `h % ids.len()`                      |
//!
//! Separate keys keep the derivations independent: knowing the reward type
//! says nothing about the tier, and the tier says nothing about the amount.
//!
//! Nothing here adds unpredictability. A caller who controls the seed controls
//! the outcome; seed quality is the caller's responsibility.

use std::hash::Hasher;

use siphasher::sip128::{Hasher128, SipHasher24};

use crate::catalog::RewardType;

/// Purpose of a derived value. Each purpose hashes with its own key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Domain {
    /// Currency/item coin flip.
    RewardType,
    /// Tier roll in `[0, max_roll)`.
    RarityRoll,
    /// Quantity inside a reward's `min..=max`.
    Amount,
    /// Index into a reward's candidate ids.
    ItemPick,
}

impl Domain {
    /// Fixed SipHash key pair for this domain.
    const fn keys(self) -> (u64, u64) {
        match self {
            Self::RewardType => (0x6372_6d79_2d74_7970, 0x0000_0000_0000_0001),
            Self::RarityRoll => (0x6372_6d79_2d74_6965, 0x0000_0000_0000_0002),
            Self::Amount => (0x6372_6d79_2d61_6d74, 0x0000_0000_0000_0003),
            Self::ItemPick => (0x6372_6d79_2d69_7465, 0x0000_0000_0000_0004),
        }
    }
}

/// Expands `input` into 64 bits for `domain`.
#[inline]
#[must_use]
pub fn expand(input: u64, domain: Domain) -> u64 {
    let (k0, k1) = domain.keys();
    let mut hasher = SipHasher24::new_with_keys(k0, k1);
    hasher.write_u64(input);

    // Fold the 128-bit result to 64 bits
    let result = hasher.finish128();
    result.h1 ^ result.h2
}

/// Derives the reward type from a claim seed.
#[inline]
#[must_use]
pub fn reward_type(seed: u64) -> RewardType {
    if expand(seed, Domain::RewardType) & 1 == 0 {
        RewardType::Currency
    } else {
        RewardType::Item
    }
}

/// Reduces a claim seed into `[0, max_roll)`.
///
/// `max_roll` of zero maps everything to zero; callers reject unconfigured
/// tables before rolling.
#[inline]
#[must_use]
pub fn rarity_roll(seed: u64, max_roll: u64) -> u64 {
    if max_roll == 0 {
        return 0;
    }
    expand(seed, Domain::RarityRoll) % max_roll
}

/// Derives a quantity in `min..=max` from a rarity roll.
///
/// Requires `min <= max`.
#[inline]
#[must_use]
pub fn amount_in(roll: u64, min: u128, max: u128) -> u128 {
    let draw = u128::from(expand(roll, Domain::Amount));
    match (max - min).checked_add(1) {
        Some(span) => min + draw % span,
        // The range covers all of u128
        None => draw,
    }
}

/// Derives an index into a list of `len` candidates. Requires `len > 0`.
#[inline]
#[must_use]
pub fn pick_index(roll: u64, len: usize) -> usize {
    let len = len as u64;
    // The remainder is below `len`, which came from a usize
    (expand(roll, Domain::ItemPick) % len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_is_deterministic() {
        assert_eq!(expand(100, Domain::Amount), expand(100, Domain::Amount));
    }

    #[test]
    fn test_domains_are_independent() {
        let mut same = 0;
        for seed in 0..1000u64 {
            if expand(seed, Domain::RewardType) == expand(seed, Domain::RarityRoll) {
                same += 1;
            }
        }
        assert_eq!(same, 0);
    }

    #[test]
    fn test_rarity_roll_in_range() {
        for seed in 0..10_000u64 {
            assert!(rarity_roll(seed, 100) < 100);
        }
        assert_eq!(rarity_roll(42, 0), 0);
    }

    #[test]
    fn test_reward_type_hits_both_sides() {
        let items = (0..1000u64)
            .filter(|&seed| reward_type(seed) == RewardType::Item)
            .count();
        assert!(items > 400 && items < 600, "coin flip skewed: {items}/1000 items");
    }

    #[test]
    fn test_amount_within_inclusive_bounds() {
        let mut saw_min = false;
        let mut saw_max = false;
        for roll in 0..1000u64 {
            let amount = amount_in(roll, 1, 2);
            assert!((1..=2).contains(&amount));
            saw_min |= amount == 1;
            saw_max |= amount == 2;
        }
        assert!(saw_min && saw_max, "both bounds must be reachable");
    }

    #[test]
    fn test_amount_full_range() {
        let amount = amount_in(7, 0, u128::MAX);
        assert_eq!(amount, u128::from(expand(7, Domain::Amount)));
    }

    #[test]
    fn test_pick_index_in_range() {
        for roll in 0..1000u64 {
            assert!(pick_index(roll, 3) < 3);
        }
        assert_eq!(pick_index(5, 1), 0);
    }
}
