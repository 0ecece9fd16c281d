//! # Reward Configuration
//!
//! [`RewardConfig`] is the one owned configuration object of a deployed
//! instance: the rarity table plus the reward catalog. It is only mutated
//! through [`RewardConfig::set_rarity_rolls`] and [`RewardConfig::set_reward`],
//! which validate before touching anything.
//!
//! ## TOML
//!
//! ```toml
//! grand_prize_item = 1
//!
//! [rarity]
//! common = 50
//! uncommon = 75
//! rare = 85
//! epic = 92
//! legendary = 100
//! max = 100
//!
//! [currency]
//! decimals = 18
//!
//! [[reward]]
//! type = "currency"
//! tier = "common"
//! min = "100"        # whole tokens, scaled by 10^decimals
//! max = "200"
//! ids = [0]
//!
//! [[reward]]
//! type = "item"
//! tier = "common"
//! min = 1            # raw item counts
//! max = 2
//! ids = [1, 2]
//! ```
//!
//! Every table and reward in a file goes through the same validated setters as
//! the privileged runtime path, so a file can never produce a configuration
//! the runtime path would have rejected.

use std::path::Path;

use serde::Deserialize;

use crate::amount::{parse_units, TOKEN_DECIMALS};
use crate::catalog::{ItemId, RewardCatalog, RewardSpec, RewardType};
use crate::error::{RewardError, RewardResult};
use crate::rarity::{RarityRolls, RarityTable, RarityTier};

/// Rarity table plus reward catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardConfig {
    /// Roll thresholds.
    pub rarity: RarityTable,
    /// Per (type, tier) payout specs.
    pub catalog: RewardCatalog,
}

impl RewardConfig {
    /// Creates the initial configuration: all-zero table, empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and replaces all six rarity thresholds at once.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::InvalidConfiguration`]; the table is unchanged.
    pub fn set_rarity_rolls(&mut self, rolls: RarityRolls) -> RewardResult<()> {
        self.rarity = RarityTable::from_rolls(rolls)?;
        Ok(())
    }

    /// Validates and replaces the spec for one (type, tier) slot.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::InvalidConfiguration`]; the catalog is unchanged.
    pub fn set_reward(
        &mut self,
        reward_type: RewardType,
        tier: RarityTier,
        min: u128,
        max: u128,
        item_ids: Vec<ItemId>,
    ) -> RewardResult<()> {
        let spec = RewardSpec::new(min, max, item_ids)?;
        self.catalog.set(reward_type, tier, spec);
        Ok(())
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::InvalidConfiguration`] for malformed TOML or any
    /// value the validated setters reject.
    pub fn from_toml_str(text: &str) -> RewardResult<ConfigDocument> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| RewardError::InvalidConfiguration(format!("malformed reward config: {e}")))?;
        file.into_document()
    }

    /// Loads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::InvalidConfiguration`] if the file cannot be read
    /// or does not validate.
    pub fn from_toml_file(path: impl AsRef<Path>) -> RewardResult<ConfigDocument> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RewardError::InvalidConfiguration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }
}

/// A parsed configuration file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigDocument {
    /// The validated configuration.
    pub config: RewardConfig,
    /// Grand-prize override, if the file sets one.
    pub grand_prize_item: Option<ItemId>,
}

// ============================================================================
// On-disk shape
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    grand_prize_item: Option<ItemId>,
    rarity: RarityRolls,
    #[serde(default)]
    currency: CurrencySection,
    #[serde(default, rename = "reward")]
    rewards: Vec<RewardEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CurrencySection {
    #[serde(default = "default_decimals")]
    decimals: u32,
}

impl Default for CurrencySection {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
        }
    }
}

const fn default_decimals() -> u32 {
    TOKEN_DECIMALS
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RewardEntry {
    #[serde(rename = "type")]
    reward_type: RewardType,
    tier: RarityTier,
    min: Quantity,
    max: Quantity,
    #[serde(default)]
    ids: Vec<ItemId>,
}

/// TOML integers stop at i64, so large amounts are written as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Integer(u64),
    Text(String),
}

impl Quantity {
    fn to_units(&self, decimals: u32) -> RewardResult<u128> {
        match self {
            Self::Integer(value) => parse_units(&value.to_string(), decimals),
            Self::Text(text) => parse_units(text, decimals),
        }
    }
}

impl ConfigFile {
    fn into_document(self) -> RewardResult<ConfigDocument> {
        let mut config = RewardConfig::new();
        config.set_rarity_rolls(self.rarity)?;

        for entry in self.rewards {
            let decimals = match entry.reward_type {
                RewardType::Currency => self.currency.decimals,
                RewardType::Item => 0,
            };
            let min = entry.min.to_units(decimals)?;
            let max = entry.max.to_units(decimals)?;
            config.set_reward(entry.reward_type, entry.tier, min, max, entry.ids)?;
        }

        Ok(ConfigDocument {
            config,
            grand_prize_item: self.grand_prize_item,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::TokenAmount;

    const SAMPLE: &str = r#"
grand_prize_item = 9

[rarity]
common = 50
uncommon = 75
rare = 85
epic = 92
legendary = 100
max = 100

[[reward]]
type = "currency"
tier = "common"
min = "100"
max = "200.5"
ids = [0]

[[reward]]
type = "item"
tier = "rare"
min = 4
max = 8
ids = [3, 4, 5]
"#;

    #[test]
    fn test_parse_sample() {
        let doc = RewardConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(doc.grand_prize_item, Some(9));
        assert_eq!(doc.config.rarity.rolls(), RarityRolls::new(50, 75, 85, 92, 100, 100));
        assert_eq!(doc.config.catalog.configured_count(), 2);

        let currency = doc.config.catalog.get(RewardType::Currency, RarityTier::Common).unwrap();
        assert_eq!(currency.min(), TokenAmount::from_whole(100).base_units());
        assert_eq!(
            currency.max(),
            TokenAmount::from_whole(200).base_units() + TokenAmount::ONE.base_units() / 2
        );

        let item = doc.config.catalog.get(RewardType::Item, RarityTier::Rare).unwrap();
        assert_eq!((item.min(), item.max()), (4, 8));
        assert_eq!(item.item_ids(), &[3, 4, 5]);
    }

    #[test]
    fn test_invalid_rolls_in_file_rejected() {
        let text = SAMPLE.replace("uncommon = 75", "uncommon = 40");
        assert_eq!(
            RewardConfig::from_toml_str(&text),
            Err(RewardError::invalid("Common must be less rare than uncommon"))
        );
    }

    #[test]
    fn test_empty_ids_in_file_rejected() {
        let text = SAMPLE.replace("ids = [0]", "ids = []");
        assert_eq!(
            RewardConfig::from_toml_str(&text),
            Err(RewardError::invalid("empty ids"))
        );
    }

    #[test]
    fn test_item_amounts_reject_fractions() {
        let text = SAMPLE.replace("min = 4", "min = \"4.5\"");
        assert!(matches!(
            RewardConfig::from_toml_str(&text),
            Err(RewardError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = RewardConfig::from_toml_str("rarity = ").unwrap_err();
        assert!(err.to_string().contains("malformed reward config"));
    }

    #[test]
    fn test_setters_leave_config_untouched_on_error() {
        let mut config = RewardConfig::new();
        config.set_rarity_rolls(RarityRolls::new(50, 75, 85, 92, 100, 100)).unwrap();
        let before = config.clone();

        assert!(config.set_rarity_rolls(RarityRolls::new(50, 75, 85, 92, 100, 99)).is_err());
        assert!(config
            .set_reward(RewardType::Item, RarityTier::Epic, 5, 5, vec![1])
            .is_err());
        assert_eq!(config, before);
    }
}
