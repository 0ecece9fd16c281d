//! # CREAMERY Rewards
//!
//! The daily claim engine: once per cooldown window an account claims, the
//! caller's seed picks a reward type and a rarity tier, and the configured
//! catalog turns that into a currency mint or an item grant.
//!
//! ## Design Principles
//!
//! 1. **Zero floating point** - currency is 18-decimal fixed point in a u128
//! 2. **Deterministic** - the outcome is a pure function of seed and config
//! 3. **Fails closed** - an unconfigured catalog slot fails the claim, there
//!    is no fallback reward
//! 4. **Transactional claims** - ledger update and payout commit together or
//!    not at all
//! 5. **External configuration** - tables and rewards load from TOML
//!
//! ## Thread Safety
//!
//! [`ClaimOrchestrator`] is `Send + Sync`. Claims are serialized on the claim
//! ledger; configuration changes are copy-on-write so a resolving claim sees
//! either the whole old configuration or the whole new one.
//!
//! ## Example
//!
//! ```rust,ignore
//! use creamery_rewards::{ClaimOrchestrator, RarityRolls, RarityTier, RewardType};
//!
//! let orchestrator = ClaimOrchestrator::new(collaborators);
//! orchestrator.set_rarity_rolls(admin, RarityRolls::new(50, 75, 85, 92, 100, 100))?;
//! orchestrator.set_reward(admin, RewardType::Currency, RarityTier::Common, min, max, vec![0])?;
//!
//! let result = orchestrator.claim(player, seed)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod amount;
pub mod catalog;
pub mod codec;
pub mod collaborators;
pub mod config;
pub mod cooldown;
pub mod entropy;
pub mod error;
pub mod journal;
pub mod orchestrator;
pub mod rarity;
pub mod resolver;
pub mod vault;

pub use amount::{TokenAmount, TOKEN_DECIMALS};
pub use catalog::{ItemId, RewardCatalog, RewardSpec, RewardType};
pub use collaborators::{
    AccountId, Authorizer, Clock, CurrencyIssuer, ItemIssuer, ManualClock, PayoutError,
    SystemClock, Timestamp,
};
pub use config::{ConfigDocument, RewardConfig};
pub use cooldown::{ClaimLedger, CLAIM_COOLDOWN_SECS};
pub use error::{RewardError, RewardResult};
pub use journal::{ClaimJournal, JournalOp};
pub use orchestrator::{
    ClaimEvent, ClaimOrchestrator, ClaimResult, Collaborators, OrchestratorSettings,
    DEFAULT_EVENT_CAPACITY,
};
pub use rarity::{RarityRolls, RarityTable, RarityTier};
pub use resolver::{EncodedPayout, Payout, Resolution, RewardResolver, DEFAULT_GRAND_PRIZE_ITEM};
pub use vault::{CurrencyVault, ItemVault, Role, RoleRegistry};
