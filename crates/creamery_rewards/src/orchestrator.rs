//! # Claim Orchestrator
//!
//! **One claim per account per day.**
//!
//! The single entry point for claims and for the privileged configuration
//! path. Everything else in the crate is a building block of this module.
//!
//! ## The Claim Path
//!
//! ```text
//! claim(account, seed)
//!     │
//!     ▼
//! ClaimLedger::can_claim ──no──> ClaimTooSoon
//!     │
//!     ▼
//! seed ──TYPE──> reward type        (config snapshot, never half-updated)
//! seed ──TIER──> roll ──> RewardResolver ──> UnconfiguredReward?
//!     │
//!     ▼
//! record claim ─> journal ClaimRecorded (committed) ─> mint / grant
//!     │                                                    │
//!     │                 failure: journal ClaimReverted, restore ledger
//!     ▼
//! ClaimEvent ──> event buffer
//! ```
//!
//! ## Thread Safety
//!
//! `ClaimOrchestrator` is `Send + Sync`. The ledger mutex is held for the
//! whole claim, so claims are serialized and no account can spend its daily
//! allowance twice. The configuration sits behind an `RwLock<Arc<_>>`: a claim
//! clones the `Arc` and resolves against that snapshot while setters swap in a
//! new one.
//!
//! Lock order is ledger, then configuration, then the journal.
//!
//! ## Durability
//!
//! A claim is committed to the journal before any payout goes out. A crash
//! between the two leaves the claim recorded and the account cooling down,
//! never an account that was paid and can claim again.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::{ItemId, RewardSpec, RewardType};
use crate::collaborators::{AccountId, Authorizer, Clock, CurrencyIssuer, ItemIssuer, Timestamp};
use crate::config::RewardConfig;
use crate::cooldown::{ClaimLedger, CLAIM_COOLDOWN_SECS};
use crate::entropy;
use crate::error::{RewardError, RewardResult};
use crate::journal::{ClaimJournal, JournalOp};
use crate::rarity::{RarityRolls, RarityTable, RarityTier};
use crate::resolver::{EncodedPayout, Payout, RewardResolver, DEFAULT_GRAND_PRIZE_ITEM};

// ============================================================================
// Public Types
// ============================================================================

/// The external systems a claim talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Gates configuration changes.
    pub authorizer: Arc<dyn Authorizer>,
    /// Mints currency payouts.
    pub currency: Arc<dyn CurrencyIssuer>,
    /// Grants item payouts.
    pub items: Arc<dyn ItemIssuer>,
    /// Supplies claim timestamps.
    pub clock: Arc<dyn Clock>,
}

/// Default bound on undrained claim events.
pub const DEFAULT_EVENT_CAPACITY: usize = 65_536;

/// Tunables fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Minimum seconds between two claims of one account.
    pub cooldown_secs: u64,
    /// Item id paid out (one unit) on Legendary.
    pub grand_prize_item: ItemId,
    /// Most claim events kept before the oldest are evicted.
    pub event_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: CLAIM_COOLDOWN_SECS,
            grand_prize_item: DEFAULT_GRAND_PRIZE_ITEM,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl OrchestratorSettings {
    /// Sets the cooldown.
    #[must_use]
    pub const fn with_cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    /// Sets the grand-prize item.
    #[must_use]
    pub const fn with_grand_prize_item(mut self, item_id: ItemId) -> Self {
        self.grand_prize_item = item_id;
        self
    }

    /// Sets the event buffer bound (at least one).
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }
}

/// Outcome of a successful claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimResult {
    /// Claiming account.
    pub account: AccountId,
    /// Effective reward type (Item for Legendary).
    pub reward_type: RewardType,
    /// Tier rolled.
    pub tier: RarityTier,
    /// What was paid out.
    pub payout: Payout,
    /// When the claim was recorded.
    pub claimed_at: Timestamp,
    /// Earliest time of the next claim.
    pub next_claim_at: Timestamp,
}

impl ClaimResult {
    /// Event form of the payout.
    #[must_use]
    pub const fn encoded_payout(&self) -> EncodedPayout {
        self.payout.encoded()
    }
}

/// Emitted after every committed claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimEvent {
    /// Claiming account.
    pub account: AccountId,
    /// Effective reward type.
    pub reward_type: RewardType,
    /// Tier rolled.
    pub tier: RarityTier,
    /// Encoded payout.
    pub payout: EncodedPayout,
}

// ============================================================================
// The Orchestrator
// ============================================================================

/// Claim entry point and owner of the reward configuration.
///
/// ## Usage
///
/// ```rust,ignore
/// let orchestrator = ClaimOrchestrator::open("data/rewards.crmj", collaborators, settings)?;
///
/// orchestrator.set_rarity_rolls(admin, RarityRolls::new(50, 75, 85, 92, 100, 100))?;
/// orchestrator.set_reward(admin, RewardType::Item, RarityTier::Common, 1, 2, vec![1, 2])?;
///
/// let result = orchestrator.claim(player, seed)?;
/// ```
pub struct ClaimOrchestrator {
    /// Current configuration snapshot.
    config: RwLock<Arc<RewardConfig>>,
    /// Last claim per account; held for the whole claim.
    ledger: Mutex<ClaimLedger>,
    /// Durable log, if any.
    journal: Option<ClaimJournal>,
    /// External systems.
    collaborators: Collaborators,
    /// Legendary payout item.
    grand_prize_item: ItemId,
    /// Events not yet drained, oldest first.
    event_buffer: Mutex<VecDeque<ClaimEvent>>,
    /// Bound on `event_buffer`.
    event_capacity: usize,
}

impl ClaimOrchestrator {
    /// Creates an in-memory orchestrator with default settings.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self::with_settings(collaborators, OrchestratorSettings::default())
    }

    /// Creates an in-memory orchestrator.
    ///
    /// Starts with the all-zero rarity table and an empty catalog.
    #[must_use]
    pub fn with_settings(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        Self::build(
            RewardConfig::new(),
            ClaimLedger::new(settings.cooldown_secs),
            None,
            collaborators,
            settings,
        )
    }

    /// Opens a journaled orchestrator, replaying everything committed so far.
    ///
    /// # Arguments
    ///
    /// * `path` - Journal file, created if missing
    /// * `collaborators` - External systems
    /// * `settings` - Cooldown and grand-prize item
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] if the journal cannot be opened or
    /// holds an operation that no longer validates.
    pub fn open(
        path: impl AsRef<Path>,
        collaborators: Collaborators,
        settings: OrchestratorSettings,
    ) -> RewardResult<Self> {
        let (journal, ops) = ClaimJournal::open(path)?;

        let mut config = RewardConfig::new();
        let mut ledger = ClaimLedger::new(settings.cooldown_secs);
        for op in &ops {
            replay(&mut config, &mut ledger, op)?;
        }

        info!(
            path = %journal.path().display(),
            operations = ops.len(),
            accounts = ledger.len(),
            rewards = config.catalog.configured_count(),
            "reward state restored"
        );

        Ok(Self::build(config, ledger, Some(journal), collaborators, settings))
    }

    fn build(
        config: RewardConfig,
        ledger: ClaimLedger,
        journal: Option<ClaimJournal>,
        collaborators: Collaborators,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            ledger: Mutex::new(ledger),
            journal,
            collaborators,
            grand_prize_item: settings.grand_prize_item,
            event_buffer: Mutex::new(VecDeque::with_capacity(64)),
            event_capacity: settings.event_capacity.max(1),
        }
    }

    // ------------------------------------------------------------------------
    // Privileged configuration path
    // ------------------------------------------------------------------------

    /// Replaces the rarity table.
    ///
    /// # Errors
    ///
    /// - [`RewardError::Unauthorized`] if `caller` lacks the privileged role
    /// - [`RewardError::InvalidConfiguration`] naming the first violated pair
    /// - [`RewardError::Journal`] if the change cannot be persisted
    ///
    /// The table is unchanged on any error.
    pub fn set_rarity_rolls(&self, caller: AccountId, rolls: RarityRolls) -> RewardResult<()> {
        self.authorize(caller)?;
        let table = RarityTable::from_rolls(rolls)?;

        let mut config = self.config.write();
        self.persist(vec![JournalOp::RarityRollsSet { rolls }])?;
        Arc::make_mut(&mut *config).rarity = table;

        info!(
            caller,
            common = rolls.common,
            uncommon = rolls.uncommon,
            rare = rolls.rare,
            epic = rolls.epic,
            legendary = rolls.legendary,
            max = rolls.max,
            "rarity rolls updated"
        );
        Ok(())
    }

    /// Replaces the reward for one (type, tier) slot.
    ///
    /// # Errors
    ///
    /// - [`RewardError::Unauthorized`] if `caller` lacks the privileged role
    /// - `"invalid min max value"` / `"empty ids"` as
    ///   [`RewardError::InvalidConfiguration`]
    /// - [`RewardError::Journal`] if the change cannot be persisted
    pub fn set_reward(
        &self,
        caller: AccountId,
        reward_type: RewardType,
        tier: RarityTier,
        min: u128,
        max: u128,
        item_ids: Vec<ItemId>,
    ) -> RewardResult<()> {
        self.authorize(caller)?;
        let spec = RewardSpec::new(min, max, item_ids)?;
        self.store_reward(caller, reward_type, tier, spec)
    }

    /// Replaces the reward for one slot from its word encoding.
    ///
    /// # Errors
    ///
    /// Same as [`ClaimOrchestrator::set_reward`], plus decoding errors.
    pub fn set_reward_encoded(
        &self,
        caller: AccountId,
        reward_type: RewardType,
        tier: RarityTier,
        data: &[u8],
    ) -> RewardResult<()> {
        self.authorize(caller)?;
        let spec = RewardSpec::decode(data)?;
        self.store_reward(caller, reward_type, tier, spec)
    }

    /// Applies a whole configuration, e.g. one loaded from TOML.
    ///
    /// The rarity table is replaced if `config` has one, and every configured
    /// slot of `config` is written. Slots `config` leaves empty keep their
    /// current value. All of it is journaled as one transaction.
    ///
    /// # Errors
    ///
    /// [`RewardError::Unauthorized`] or [`RewardError::Journal`]; nothing is
    /// applied on error.
    pub fn apply_config(&self, caller: AccountId, incoming: &RewardConfig) -> RewardResult<()> {
        self.authorize(caller)?;

        let mut ops = Vec::with_capacity(1 + incoming.catalog.configured_count());
        if incoming.rarity.is_configured() {
            ops.push(JournalOp::RarityRollsSet {
                rolls: incoming.rarity.rolls(),
            });
        }
        ops.extend(incoming.catalog.iter().map(|(reward_type, tier, spec)| {
            reward_op(reward_type, tier, spec)
        }));

        let mut config = self.config.write();
        self.persist(ops)?;
        let current = Arc::make_mut(&mut *config);
        if incoming.rarity.is_configured() {
            current.rarity = incoming.rarity;
        }
        for (reward_type, tier, spec) in incoming.catalog.iter() {
            current.catalog.set(reward_type, tier, spec.clone());
        }

        info!(
            caller,
            rarity = ?current.rarity.rolls(),
            rewards = current.catalog.configured_count(),
            "reward configuration applied"
        );
        Ok(())
    }

    fn store_reward(
        &self,
        caller: AccountId,
        reward_type: RewardType,
        tier: RarityTier,
        spec: RewardSpec,
    ) -> RewardResult<()> {
        let mut config = self.config.write();
        self.persist(vec![reward_op(reward_type, tier, &spec)])?;

        info!(
            caller,
            ?reward_type,
            ?tier,
            min = %spec.min(),
            max = %spec.max(),
            ids = ?spec.item_ids(),
            "reward updated"
        );
        Arc::make_mut(&mut *config).catalog.set(reward_type, tier, spec);
        Ok(())
    }

    fn authorize(&self, caller: AccountId) -> RewardResult<()> {
        if self.collaborators.authorizer.has_privileged_role(caller) {
            Ok(())
        } else {
            warn!(caller, "unauthorized configuration attempt");
            Err(RewardError::Unauthorized { account: caller })
        }
    }

    fn persist(&self, ops: Vec<JournalOp>) -> RewardResult<()> {
        match &self.journal {
            Some(journal) => journal.append(ops),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------------

    /// Claims today's reward for `account`.
    ///
    /// # Arguments
    ///
    /// * `account` - Claiming account
    /// * `seed` - Caller-supplied entropy; the outcome is a pure function of it
    ///   and the current configuration
    ///
    /// # Errors
    ///
    /// - [`RewardError::ClaimTooSoon`] inside the cooldown window
    /// - [`RewardError::InvalidConfiguration`] while the rarity table is unset
    /// - [`RewardError::UnconfiguredReward`] if the rolled slot is empty
    /// - [`RewardError::PayoutFailed`] if the mint or grant is refused
    /// - [`RewardError::Journal`] if the claim cannot be persisted
    ///
    /// The claim is journaled before the payout. If the payout is refused, a
    /// compensating record is journaled and the ledger restored, so no state
    /// changed. Should that record itself fail to persist, the claim stays
    /// recorded in memory as well as on disk and the account waits out the
    /// cooldown without having been paid.
    pub fn claim(&self, account: AccountId, seed: u64) -> RewardResult<ClaimResult> {
        let now = self.collaborators.clock.now();
        let mut ledger = self.ledger.lock();

        if !ledger.can_claim(account, now) {
            let retry_at = ledger.next_claim_at(account).unwrap_or(now);
            debug!(account, now, retry_at, "claim rejected: cooldown active");
            return Err(RewardError::ClaimTooSoon { account, retry_at });
        }

        let config = Arc::clone(&self.config.read());
        if !config.rarity.is_configured() {
            return Err(RewardError::invalid("rarity table not configured"));
        }

        let reward_type = entropy::reward_type(seed);
        let roll = entropy::rarity_roll(seed, config.rarity.max_roll());
        let resolution = RewardResolver::new(&config, self.grand_prize_item).resolve(roll, reward_type)?;

        let previous = ledger.record_claim(account, now);
        if let Err(err) = self.persist(vec![JournalOp::ClaimRecorded {
            account,
            timestamp: now,
        }]) {
            ledger.restore(account, previous);
            return Err(err);
        }

        if let Err(err) = self.pay(account, resolution.payout) {
            match self.persist(vec![JournalOp::ClaimReverted { account, previous }]) {
                Ok(()) => ledger.restore(account, previous),
                Err(journal_err) => warn!(
                    account,
                    %journal_err,
                    "claim revert not journaled, account stays on cooldown"
                ),
            }
            warn!(account, ?reward_type, tier = ?resolution.tier, %err, "claim rolled back");
            return Err(err);
        }

        let next_claim_at = ledger.next_claim_at(account).unwrap_or(now);
        drop(ledger);

        self.push_event(ClaimEvent {
            account,
            reward_type: resolution.reward_type,
            tier: resolution.tier,
            payout: resolution.payout.encoded(),
        });

        info!(
            account,
            reward_type = ?resolution.reward_type,
            tier = ?resolution.tier,
            roll,
            "reward claimed"
        );

        Ok(ClaimResult {
            account,
            reward_type: resolution.reward_type,
            tier: resolution.tier,
            payout: resolution.payout,
            claimed_at: now,
            next_claim_at,
        })
    }

    fn push_event(&self, event: ClaimEvent) {
        let mut events = self.event_buffer.lock();
        if events.len() >= self.event_capacity {
            events.pop_front();
            warn!(capacity = self.event_capacity, "claim event buffer full, oldest event evicted");
        }
        events.push_back(event);
    }

    fn pay(&self, account: AccountId, payout: Payout) -> RewardResult<()> {
        let result = match payout {
            Payout::Currency { amount } => self.collaborators.currency.mint(account, amount),
            Payout::Item { item_id, amount } => {
                self.collaborators.items.grant(account, item_id, amount)
            }
            Payout::GrandPrize { item_id } => self.collaborators.items.grant(account, item_id, 1),
        };
        result.map_err(|err| RewardError::PayoutFailed {
            reason: err.to_string(),
        })
    }

    /// Returns true if `account` may claim right now.
    #[must_use]
    pub fn can_claim(&self, account: AccountId) -> bool {
        let now = self.collaborators.clock.now();
        self.ledger.lock().can_claim(account, now)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<RewardConfig> {
        Arc::clone(&self.config.read())
    }

    /// Current rarity table.
    #[must_use]
    pub fn rarity_table(&self) -> RarityTable {
        self.config.read().rarity
    }

    /// Reward configured for one slot.
    #[must_use]
    pub fn reward(&self, reward_type: RewardType, tier: RarityTier) -> Option<RewardSpec> {
        self.config.read().catalog.get(reward_type, tier).cloned()
    }

    /// Item paid out on Legendary.
    #[must_use]
    pub const fn grand_prize_item(&self) -> ItemId {
        self.grand_prize_item
    }

    /// Last successful claim of `account`.
    #[must_use]
    pub fn last_claim(&self, account: AccountId) -> Option<Timestamp> {
        self.ledger.lock().last_claim(account)
    }

    /// Earliest time `account` may claim again; `None` if it never claimed.
    #[must_use]
    pub fn next_claim_at(&self, account: AccountId) -> Option<Timestamp> {
        self.ledger.lock().next_claim_at(account)
    }

    /// Takes all buffered claim events, oldest first.
    ///
    /// Callers should drain regularly; past the configured capacity the
    /// oldest events are evicted.
    pub fn drain_events(&self) -> Vec<ClaimEvent> {
        self.event_buffer.lock().drain(..).collect()
    }

    /// Number of buffered claim events.
    #[must_use]
    pub fn pending_event_count(&self) -> usize {
        self.event_buffer.lock().len()
    }

    /// Compacts the journal down to the current state.
    ///
    /// A no-op without a journal.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] on I/O failure; the old journal stays
    /// in place.
    pub fn checkpoint(&self) -> RewardResult<()> {
        let Some(journal) = &self.journal else {
            debug!("checkpoint skipped: no journal");
            return Ok(());
        };

        let ledger = self.ledger.lock();
        let config = self.config.read();
        journal.checkpoint(&snapshot(&config, &ledger))
    }
}

/// Journal form of one catalog slot.
fn reward_op(reward_type: RewardType, tier: RarityTier, spec: &RewardSpec) -> JournalOp {
    JournalOp::RewardSet {
        reward_type,
        tier,
        min: spec.min(),
        max: spec.max(),
        item_ids: spec.item_ids().to_vec(),
    }
}

/// Operations that rebuild `config` and `ledger` from nothing.
fn snapshot(config: &RewardConfig, ledger: &ClaimLedger) -> Vec<JournalOp> {
    let mut ops = Vec::with_capacity(1 + config.catalog.configured_count() + ledger.len());
    if config.rarity.is_configured() {
        ops.push(JournalOp::RarityRollsSet {
            rolls: config.rarity.rolls(),
        });
    }
    ops.extend(
        config
            .catalog
            .iter()
            .map(|(reward_type, tier, spec)| reward_op(reward_type, tier, spec)),
    );

    let mut claims: Vec<_> = ledger.iter().collect();
    claims.sort_unstable();
    ops.extend(
        claims
            .into_iter()
            .map(|(account, timestamp)| JournalOp::ClaimRecorded { account, timestamp }),
    );
    ops
}

/// Applies one recovered operation.
fn replay(config: &mut RewardConfig, ledger: &mut ClaimLedger, op: &JournalOp) -> RewardResult<()> {
    let applied = match op {
        JournalOp::RarityRollsSet { rolls } => config.set_rarity_rolls(*rolls),
        JournalOp::RewardSet {
            reward_type,
            tier,
            min,
            max,
            item_ids,
        } => config.set_reward(*reward_type, *tier, *min, *max, item_ids.clone()),
        JournalOp::ClaimRecorded { account, timestamp } => {
            ledger.record_claim(*account, *timestamp);
            Ok(())
        }
        JournalOp::ClaimReverted { account, previous } => {
            ledger.restore(*account, *previous);
            Ok(())
        }
    };
    applied.map_err(|err| RewardError::Journal(format!("replay of {op:?} failed: {err}")))
}
