//! # External Collaborators
//!
//! The claim engine does not own balances, roles or time. It talks to them
//! through these traits:
//!
//! - [`Authorizer`] gates the two configuration setters.
//! - [`CurrencyIssuer`] mints currency payouts.
//! - [`ItemIssuer`] grants item payouts, the grand prize included.
//! - [`Clock`] supplies wall-clock seconds.
//!
//! In-memory implementations live in [`crate::vault`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::amount::TokenAmount;
use crate::catalog::ItemId;

/// Identity of a claiming or configuring account.
pub type AccountId = u64;

/// Wall-clock seconds.
pub type Timestamp = u64;

/// Rejection reported by a payout collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayoutError {
    /// Minting would push total supply past the cap.
    #[error("supply cap exceeded: cap {cap}, requested {requested}")]
    SupplyCapExceeded {
        /// Configured cap.
        cap: TokenAmount,
        /// Amount requested.
        requested: TokenAmount,
    },

    /// Issuance is paused.
    #[error("issuance is paused")]
    Paused,

    /// A balance would overflow.
    #[error("balance overflow")]
    Overflow,

    /// Any other collaborator-specific rejection.
    #[error("{0}")]
    Rejected(String),
}

/// Privilege predicate consulted before configuration changes.
pub trait Authorizer: Send + Sync {
    /// Returns true if `account` may change the reward configuration.
    fn has_privileged_role(&self, account: AccountId) -> bool;
}

/// Currency ledger entry point.
pub trait CurrencyIssuer: Send + Sync {
    /// Mints `amount` to `account`.
    ///
    /// # Errors
    ///
    /// Returns a [`PayoutError`] if the ledger refuses the mint; nothing is
    /// minted in that case.
    fn mint(&self, account: AccountId, amount: TokenAmount) -> Result<(), PayoutError>;
}

/// Item ledger entry point.
pub trait ItemIssuer: Send + Sync {
    /// Grants `amount` units of `item_id` to `account`.
    ///
    /// # Errors
    ///
    /// Returns a [`PayoutError`] if the ledger refuses the grant; nothing is
    /// granted in that case.
    fn grant(&self, account: AccountId, item_id: ItemId, amount: u128) -> Result<(), PayoutError>;
}

/// Source of wall-clock seconds.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Seconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock stopped at `now`.
    #[must_use]
    pub const fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Jumps to `now`.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves forward by `secs`, saturating.
    pub fn advance(&self, secs: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(secs))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
