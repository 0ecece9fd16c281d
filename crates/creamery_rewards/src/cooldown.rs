//! # Claim Ledger
//!
//! Per-account last-claim timestamps and the daily cooldown rule.
//!
//! An account may claim when it has never claimed, or when at least
//! `cooldown` seconds have passed since its last claim. The boundary is
//! inclusive. Accounts are independent of each other.

use std::collections::HashMap;

use crate::collaborators::{AccountId, Timestamp};

/// Default cooldown between two claims of one account: 24 hours.
pub const CLAIM_COOLDOWN_SECS: u64 = 86_400;

/// Last successful claim per account.
#[derive(Clone, Debug)]
pub struct ClaimLedger {
    cooldown: u64,
    last_claims: HashMap<AccountId, Timestamp>,
}

impl Default for ClaimLedger {
    fn default() -> Self {
        Self::new(CLAIM_COOLDOWN_SECS)
    }
}

impl ClaimLedger {
    /// Creates an empty ledger with the given cooldown in seconds.
    #[must_use]
    pub fn new(cooldown: u64) -> Self {
        Self {
            cooldown,
            last_claims: HashMap::new(),
        }
    }

    /// Cooldown in seconds.
    #[inline]
    #[must_use]
    pub const fn cooldown(&self) -> u64 {
        self.cooldown
    }

    /// Returns true if `account` may claim at `now`.
    ///
    /// A clock that went backwards counts as no time elapsed.
    #[must_use]
    pub fn can_claim(&self, account: AccountId, now: Timestamp) -> bool {
        match self.last_claims.get(&account) {
            None => true,
            Some(&last) => now.saturating_sub(last) >= self.cooldown,
        }
    }

    /// Unconditionally records a claim, returning the previous timestamp.
    ///
    /// The returned value is what [`ClaimLedger::restore`] needs to undo this.
    pub fn record_claim(&mut self, account: AccountId, now: Timestamp) -> Option<Timestamp> {
        self.last_claims.insert(account, now)
    }

    /// Puts an account back to a previous state.
    pub fn restore(&mut self, account: AccountId, previous: Option<Timestamp>) {
        match previous {
            Some(timestamp) => {
                self.last_claims.insert(account, timestamp);
            }
            None => {
                self.last_claims.remove(&account);
            }
        }
    }

    /// Last successful claim of `account`.
    #[must_use]
    pub fn last_claim(&self, account: AccountId) -> Option<Timestamp> {
        self.last_claims.get(&account).copied()
    }

    /// Earliest timestamp at which `account` may claim again.
    ///
    /// `None` if the account has never claimed.
    #[must_use]
    pub fn next_claim_at(&self, account: AccountId) -> Option<Timestamp> {
        self.last_claim(account)
            .map(|last| last.saturating_add(self.cooldown))
    }

    /// Iterates over `(account, last claim)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (AccountId, Timestamp)> + '_ {
        self.last_claims.iter().map(|(&account, &at)| (account, at))
    }

    /// Number of accounts that ever claimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_claims.len()
    }

    /// Returns true if nobody claimed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_claims.is_empty()
    }
}
