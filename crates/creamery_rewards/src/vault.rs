//! # In-Memory Vaults
//!
//! Reference implementations of the collaborator traits, used by the test
//! suite and the claim simulator. They keep balances in memory behind
//! `parking_lot` locks and enforce the same rejections a real ledger would:
//! paused issuance, supply cap, overflow.

use std::collections::{HashMap, HashSet};

use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::amount::TokenAmount;
use crate::catalog::ItemId;
use crate::collaborators::{AccountId, Authorizer, CurrencyIssuer, ItemIssuer, PayoutError};
use crate::error::{RewardError, RewardResult};

// ============================================================================
// Roles
// ============================================================================

/// Roles known to the [`RoleRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// May grant and revoke roles.
    DefaultAdmin,
    /// May change the reward configuration.
    Admin,
}

/// Role table. The deploying account starts with both roles.
#[derive(Debug)]
pub struct RoleRegistry {
    members: RwLock<HashSet<(Role, AccountId)>>,
}

impl RoleRegistry {
    /// Creates a registry owned by `deployer`.
    #[must_use]
    pub fn new(deployer: AccountId) -> Self {
        let mut members = HashSet::new();
        members.insert((Role::DefaultAdmin, deployer));
        members.insert((Role::Admin, deployer));
        Self {
            members: RwLock::new(members),
        }
    }

    /// Returns true if `account` holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role, account: AccountId) -> bool {
        self.members.read().contains(&(role, account))
    }

    /// Gives `role` to `account`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Unauthorized`] unless `caller` is a default admin.
    pub fn grant_role(&self, caller: AccountId, role: Role, account: AccountId) -> RewardResult<()> {
        let mut members = self.members.write();
        if !members.contains(&(Role::DefaultAdmin, caller)) {
            return Err(RewardError::Unauthorized { account: caller });
        }
        if members.insert((role, account)) {
            info!(caller, account, ?role, "role granted");
        }
        Ok(())
    }

    /// Takes `role` away from `account`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Unauthorized`] unless `caller` is a default admin.
    pub fn revoke_role(&self, caller: AccountId, role: Role, account: AccountId) -> RewardResult<()> {
        let mut members = self.members.write();
        if !members.contains(&(Role::DefaultAdmin, caller)) {
            return Err(RewardError::Unauthorized { account: caller });
        }
        if members.remove(&(role, account)) {
            info!(caller, account, ?role, "role revoked");
        }
        Ok(())
    }
}

impl Authorizer for RoleRegistry {
    fn has_privileged_role(&self, account: AccountId) -> bool {
        self.has_role(Role::Admin, account)
    }
}

// ============================================================================
// Currency
// ============================================================================

#[derive(Debug, Default)]
struct CurrencyState {
    balances: HashMap<AccountId, TokenAmount>,
    total_supply: TokenAmount,
    paused: bool,
}

/// Fungible currency balances with an optional supply cap.
#[derive(Debug, Default)]
pub struct CurrencyVault {
    cap: Option<TokenAmount>,
    state: Mutex<CurrencyState>,
}

impl CurrencyVault {
    /// Creates an uncapped vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a vault whose total supply may never exceed `cap`.
    #[must_use]
    pub fn with_cap(cap: TokenAmount) -> Self {
        Self {
            cap: Some(cap),
            state: Mutex::new(CurrencyState::default()),
        }
    }

    /// Stops or resumes minting.
    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }

    /// Returns true while minting is stopped.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Balance of `account`.
    #[must_use]
    pub fn balance_of(&self, account: AccountId) -> TokenAmount {
        self.state
            .lock()
            .balances
            .get(&account)
            .copied()
            .unwrap_or(TokenAmount::ZERO)
    }

    /// Sum of all balances.
    #[must_use]
    pub fn total_supply(&self) -> TokenAmount {
        self.state.lock().total_supply
    }
}

impl CurrencyIssuer for CurrencyVault {
    fn mint(&self, account: AccountId, amount: TokenAmount) -> Result<(), PayoutError> {
        let mut state = self.state.lock();
        if state.paused {
            return Err(PayoutError::Paused);
        }

        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(PayoutError::Overflow)?;
        if let Some(cap) = self.cap {
            if supply > cap {
                return Err(PayoutError::SupplyCapExceeded {
                    cap,
                    requested: amount,
                });
            }
        }

        let balance = state
            .balances
            .get(&account)
            .copied()
            .unwrap_or(TokenAmount::ZERO)
            .checked_add(amount)
            .ok_or(PayoutError::Overflow)?;
        state.balances.insert(account, balance);
        state.total_supply = supply;
        Ok(())
    }
}

// ============================================================================
// Items
// ============================================================================

/// Item balances per (account, item id).
#[derive(Debug, Default)]
pub struct ItemVault {
    balances: Mutex<HashMap<(AccountId, ItemId), u128>>,
}

impl ItemVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Units of `item_id` held by `account`.
    #[must_use]
    pub fn balance_of(&self, account: AccountId, item_id: ItemId) -> u128 {
        self.balances
            .lock()
            .get(&(account, item_id))
            .copied()
            .unwrap_or(0)
    }
}

impl ItemIssuer for ItemVault {
    fn grant(&self, account: AccountId, item_id: ItemId, amount: u128) -> Result<(), PayoutError> {
        let mut balances = self.balances.lock();
        let balance = balances
            .get(&(account, item_id))
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(PayoutError::Overflow)?;
        balances.insert((account, item_id), balance);
        Ok(())
    }
}
