//! Fungible asset ledger.
//!
//! Tracks per-(account, asset) balances, per-(owner, spender, asset)
//! allowances and per-asset supply. Every mutation is all-or-nothing: a
//! failed transfer leaves every balance and allowance unchanged.

use std::collections::{BTreeMap, HashMap};

use riskpool_types::{AccountId, Asset, Result, RiskpoolError, amount::checked_add};

/// Balances, allowances and supply for every asset on the platform.
///
/// Plays the part of the token contracts: premium currencies, wrapped
/// native currency and the tranche tokens minted for each policy.
#[derive(Debug, Clone, Default)]
pub struct AssetLedger {
    balances: HashMap<(AccountId, Asset), u128>,
    allowances: HashMap<(AccountId, AccountId, Asset), u128>,
    supply: BTreeMap<Asset, u128>,
}

impl AssetLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `owner` in `asset`.
    #[must_use]
    pub fn balance_of(&self, owner: AccountId, asset: &str) -> u128 {
        self.balances
            .get(&(owner, asset.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Total minted minus burned for `asset`.
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> u128 {
        self.supply.get(asset).copied().unwrap_or(0)
    }

    /// Remaining amount `spender` may move out of `owner`'s `asset` balance.
    #[must_use]
    pub fn allowance(&self, owner: AccountId, spender: AccountId, asset: &str) -> u128 {
        self.allowances
            .get(&(owner, spender, asset.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Set the allowance of `spender` over `owner`'s `asset`, replacing any previous value.
    pub fn approve(&mut self, owner: AccountId, spender: AccountId, asset: &str, amount: u128) {
        tracing::debug!(owner = %owner, spender = %spender, asset, amount, "approve");
        let key = (owner, spender, asset.to_string());
        if amount == 0 {
            self.allowances.remove(&key);
        } else {
            self.allowances.insert(key, amount);
        }
    }

    /// Create `amount` new units of `asset` for `to`.
    pub fn mint(&mut self, to: AccountId, asset: &str, amount: u128) -> Result<()> {
        let supply = checked_add(self.total_supply(asset), amount, "mint supply")?;
        let balance = checked_add(self.balance_of(to, asset), amount, "mint balance")?;
        self.supply.insert(asset.to_string(), supply);
        self.balances.insert((to, asset.to_string()), balance);
        tracing::debug!(to = %to, asset, amount, "mint");
        Ok(())
    }

    /// Destroy `amount` units of `asset` held by `from`.
    ///
    /// # Errors
    /// `InsufficientBalance` if `from` holds less than `amount`.
    pub fn burn(&mut self, from: AccountId, asset: &str, amount: u128) -> Result<()> {
        self.debit(from, asset, amount)?;
        let supply = self.total_supply(asset).saturating_sub(amount);
        self.supply.insert(asset.to_string(), supply);
        tracing::debug!(from = %from, asset, amount, "burn");
        Ok(())
    }

    /// Move `amount` of `asset` from `from` to `to`.
    ///
    /// # Errors
    /// `InsufficientBalance` ("amount exceeds balance") if `from` is short.
    pub fn transfer(&mut self, from: AccountId, to: AccountId, asset: &str, amount: u128) -> Result<()> {
        if from == to {
            let available = self.balance_of(from, asset);
            if available < amount {
                return Err(RiskpoolError::InsufficientBalance {
                    needed: amount,
                    available,
                });
            }
            return Ok(());
        }
        let credited = checked_add(self.balance_of(to, asset), amount, "transfer credit")?;
        self.debit(from, asset, amount)?;
        self.balances.insert((to, asset.to_string()), credited);
        Ok(())
    }

    /// Move `amount` of `asset` from `from` to `to` on behalf of `spender`,
    /// consuming allowance.
    ///
    /// # Errors
    /// `InsufficientAllowance` ("amount exceeds allowance") or
    /// `InsufficientBalance`. Neither leaves any change behind.
    pub fn transfer_from(
        &mut self,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        asset: &str,
        amount: u128,
    ) -> Result<()> {
        let allowed = self.allowance(from, spender, asset);
        if spender != from && allowed < amount {
            tracing::warn!(spender = %spender, from = %from, asset, amount, allowed, "allowance too low");
            return Err(RiskpoolError::InsufficientAllowance {
                needed: amount,
                available: allowed,
            });
        }
        self.transfer(from, to, asset, amount)?;
        if spender != from {
            self.approve(from, spender, asset, allowed - amount);
        }
        Ok(())
    }

    fn debit(&mut self, from: AccountId, asset: &str, amount: u128) -> Result<()> {
        let available = self.balance_of(from, asset);
        if available < amount {
            return Err(RiskpoolError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.balances
            .insert((from, asset.to_string()), available - amount);
        Ok(())
    }
}
