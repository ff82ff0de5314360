//! Treasury accounting types.
//!
//! Each treasury tracks, per asset, the funds it physically holds (`real`)
//! and the funds it owes to its policies (`virtual`). The two drift apart
//! while claims wait in the FIFO queue for cash.

use serde::{Deserialize, Serialize};

use crate::{AccountId, Asset, PolicyId};

/// Per-asset treasury figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Economics {
    /// Funds actually held by the treasury account.
    pub real_balance: u128,
    /// Sum of all policy balances in this asset.
    pub virtual_balance: u128,
    /// Sum of the minimum balances reserved by policies.
    pub min_balance: u128,
    /// Claims recognised but not yet paid out.
    pub unpaid_claims_total: u128,
}

impl Economics {
    /// Funds still missing before every obligation is covered.
    #[must_use]
    pub fn shortfall(&self) -> u128 {
        self.virtual_balance
            .saturating_add(self.unpaid_claims_total)
            .saturating_sub(self.real_balance)
    }

    /// Real funds that may leave the treasury without breaching the minimum.
    #[must_use]
    pub fn withdrawable(&self) -> u128 {
        self.real_balance.saturating_sub(self.min_balance)
    }
}

/// A policy's share of its treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEconomics {
    /// Denomination asset of the policy.
    pub asset: Asset,
    /// This policy's part of the treasury's virtual balance.
    pub balance: u128,
    /// Reserved floor. Settable once.
    pub min_balance: u128,
    pub min_balance_set: bool,
    /// Claims of this policy still waiting in the queue.
    pub claims_unpaid_total: u128,
}

impl PolicyEconomics {
    #[must_use]
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            balance: 0,
            min_balance: 0,
            min_balance_set: false,
            claims_unpaid_total: 0,
        }
    }
}

/// Entry in a treasury's per-asset claims queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryClaim {
    pub policy: PolicyId,
    pub recipient: AccountId,
    pub amount: u128,
    pub paid: bool,
}

/// Queue statistics for one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsSummary {
    pub count: usize,
    pub unpaid_count: usize,
    pub unpaid_total: u128,
}

/// Outcome of a treasury claim payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimPayment {
    /// Paid from treasury holdings immediately.
    Paid,
    /// Queued at this index behind earlier claims or awaiting funds.
    Queued(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_counts_unpaid_claims() {
        let eco = Economics {
            real_balance: 1,
            virtual_balance: 1,
            min_balance: 0,
            unpaid_claims_total: 1,
        };
        assert_eq!(eco.shortfall(), 1);
    }

    #[test]
    fn withdrawable_respects_minimum() {
        let eco = Economics {
            real_balance: 100,
            virtual_balance: 100,
            min_balance: 30,
            unpaid_claims_total: 0,
        };
        assert_eq!(eco.withdrawable(), 70);
        assert_eq!(Economics::default().withdrawable(), 0);
    }

    #[test]
    fn policy_economics_starts_unset() {
        let pe = PolicyEconomics::new("DAI".into());
        assert_eq!(pe.balance, 0);
        assert!(!pe.min_balance_set);
    }
}
