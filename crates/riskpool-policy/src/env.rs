//! What a policy needs from the platform around it.
//!
//! A [`Policy`](crate::Policy) owns only its own state. Funds, roles, the
//! treasury and the market are reached through a [`PolicyEnvironment`],
//! which the platform builds from disjoint borrows of its components for
//! the duration of one call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use riskpool_ledger::AssetLedger;
use riskpool_market::Market;
use riskpool_treasury::{OrderRequest, Treasury};
use riskpool_types::{
    AccountId, ClaimPayment, EntityId, OfferId, PolicyId, Result, RiskpoolError, RoleOracle,
};

use crate::facets::DispatchTable;

/// Resolves an entity to the ledger account that receives its payouts.
pub trait AccountDirectory {
    fn entity_account(&self, entity: EntityId) -> Option<AccountId>;
}

impl AccountDirectory for BTreeMap<EntityId, AccountId> {
    fn entity_account(&self, entity: EntityId) -> Option<AccountId> {
        self.get(&entity).copied()
    }
}

/// Services available to policy operations.
pub trait PolicyEnvironment {
    fn now(&self) -> DateTime<Utc>;
    fn roles(&self) -> &dyn RoleOracle;
    fn facets(&self) -> &DispatchTable;
    fn ledger(&mut self) -> &mut AssetLedger;
    fn balance_of(&self, owner: AccountId, asset: &str) -> u128;
    fn total_supply(&self, asset: &str) -> u128;

    /// Account of the treasury the policy belongs to.
    fn treasury_account(&self) -> AccountId;
    fn entity_account(&self, entity: EntityId) -> Result<AccountId>;
    /// Receives the protocol's commission share.
    fn fee_bank(&self) -> AccountId;

    /// `amount` of the policy's unit has just reached the treasury account
    /// as income for `policy`.
    fn credit_treasury(&mut self, policy: PolicyId, amount: u128) -> Result<()>;
    fn set_min_policy_balance(&mut self, policy: PolicyId, amount: u128) -> Result<()>;
    fn pay_claim(&mut self, policy: PolicyId, recipient: AccountId, amount: u128) -> Result<ClaimPayment>;
    fn create_order(&mut self, policy: PolicyId, order: OrderRequest) -> Result<OfferId>;
    fn cancel_order(&mut self, policy: PolicyId, offer: OfferId) -> Result<()>;
    fn is_offer_active(&self, offer: OfferId) -> bool;
}

/// The standard environment: borrowed platform components.
pub struct Environment<'a> {
    pub now: DateTime<Utc>,
    pub ledger: &'a mut AssetLedger,
    pub market: &'a mut Market,
    pub treasury: &'a mut Treasury,
    pub roles: &'a dyn RoleOracle,
    pub facets: &'a DispatchTable,
    pub accounts: &'a dyn AccountDirectory,
    pub fee_bank: AccountId,
}

impl PolicyEnvironment for Environment<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn roles(&self) -> &dyn RoleOracle {
        self.roles
    }

    fn facets(&self) -> &DispatchTable {
        self.facets
    }

    fn ledger(&mut self) -> &mut AssetLedger {
        self.ledger
    }

    fn balance_of(&self, owner: AccountId, asset: &str) -> u128 {
        self.ledger.balance_of(owner, asset)
    }

    fn total_supply(&self, asset: &str) -> u128 {
        self.ledger.total_supply(asset)
    }

    fn treasury_account(&self) -> AccountId {
        self.treasury.account()
    }

    fn entity_account(&self, entity: EntityId) -> Result<AccountId> {
        self.accounts
            .entity_account(entity)
            .ok_or(RiskpoolError::EntityNotFound(entity))
    }

    fn fee_bank(&self) -> AccountId {
        self.fee_bank
    }

    fn credit_treasury(&mut self, policy: PolicyId, amount: u128) -> Result<()> {
        let asset = self.treasury.get_policy_economics(policy)?.asset.clone();
        self.treasury.inc_policy_balance(policy, amount)?;
        self.treasury.record_receipt(self.ledger, &asset, amount)?;
        Ok(())
    }

    fn set_min_policy_balance(&mut self, policy: PolicyId, amount: u128) -> Result<()> {
        self.treasury.set_min_policy_balance(policy, amount)
    }

    fn pay_claim(&mut self, policy: PolicyId, recipient: AccountId, amount: u128) -> Result<ClaimPayment> {
        self.treasury.pay_claim(self.ledger, policy, recipient, amount)
    }

    fn create_order(&mut self, policy: PolicyId, order: OrderRequest) -> Result<OfferId> {
        self.treasury
            .create_order(self.ledger, self.market, self.now, policy, order)
    }

    fn cancel_order(&mut self, policy: PolicyId, offer: OfferId) -> Result<()> {
        self.treasury
            .cancel_order(self.ledger, self.market, self.roles, self.now, policy, offer)
    }

    fn is_offer_active(&self, offer: OfferId) -> bool {
        self.market.is_active(offer)
    }
}
