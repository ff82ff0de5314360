//! Entity treasury.
//!
//! A treasury holds the pooled funds of every policy its entity owns. Per
//! asset it tracks:
//!
//! - **real**: funds physically held by the treasury account
//! - **virtual**: the sum of its policies' balances
//! - **min**: the sum of reserved policy floors
//! - **unpaid**: claims recognised but still waiting for cash
//!
//! Claims reduce a policy's balance at once. If the treasury cannot pay, or
//! an earlier claim in the same asset is still waiting, the claim joins a
//! strict FIFO queue that drains whenever real funds arrive.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use riskpool_ledger::{AssetLedger, ReentrancyLock};
use riskpool_market::{Market, NewOffer};
use riskpool_types::{
    AccountId, Asset, ClaimPayment, ClaimsSummary, Economics, EntityId, MarketEvent,
    ObserverKind, OfferId, OfferObserver, PolicyEconomics, PolicyId, Result, RiskpoolError,
    RoleOracle, TreasuryClaim,
    amount::{checked_add, checked_sub},
};

use crate::claims_queue::ClaimsQueue;

/// A market order a policy places through its treasury.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub tranche: usize,
    pub kind: ObserverKind,
    pub pay_asset: Asset,
    pub pay_amount: u128,
    pub buy_asset: Asset,
    pub buy_amount: u128,
}

/// Treasury of one entity.
#[derive(Debug, Clone)]
pub struct Treasury {
    entity: EntityId,
    account: AccountId,
    economics: BTreeMap<Asset, Economics>,
    queues: BTreeMap<Asset, ClaimsQueue>,
    policies: BTreeMap<PolicyId, PolicyEconomics>,
    lock: ReentrancyLock,
}

impl Treasury {
    #[must_use]
    pub fn new(entity: EntityId, account: AccountId) -> Self {
        Self {
            entity,
            account,
            economics: BTreeMap::new(),
            queues: BTreeMap::new(),
            policies: BTreeMap::new(),
            lock: ReentrancyLock::new(),
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Ledger account holding the treasury's funds.
    #[must_use]
    pub fn account(&self) -> AccountId {
        self.account
    }

    // =================================================================
    // Policy registration and balances
    // =================================================================

    /// Admit `policy`, denominated in `asset`, to this treasury.
    pub fn register_policy(&mut self, policy: PolicyId, asset: &str) -> Result<()> {
        if asset.is_empty() {
            return Err(RiskpoolError::InvalidPolicy {
                reason: "denomination asset not set".into(),
            });
        }
        if self.policies.contains_key(&policy) {
            return Err(RiskpoolError::AlreadyExists {
                reason: format!("{policy} already registered with treasury"),
            });
        }
        self.policies
            .insert(policy, PolicyEconomics::new(asset.to_string()));
        self.economics.entry(asset.to_string()).or_default();
        tracing::info!(treasury = %self.entity, policy = %policy, asset, "policy registered");
        Ok(())
    }

    #[must_use]
    pub fn is_registered(&self, policy: PolicyId) -> bool {
        self.policies.contains_key(&policy)
    }

    /// Recognise `amount` of new income for `policy`. Moves no funds.
    pub fn inc_policy_balance(&mut self, policy: PolicyId, amount: u128) -> Result<()> {
        let pe = self
            .policies
            .get_mut(&policy)
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))?;
        let eco = self.economics.entry(pe.asset.clone()).or_default();
        let balance = checked_add(pe.balance, amount, "policy balance")?;
        let virtual_balance = checked_add(eco.virtual_balance, amount, "virtual balance")?;
        pe.balance = balance;
        eco.virtual_balance = virtual_balance;
        tracing::debug!(policy = %policy, amount, balance, "policy balance increased");
        Ok(())
    }

    /// Reserve a floor for `policy`. Settable once.
    pub fn set_min_policy_balance(&mut self, policy: PolicyId, amount: u128) -> Result<()> {
        let pe = self
            .policies
            .get_mut(&policy)
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))?;
        if pe.min_balance_set {
            return Err(RiskpoolError::MinBalanceAlreadySet(policy));
        }
        let eco = self.economics.entry(pe.asset.clone()).or_default();
        eco.min_balance = checked_add(eco.min_balance, amount, "treasury min balance")?;
        pe.min_balance = amount;
        pe.min_balance_set = true;
        tracing::info!(policy = %policy, amount, "min policy balance set");
        Ok(())
    }

    // =================================================================
    // Real funds
    // =================================================================

    /// Funds arrived in the treasury account: raise the real balance and pay
    /// queued claims. Returns the number of claims settled.
    pub fn record_receipt(&mut self, ledger: &mut AssetLedger, asset: &str, amount: u128) -> Result<usize> {
        let _guard = self.lock.enter()?;
        let eco = self.economics.entry(asset.to_string()).or_default();
        eco.real_balance = checked_add(eco.real_balance, amount, "real balance")?;
        tracing::debug!(treasury = %self.entity, asset, amount, real = eco.real_balance, "receipt recorded");
        self.settle_queue(ledger, asset)
    }

    /// Move `amount` from `from` into the treasury, up to the current shortfall.
    pub fn transfer_in(&mut self, ledger: &mut AssetLedger, from: AccountId, asset: &str, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(RiskpoolError::invalid_amount("transfer amount is zero"));
        }
        let shortfall = self.get_economics(asset).shortfall();
        if amount > shortfall {
            return Err(RiskpoolError::TreasuryLimit {
                reason: format!("exceeds treasury shortfall: {amount} > {shortfall}"),
            });
        }
        ledger.transfer(from, self.account, asset, amount)?;
        self.record_receipt(ledger, asset, amount)?;
        tracing::info!(treasury = %self.entity, asset, amount, "funds transferred to treasury");
        Ok(())
    }

    /// Move `amount` out of the treasury to `to`, keeping the aggregate
    /// minimum balance in place.
    pub fn transfer_out(&mut self, ledger: &mut AssetLedger, to: AccountId, asset: &str, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(RiskpoolError::invalid_amount("transfer amount is zero"));
        }
        let withdrawable = self.get_economics(asset).withdrawable();
        if amount > withdrawable {
            return Err(RiskpoolError::TreasuryLimit {
                reason: format!("breaches minimum balance: {amount} > {withdrawable}"),
            });
        }
        ledger.transfer(self.account, to, asset, amount)?;
        let eco = self.economics.entry(asset.to_string()).or_default();
        eco.real_balance -= amount;
        tracing::info!(treasury = %self.entity, asset, amount, "funds transferred from treasury");
        Ok(())
    }

    // =================================================================
    // Claims
    // =================================================================

    /// Pay `amount` of `policy`'s balance to `recipient`, or queue it.
    ///
    /// The policy balance drops immediately either way.
    pub fn pay_claim(
        &mut self,
        ledger: &mut AssetLedger,
        policy: PolicyId,
        recipient: AccountId,
        amount: u128,
    ) -> Result<ClaimPayment> {
        let _guard = self.lock.enter()?;
        if amount == 0 {
            return Err(RiskpoolError::invalid_amount("claim amount is zero"));
        }
        let pe = self
            .policies
            .get_mut(&policy)
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))?;
        if amount > pe.balance {
            return Err(RiskpoolError::ExceedsPolicyBalance {
                requested: amount,
                balance: pe.balance,
            });
        }
        let asset = pe.asset.clone();
        let eco = self.economics.entry(asset.clone()).or_default();
        let queue = self.queues.entry(asset.clone()).or_default();
        let virtual_balance = checked_sub(eco.virtual_balance, amount, "virtual balance")?;

        if eco.real_balance >= amount && !queue.has_unpaid() {
            ledger.transfer(self.account, recipient, &asset, amount)?;
            pe.balance -= amount;
            eco.virtual_balance = virtual_balance;
            eco.real_balance -= amount;
            queue.push_paid(policy, recipient, amount);
            tracing::info!(policy = %policy, recipient = %recipient, asset = %asset, amount, "claim paid");
            return Ok(ClaimPayment::Paid);
        }

        let unpaid = checked_add(eco.unpaid_claims_total, amount, "unpaid claims")?;
        pe.balance -= amount;
        pe.claims_unpaid_total = checked_add(pe.claims_unpaid_total, amount, "policy unpaid claims")?;
        eco.virtual_balance = virtual_balance;
        eco.unpaid_claims_total = unpaid;
        let index = queue.push_unpaid(policy, recipient, amount);
        tracing::warn!(
            policy = %policy,
            recipient = %recipient,
            asset = %asset,
            amount,
            index,
            real = eco.real_balance,
            "claim queued"
        );
        Ok(ClaimPayment::Queued(index))
    }

    /// Pay queued claims in order while real funds cover the head.
    fn settle_queue(&mut self, ledger: &mut AssetLedger, asset: &str) -> Result<usize> {
        let Some(queue) = self.queues.get_mut(asset) else {
            return Ok(0);
        };
        let eco = self.economics.entry(asset.to_string()).or_default();
        let mut settled = 0;
        while let Some(head) = queue.head() {
            if eco.real_balance < head.amount {
                break;
            }
            let (policy, recipient, amount) = (head.policy, head.recipient, head.amount);
            ledger.transfer(self.account, recipient, asset, amount)?;
            queue.pop_head();
            eco.real_balance -= amount;
            eco.unpaid_claims_total = eco.unpaid_claims_total.saturating_sub(amount);
            if let Some(pe) = self.policies.get_mut(&policy) {
                pe.claims_unpaid_total = pe.claims_unpaid_total.saturating_sub(amount);
            }
            settled += 1;
            tracing::info!(policy = %policy, recipient = %recipient, asset, amount, "queued claim settled");
        }
        Ok(settled)
    }

    /// Whether `policy`'s reserved floor is covered by real funds left after
    /// every claim queued ahead of its own.
    pub fn is_policy_collateralized(&self, policy: PolicyId) -> Result<bool> {
        let pe = self
            .policies
            .get(&policy)
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))?;
        let real = self.get_economics(&pe.asset).real_balance;
        let ahead = self
            .queues
            .get(&pe.asset)
            .map_or(0, |q| q.unpaid_ahead_of(policy));
        Ok(real.saturating_sub(ahead) >= pe.min_balance)
    }

    // =================================================================
    // Brokered market orders
    // =================================================================

    /// Place a market order for `policy` from treasury holdings.
    ///
    /// Orders paying out the policy's denomination are funded from its
    /// balance, which drops by the amount escrowed.
    pub fn create_order(
        &mut self,
        ledger: &mut AssetLedger,
        market: &mut Market,
        now: DateTime<Utc>,
        policy: PolicyId,
        order: OrderRequest,
    ) -> Result<OfferId> {
        let pe = self
            .policies
            .get(&policy)
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))?;
        let funded_by_policy = pe.asset == order.pay_asset;
        if funded_by_policy {
            if order.pay_amount > pe.balance {
                return Err(RiskpoolError::ExceedsPolicyBalance {
                    requested: order.pay_amount,
                    balance: pe.balance,
                });
            }
            let real = self.get_economics(&order.pay_asset).real_balance;
            if order.pay_amount > real {
                return Err(RiskpoolError::InsufficientBalance {
                    needed: order.pay_amount,
                    available: real,
                });
            }
        }

        let allowance = ledger.allowance(self.account, market.account(), &order.pay_asset);
        ledger.approve(
            self.account,
            market.account(),
            &order.pay_asset,
            checked_add(allowance, order.pay_amount, "market allowance")?,
        );
        let observer = OfferObserver {
            policy,
            tranche: order.tranche,
            kind: order.kind,
        };
        let placement = market.place(
            ledger,
            now,
            NewOffer::new(
                self.account,
                order.pay_amount,
                order.pay_asset.clone(),
                order.buy_amount,
                order.buy_asset.clone(),
            )
            .with_observer(observer),
        )?;

        if funded_by_policy {
            self.debit_policy_funds(policy, order.pay_amount)?;
            // A remainder that rests is reported by no closure, so its
            // rounding refund is credited back here.
            if placement.resting > 0 && placement.refunded > 0 {
                self.credit_policy_funds(ledger, policy, placement.refunded)?;
            }
        }
        tracing::info!(
            policy = %policy,
            tranche = order.tranche,
            kind = %order.kind,
            offer = %placement.id,
            pay_asset = %order.pay_asset,
            pay_amount = order.pay_amount,
            buy_asset = %order.buy_asset,
            buy_amount = order.buy_amount,
            "treasury order placed"
        );
        Ok(placement.id)
    }

    /// Cancel an order previously placed for `policy`.
    pub fn cancel_order(
        &mut self,
        ledger: &mut AssetLedger,
        market: &mut Market,
        roles: &dyn RoleOracle,
        now: DateTime<Utc>,
        policy: PolicyId,
        offer: OfferId,
    ) -> Result<()> {
        let placed_for = market
            .get_offer(offer)
            .ok_or(RiskpoolError::OfferNotActive(offer))?
            .observer
            .map(|o| o.policy);
        if placed_for != Some(policy) {
            return Err(RiskpoolError::unauthorized(format!(
                "{offer} was not placed for {policy}"
            )));
        }
        market.cancel(ledger, roles, now, self.account, offer)
    }

    /// Book the treasury side of an observed market event.
    ///
    /// Sale proceeds become policy income; buyback escrow that comes back
    /// is returned to the policy balance.
    pub fn on_market_event(&mut self, ledger: &mut AssetLedger, event: &MarketEvent) -> Result<()> {
        let policy = event.observer().policy;
        let Some(asset) = self.policies.get(&policy).map(|pe| pe.asset.clone()) else {
            return Err(RiskpoolError::PolicyNotRegistered(policy));
        };
        match event {
            MarketEvent::Trade(t)
                if t.owner == self.account
                    && t.observer.kind == ObserverKind::TrancheSale
                    && t.got_asset == asset =>
            {
                self.credit_policy_funds(ledger, policy, t.got_amount)?;
            }
            MarketEvent::Closure(c)
                if c.owner == self.account
                    && c.observer.kind == ObserverKind::Buyback
                    && c.refunded_asset == asset
                    && c.refunded_amount > 0 =>
            {
                self.credit_policy_funds(ledger, policy, c.refunded_amount)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn credit_policy_funds(&mut self, ledger: &mut AssetLedger, policy: PolicyId, amount: u128) -> Result<()> {
        let asset = self
            .policies
            .get(&policy)
            .map(|pe| pe.asset.clone())
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))?;
        self.inc_policy_balance(policy, amount)?;
        self.record_receipt(ledger, &asset, amount)?;
        Ok(())
    }

    fn debit_policy_funds(&mut self, policy: PolicyId, amount: u128) -> Result<()> {
        let pe = self
            .policies
            .get_mut(&policy)
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))?;
        let eco = self.economics.entry(pe.asset.clone()).or_default();
        let balance = checked_sub(pe.balance, amount, "policy balance")?;
        let virtual_balance = checked_sub(eco.virtual_balance, amount, "virtual balance")?;
        let real = checked_sub(eco.real_balance, amount, "real balance")?;
        pe.balance = balance;
        eco.virtual_balance = virtual_balance;
        eco.real_balance = real;
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Economics of `asset` (all zero if never used).
    #[must_use]
    pub fn get_economics(&self, asset: &str) -> Economics {
        self.economics.get(asset).cloned().unwrap_or_default()
    }

    pub fn get_policy_economics(&self, policy: PolicyId) -> Result<&PolicyEconomics> {
        self.policies
            .get(&policy)
            .ok_or(RiskpoolError::PolicyNotRegistered(policy))
    }

    #[must_use]
    pub fn get_claims(&self, asset: &str) -> ClaimsSummary {
        self.queues
            .get(asset)
            .map(ClaimsQueue::summary)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_claim(&self, asset: &str, index: usize) -> Option<&TreasuryClaim> {
        self.queues.get(asset)?.get(index)
    }

    /// Assets with economics, in symbol order.
    pub fn assets(&self) -> impl Iterator<Item = (&Asset, &Economics)> {
        self.economics.iter()
    }

    pub fn policies(&self) -> impl Iterator<Item = (&PolicyId, &PolicyEconomics)> {
        self.policies.iter()
    }

    pub(crate) fn queue(&self, asset: &str) -> Option<&ClaimsQueue> {
        self.queues.get(asset)
    }
}

#[cfg(test)]
mod tests {
    use riskpool_types::{MarketConfig, fixtures};

    use super::*;

    const DAI: &str = "DAI";

    fn setup() -> (Treasury, AssetLedger) {
        (Treasury::new(EntityId::new(), AccountId::new()), AssetLedger::new())
    }

    /// Register a policy and back `amount` of its balance with real funds.
    fn funded_policy(t: &mut Treasury, ledger: &mut AssetLedger, amount: u128) -> PolicyId {
        let policy = PolicyId::new();
        t.register_policy(policy, DAI).unwrap();
        t.inc_policy_balance(policy, amount).unwrap();
        if amount > 0 {
            ledger.mint(t.account(), DAI, amount).unwrap();
            t.record_receipt(ledger, DAI, amount).unwrap();
        }
        policy
    }

    #[test]
    fn inc_policy_balance_is_virtual_only() {
        let (mut t, _) = setup();
        let policy = PolicyId::new();
        t.register_policy(policy, DAI).unwrap();
        t.inc_policy_balance(policy, 50).unwrap();
        let eco = t.get_economics(DAI);
        assert_eq!((eco.virtual_balance, eco.real_balance), (50, 0));
        assert_eq!(t.get_policy_economics(policy).unwrap().balance, 50);
    }

    #[test]
    fn unregistered_policy_rejected() {
        let (mut t, _) = setup();
        let stranger = PolicyId::new();
        assert_eq!(
            t.inc_policy_balance(stranger, 1).unwrap_err(),
            RiskpoolError::PolicyNotRegistered(stranger)
        );
        let policy = PolicyId::new();
        t.register_policy(policy, DAI).unwrap();
        assert!(matches!(
            t.register_policy(policy, DAI),
            Err(RiskpoolError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn min_balance_set_once() {
        let (mut t, _) = setup();
        let policy = PolicyId::new();
        t.register_policy(policy, DAI).unwrap();
        t.set_min_policy_balance(policy, 10).unwrap();
        assert_eq!(
            t.set_min_policy_balance(policy, 20).unwrap_err(),
            RiskpoolError::MinBalanceAlreadySet(policy)
        );
        assert_eq!(t.get_economics(DAI).min_balance, 10);
    }

    #[test]
    fn claim_paid_immediately_when_funded() {
        let (mut t, mut ledger) = setup();
        let policy = funded_policy(&mut t, &mut ledger, 100);
        let recipient = AccountId::new();
        assert_eq!(t.pay_claim(&mut ledger, policy, recipient, 40).unwrap(), ClaimPayment::Paid);
        assert_eq!(ledger.balance_of(recipient, DAI), 40);
        let eco = t.get_economics(DAI);
        assert_eq!((eco.real_balance, eco.virtual_balance), (60, 60));
        assert_eq!(t.get_claims(DAI).count, 1);
    }

    #[test]
    fn claim_above_policy_balance_rejected() {
        let (mut t, mut ledger) = setup();
        let policy = funded_policy(&mut t, &mut ledger, 10);
        assert_eq!(
            t.pay_claim(&mut ledger, policy, AccountId::new(), 11).unwrap_err(),
            RiskpoolError::ExceedsPolicyBalance {
                requested: 11,
                balance: 10
            }
        );
    }

    #[test]
    fn claims_ordering_is_fifo() {
        let (mut t, mut ledger) = setup();
        let a = funded_policy(&mut t, &mut ledger, 0);
        let b = funded_policy(&mut t, &mut ledger, 0);
        t.inc_policy_balance(a, 1).unwrap();
        t.inc_policy_balance(b, 1).unwrap();
        ledger.mint(t.account(), DAI, 1).unwrap();
        t.record_receipt(&mut ledger, DAI, 1).unwrap();

        let (ra, rb) = (AccountId::new(), AccountId::new());
        assert_eq!(t.pay_claim(&mut ledger, a, ra, 1).unwrap(), ClaimPayment::Paid);
        assert_eq!(t.pay_claim(&mut ledger, b, rb, 1).unwrap(), ClaimPayment::Queued(1));
        let claims = t.get_claims(DAI);
        assert_eq!((claims.count, claims.unpaid_count, claims.unpaid_total), (2, 1, 1));
        assert_eq!(t.get_policy_economics(b).unwrap().claims_unpaid_total, 1);

        // Funds arrive: the queued claim drains.
        let topup = AccountId::new();
        ledger.mint(topup, DAI, 1).unwrap();
        t.transfer_in(&mut ledger, topup, DAI, 1).unwrap();
        assert_eq!(ledger.balance_of(rb, DAI), 1);
        assert_eq!(t.get_claims(DAI).unpaid_total, 0);
        assert_eq!(t.get_policy_economics(b).unwrap().claims_unpaid_total, 0);
    }

    #[test]
    fn smaller_later_claim_waits_behind_head() {
        let (mut t, mut ledger) = setup();
        let policy = PolicyId::new();
        t.register_policy(policy, DAI).unwrap();
        t.inc_policy_balance(policy, 100).unwrap();
        let (first, second) = (AccountId::new(), AccountId::new());
        assert_eq!(t.pay_claim(&mut ledger, policy, first, 50).unwrap(), ClaimPayment::Queued(0));
        assert_eq!(t.pay_claim(&mut ledger, policy, second, 5).unwrap(), ClaimPayment::Queued(1));

        ledger.mint(t.account(), DAI, 10).unwrap();
        assert_eq!(t.record_receipt(&mut ledger, DAI, 10).unwrap(), 0);
        assert_eq!(ledger.balance_of(second, DAI), 0);

        ledger.mint(t.account(), DAI, 45).unwrap();
        assert_eq!(t.record_receipt(&mut ledger, DAI, 45).unwrap(), 2);
        assert_eq!(ledger.balance_of(first, DAI), 50);
        assert_eq!(ledger.balance_of(second, DAI), 5);
        assert!(t.queue(DAI).unwrap().is_fifo_consistent());
    }

    #[test]
    fn transfer_in_capped_at_shortfall() {
        let (mut t, mut ledger) = setup();
        let policy = PolicyId::new();
        t.register_policy(policy, DAI).unwrap();
        t.inc_policy_balance(policy, 30).unwrap();
        let entity = AccountId::new();
        ledger.mint(entity, DAI, 100).unwrap();
        let err = t.transfer_in(&mut ledger, entity, DAI, 31).unwrap_err();
        assert!(err.to_string().contains("exceeds treasury shortfall"));
        t.transfer_in(&mut ledger, entity, DAI, 30).unwrap();
        assert_eq!(t.get_economics(DAI).real_balance, 30);
    }

    #[test]
    fn transfer_out_keeps_min_balance() {
        let (mut t, mut ledger) = setup();
        let policy = funded_policy(&mut t, &mut ledger, 100);
        t.set_min_policy_balance(policy, 70).unwrap();
        let to = AccountId::new();
        let err = t.transfer_out(&mut ledger, to, DAI, 31).unwrap_err();
        assert!(err.to_string().contains("breaches minimum balance"));
        t.transfer_out(&mut ledger, to, DAI, 30).unwrap();
        assert_eq!(ledger.balance_of(to, DAI), 30);
        assert_eq!(t.get_economics(DAI).real_balance, 70);
    }

    #[test]
    fn collateralization_counts_claims_ahead() {
        let (mut t, mut ledger) = setup();
        let a = PolicyId::new();
        let b = PolicyId::new();
        t.register_policy(a, DAI).unwrap();
        t.register_policy(b, DAI).unwrap();
        t.inc_policy_balance(a, 100).unwrap();
        t.inc_policy_balance(b, 100).unwrap();
        t.set_min_policy_balance(b, 20).unwrap();
        t.pay_claim(&mut ledger, a, AccountId::new(), 50).unwrap();
        ledger.mint(t.account(), DAI, 40).unwrap();
        t.record_receipt(&mut ledger, DAI, 40).unwrap();

        // 40 real, 50 queued ahead of b: nothing left for b's floor.
        assert!(!t.is_policy_collateralized(b).unwrap());
        ledger.mint(t.account(), DAI, 30).unwrap();
        t.record_receipt(&mut ledger, DAI, 30).unwrap();
        assert!(t.is_policy_collateralized(b).unwrap());
    }

    #[test]
    fn buyback_order_draws_policy_funds() {
        let (mut t, mut ledger) = setup();
        let policy = funded_policy(&mut t, &mut ledger, 100);
        let mut market = Market::new(AccountId::new(), MarketConfig::default());
        let token = policy.tranche_token(0);
        let order = OrderRequest {
            tranche: 0,
            kind: ObserverKind::Buyback,
            pay_asset: DAI.into(),
            pay_amount: 100,
            buy_asset: token.clone(),
            buy_amount: 10,
        };
        let id = t
            .create_order(&mut ledger, &mut market, fixtures::epoch(), policy, order)
            .unwrap();
        assert!(market.is_active(id));
        assert_eq!(t.get_policy_economics(policy).unwrap().balance, 0);
        assert_eq!(t.get_economics(DAI).real_balance, 0);

        // Cancelling returns the escrow to the policy.
        let acl = riskpool_ledger::AclStore::bootstrap(AccountId::new());
        t.cancel_order(&mut ledger, &mut market, &acl, fixtures::epoch(), policy, id)
            .unwrap();
        for event in market.drain_events() {
            t.on_market_event(&mut ledger, &event).unwrap();
        }
        assert_eq!(t.get_policy_economics(policy).unwrap().balance, 100);
        assert_eq!(t.get_economics(DAI).real_balance, 100);
    }

    #[test]
    fn sale_proceeds_become_policy_income() {
        let (mut t, mut ledger) = setup();
        let policy = PolicyId::new();
        t.register_policy(policy, DAI).unwrap();
        let token = policy.tranche_token(0);
        ledger.mint(t.account(), &token, 10).unwrap();
        let mut market = Market::new(AccountId::new(), MarketConfig::default());
        let order = OrderRequest {
            tranche: 0,
            kind: ObserverKind::TrancheSale,
            pay_asset: token.clone(),
            pay_amount: 10,
            buy_asset: DAI.into(),
            buy_amount: 50,
        };
        let id = t
            .create_order(&mut ledger, &mut market, fixtures::epoch(), policy, order)
            .unwrap();

        let buyer = AccountId::new();
        ledger.mint(buyer, DAI, 50).unwrap();
        ledger.approve(buyer, market.account(), DAI, 50);
        market.buy(&mut ledger, fixtures::epoch(), buyer, id, 10).unwrap();
        for event in market.drain_events() {
            t.on_market_event(&mut ledger, &event).unwrap();
        }
        assert_eq!(t.get_policy_economics(policy).unwrap().balance, 50);
        let eco = t.get_economics(DAI);
        assert_eq!((eco.real_balance, eco.virtual_balance), (50, 50));
        assert_eq!(ledger.balance_of(buyer, &token), 10);
    }

    #[test]
    fn cancel_order_checks_policy() {
        let (mut t, mut ledger) = setup();
        let policy = funded_policy(&mut t, &mut ledger, 10);
        let other = PolicyId::new();
        t.register_policy(other, DAI).unwrap();
        let mut market = Market::new(AccountId::new(), MarketConfig::default());
        let order = OrderRequest {
            tranche: 0,
            kind: ObserverKind::Buyback,
            pay_asset: DAI.into(),
            pay_amount: 10,
            buy_asset: "TOKEN".into(),
            buy_amount: 1,
        };
        let id = t
            .create_order(&mut ledger, &mut market, fixtures::epoch(), policy, order)
            .unwrap();
        let acl = riskpool_ledger::AclStore::bootstrap(AccountId::new());
        assert!(matches!(
            t.cancel_order(&mut ledger, &mut market, &acl, fixtures::epoch(), other, id),
            Err(RiskpoolError::Unauthorized { .. })
        ));
    }
}
