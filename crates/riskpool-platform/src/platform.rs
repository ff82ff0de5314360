//! The platform facade.
//!
//! [`Platform`] owns every component: the asset ledger, the role store, the
//! market, the entity registry with one treasury per entity, and all
//! policies. Each public mutating operation is atomic: the state is
//! snapshotted first, market events the operation caused are routed to the
//! owning treasury and policy, the treasuries are audited, and any error
//! along the way restores the snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use riskpool_ledger::{AclStore, AssetLedger};
use riskpool_market::{DepthLevel, Fill, Market, NewOffer};
use riskpool_policy::{DispatchTable, Environment, Facet, Policy, PolicyEnvironment};
use riskpool_treasury::{Treasury, TreasuryAudit};
use riskpool_types::{
    AccountId, BasisPoints, ClaimPayment, ClaimStats, ClaimsSummary, CommissionBalances,
    Economics, EntityId, Offer, OfferId, PlatformConfig, PolicyEconomics, PolicyId, PolicyInfo,
    PolicyRole, PolicyTerms, PremiumInfo, Result, RiskpoolError, Role, RoleContext, RoleOracle,
    TrancheInfo, TrancheSpec, constants,
};

use crate::entity::{Entity, EntityRegistry};

/// A complete Riskpool instance.
#[derive(Debug, Clone)]
pub struct Platform {
    config: PlatformConfig,
    now: DateTime<Utc>,
    ledger: AssetLedger,
    acl: AclStore,
    market: Market,
    entities: EntityRegistry,
    treasuries: BTreeMap<EntityId, Treasury>,
    policies: BTreeMap<PolicyId, Policy>,
    facets: DispatchTable,
    fee_bank: AccountId,
}

impl Platform {
    /// Build a platform with `admin` as its first system admin.
    pub fn new(config: PlatformConfig, admin: AccountId, now: DateTime<Utc>) -> Result<Self> {
        config.validate()?;
        let market = Market::new(AccountId::new(), config.market.clone());
        tracing::info!(
            admin = %admin,
            market = %market.account(),
            protocol_commission_bp = config.protocol_commission_bp,
            "platform started"
        );
        Ok(Self {
            now,
            ledger: AssetLedger::new(),
            acl: AclStore::bootstrap(admin),
            market,
            entities: EntityRegistry::new(),
            treasuries: BTreeMap::new(),
            policies: BTreeMap::new(),
            facets: DispatchTable::new(),
            fee_bank: AccountId::new(),
            config,
        })
    }

    /// [`Platform::new`] with configuration parsed from JSON.
    pub fn from_config_json(json: &str, admin: AccountId, now: DateTime<Utc>) -> Result<Self> {
        Self::new(PlatformConfig::from_json_str(json)?, admin, now)
    }

    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    // =================================================================
    // Clock
    // =================================================================

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Move the block clock to `now`. Time never runs backwards.
    pub fn set_time(&mut self, now: DateTime<Utc>) -> Result<()> {
        if now < self.now {
            return Err(RiskpoolError::ClockRewind);
        }
        self.now = now;
        Ok(())
    }

    pub fn advance(&mut self, by: Duration) -> Result<()> {
        self.set_time(self.now + by)
    }

    // =================================================================
    // Roles and assets
    // =================================================================

    #[must_use]
    pub fn roles(&self) -> &AclStore {
        &self.acl
    }

    pub fn assign_role(&mut self, caller: AccountId, context: RoleContext, principal: AccountId, role: Role) -> Result<()> {
        self.atomically("assign_role", |p| p.acl.assign_role(caller, context, principal, role))
    }

    pub fn unassign_role(&mut self, caller: AccountId, context: RoleContext, principal: AccountId, role: Role) -> Result<()> {
        self.atomically("unassign_role", |p| p.acl.unassign_role(caller, context, principal, role))
    }

    /// Mint `amount` of `asset` to `to`. System admins only.
    pub fn issue(&mut self, caller: AccountId, to: AccountId, asset: &str, amount: u128) -> Result<()> {
        self.atomically("issue", |p| {
            if !p.acl.is_system_admin(caller) {
                return Err(RiskpoolError::unauthorized("must be system admin"));
            }
            p.ledger.mint(to, asset, amount)
        })
    }

    /// Burn `amount` of the caller's own `asset`.
    pub fn redeem(&mut self, caller: AccountId, asset: &str, amount: u128) -> Result<()> {
        self.atomically("redeem", |p| p.ledger.burn(caller, asset, amount))
    }

    pub fn transfer(&mut self, caller: AccountId, to: AccountId, asset: &str, amount: u128) -> Result<()> {
        self.atomically("transfer", |p| p.ledger.transfer(caller, to, asset, amount))
    }

    pub fn approve(&mut self, caller: AccountId, spender: AccountId, asset: &str, amount: u128) {
        self.ledger.approve(caller, spender, asset, amount);
    }

    #[must_use]
    pub fn balance_of(&self, owner: AccountId, asset: &str) -> u128 {
        self.ledger.balance_of(owner, asset)
    }

    #[must_use]
    pub fn allowance(&self, owner: AccountId, spender: AccountId, asset: &str) -> u128 {
        self.ledger.allowance(owner, spender, asset)
    }

    #[must_use]
    pub fn total_supply(&self, asset: &str) -> u128 {
        self.ledger.total_supply(asset)
    }

    #[must_use]
    pub fn fee_bank(&self) -> AccountId {
        self.fee_bank
    }

    // =================================================================
    // Entities
    // =================================================================

    /// Register an entity with its own treasury. System admins and
    /// managers only.
    pub fn create_entity(&mut self, caller: AccountId, admin: AccountId) -> Result<EntityId> {
        self.atomically("create_entity", |p| {
            if !p
                .acl
                .has_any_role(RoleContext::System, caller, &[Role::SystemAdmin, Role::SystemManager])
            {
                return Err(RiskpoolError::unauthorized("must be system admin or manager"));
            }
            let entity = p.entities.register(admin).clone();
            p.treasuries
                .insert(entity.id, Treasury::new(entity.id, entity.treasury_account));
            p.acl.grant(RoleContext::Entity(entity.id), admin, Role::EntityAdmin);
            Ok(entity.id)
        })
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Move the caller's funds into the entity account.
    pub fn deposit(&mut self, caller: AccountId, entity: EntityId, asset: &str, amount: u128) -> Result<()> {
        self.atomically("deposit", |p| {
            nonzero(amount)?;
            let account = p.entities.get(entity)?.account;
            p.ledger.transfer(caller, account, asset, amount)?;
            tracing::info!(entity = %entity, caller = %caller, asset, amount, "entity deposit");
            Ok(())
        })
    }

    /// Move entity funds to the calling representative.
    pub fn withdraw(&mut self, caller: AccountId, entity: EntityId, asset: &str, amount: u128) -> Result<()> {
        self.atomically("withdraw", |p| {
            nonzero(amount)?;
            let account = p.entity_for_rep(caller, entity)?.account;
            p.ledger.transfer(account, caller, asset, amount)?;
            tracing::info!(entity = %entity, caller = %caller, asset, amount, "entity withdrawal");
            Ok(())
        })
    }

    /// Fund the entity's treasury from the entity account, up to its
    /// shortfall.
    pub fn transfer_to_treasury(&mut self, caller: AccountId, entity: EntityId, asset: &str, amount: u128) -> Result<()> {
        self.atomically("transfer_to_treasury", |p| {
            let account = p.entity_for_rep(caller, entity)?.account;
            let treasury = p
                .treasuries
                .get_mut(&entity)
                .ok_or(RiskpoolError::EntityNotFound(entity))?;
            treasury.transfer_in(&mut p.ledger, account, asset, amount)
        })
    }

    /// Return treasury funds to the entity account without breaching the
    /// reserved minimum.
    pub fn transfer_from_treasury(&mut self, caller: AccountId, entity: EntityId, asset: &str, amount: u128) -> Result<()> {
        self.atomically("transfer_from_treasury", |p| {
            let account = p.entity_for_rep(caller, entity)?.account;
            let treasury = p
                .treasuries
                .get_mut(&entity)
                .ok_or(RiskpoolError::EntityNotFound(entity))?;
            treasury.transfer_out(&mut p.ledger, account, asset, amount)
        })
    }

    pub fn get_balance(&self, entity: EntityId, asset: &str) -> Result<u128> {
        Ok(self.ledger.balance_of(self.entities.get(entity)?.account, asset))
    }

    // =================================================================
    // Treasuries
    // =================================================================

    pub fn treasury(&self, entity: EntityId) -> Result<&Treasury> {
        self.treasuries
            .get(&entity)
            .ok_or(RiskpoolError::EntityNotFound(entity))
    }

    pub fn get_economics(&self, entity: EntityId, asset: &str) -> Result<Economics> {
        Ok(self.treasury(entity)?.get_economics(asset))
    }

    pub fn get_policy_economics(&self, policy: PolicyId) -> Result<PolicyEconomics> {
        self.treasury_of(policy)?
            .get_policy_economics(policy)
            .cloned()
    }

    pub fn get_claims(&self, entity: EntityId, asset: &str) -> Result<ClaimsSummary> {
        Ok(self.treasury(entity)?.get_claims(asset))
    }

    pub fn is_policy_collateralized(&self, policy: PolicyId) -> Result<bool> {
        self.treasury_of(policy)?.is_policy_collateralized(policy)
    }

    /// Check every treasury's books against the ledger.
    pub fn audit(&self) -> Result<()> {
        for treasury in self.treasuries.values() {
            TreasuryAudit::run(treasury, &self.ledger).into_result()?;
        }
        Ok(())
    }

    // =================================================================
    // Market
    // =================================================================

    #[must_use]
    pub fn market_account(&self) -> AccountId {
        self.market.account()
    }

    /// Offer `pay_amount` of `pay_asset` for `buy_amount` of `buy_asset`.
    /// The caller must have approved the market account for the pay amount.
    pub fn offer(
        &mut self,
        caller: AccountId,
        pay_amount: u128,
        pay_asset: &str,
        buy_amount: u128,
        buy_asset: &str,
    ) -> Result<OfferId> {
        self.atomically("offer", |p| {
            let req = NewOffer::new(caller, pay_amount, pay_asset, buy_amount, buy_asset);
            p.market.offer(&mut p.ledger, p.now, req)
        })
    }

    pub fn buy(&mut self, caller: AccountId, offer: OfferId, quantity: u128) -> Result<Fill> {
        self.atomically("buy", |p| p.market.buy(&mut p.ledger, p.now, caller, offer, quantity))
    }

    pub fn cancel(&mut self, caller: AccountId, offer: OfferId) -> Result<()> {
        self.atomically("cancel", |p| {
            p.market.cancel(&mut p.ledger, &p.acl, p.now, caller, offer)
        })
    }

    pub fn sell_all_amount(
        &mut self,
        caller: AccountId,
        pay_asset: &str,
        pay_amount: u128,
        buy_asset: &str,
        min_fill: u128,
    ) -> Result<u128> {
        self.atomically("sell_all_amount", |p| {
            p.market.sell_all_amount(
                &mut p.ledger,
                p.now,
                caller,
                pay_asset,
                pay_amount,
                buy_asset,
                min_fill,
            )
        })
    }

    #[must_use]
    pub fn is_active(&self, offer: OfferId) -> bool {
        self.market.is_active(offer)
    }

    #[must_use]
    pub fn get_offer(&self, offer: OfferId) -> Option<&Offer> {
        self.market.get_offer(offer)
    }

    #[must_use]
    pub fn get_owner(&self, offer: OfferId) -> Option<AccountId> {
        self.market.get_owner(offer)
    }

    #[must_use]
    pub fn best_offer(&self, pay_asset: &str, buy_asset: &str) -> Option<OfferId> {
        self.market.best_offer(pay_asset, buy_asset)
    }

    #[must_use]
    pub fn depth(&self, pay_asset: &str, buy_asset: &str) -> Vec<DepthLevel> {
        self.market.depth(pay_asset, buy_asset)
    }

    // =================================================================
    // Policies
    // =================================================================

    /// Create a policy owned by `entity`'s treasury. The caller must
    /// represent the entity and becomes the policy owner. The protocol
    /// commission rate comes from configuration.
    pub fn create_policy(&mut self, caller: AccountId, entity: EntityId, mut terms: PolicyTerms) -> Result<PolicyId> {
        self.atomically("create_policy", |p| {
            p.entity_for_rep(caller, entity)?;
            terms.commissions.protocol = BasisPoints(p.config.protocol_commission_bp);
            let id = PolicyId::new();
            let policy = Policy::new(id, AccountId::new(), entity, terms, p.config.policy)?;
            p.treasury_mut(entity)?.register_policy(id, &policy.terms().unit)?;
            p.acl.grant(RoleContext::Policy(id), caller, Role::PolicyOwner);
            p.policies.insert(id, policy);
            Ok(id)
        })
    }

    pub fn create_tranche(&mut self, caller: AccountId, policy: PolicyId, spec: &TrancheSpec) -> Result<usize> {
        self.with_policy("create_tranche", policy, |pol, env| pol.create_tranche(env, caller, spec))
    }

    pub fn mark_ready_for_approval(&mut self, caller: AccountId, policy: PolicyId) -> Result<()> {
        self.with_policy("mark_ready_for_approval", policy, |pol, env| {
            pol.mark_ready_for_approval(env, caller)
        })
    }

    pub fn approve_policy(&mut self, caller: AccountId, policy: PolicyId, role: PolicyRole) -> Result<()> {
        self.with_policy("approve_policy", policy, |pol, env| pol.approve(env, caller, role))
    }

    pub fn set_min_policy_balance(&mut self, caller: AccountId, policy: PolicyId, amount: u128) -> Result<()> {
        self.with_policy("set_min_policy_balance", policy, |pol, env| {
            pol.set_min_balance(env, caller, amount)
        })
    }

    /// Pay a premium from the caller's funds. The caller must have approved
    /// the policy account for `amount`.
    pub fn pay_premium(&mut self, caller: AccountId, policy: PolicyId, tranche: usize, amount: u128) -> Result<usize> {
        self.with_policy("pay_premium", policy, |pol, env| {
            pol.pay_premium(env, caller, tranche, amount)
        })
    }

    pub fn pay_commissions(&mut self, policy: PolicyId) -> Result<CommissionBalances> {
        self.with_policy("pay_commissions", policy, |pol, env| pol.pay_commissions(env))
    }

    pub fn make_claim(&mut self, caller: AccountId, policy: PolicyId, tranche: usize, amount: u128) -> Result<usize> {
        self.with_policy("make_claim", policy, |pol, env| pol.make_claim(env, caller, tranche, amount))
    }

    pub fn dispute_claim(&mut self, caller: AccountId, policy: PolicyId, claim: usize) -> Result<()> {
        self.with_policy("dispute_claim", policy, |pol, env| pol.dispute_claim(env, caller, claim))
    }

    pub fn undispute_claim(&mut self, caller: AccountId, policy: PolicyId, claim: usize) -> Result<()> {
        self.with_policy("undispute_claim", policy, |pol, env| pol.undispute_claim(env, caller, claim))
    }

    pub fn acknowledge_claim(&mut self, caller: AccountId, policy: PolicyId, claim: usize) -> Result<()> {
        self.with_policy("acknowledge_claim", policy, |pol, env| pol.acknowledge_claim(env, caller, claim))
    }

    pub fn approve_claim(&mut self, caller: AccountId, policy: PolicyId, claim: usize) -> Result<()> {
        self.with_policy("approve_claim", policy, |pol, env| pol.approve_claim(env, caller, claim))
    }

    pub fn decline_claim(&mut self, caller: AccountId, policy: PolicyId, claim: usize) -> Result<()> {
        self.with_policy("decline_claim", policy, |pol, env| pol.decline_claim(env, caller, claim))
    }

    pub fn pay_claim(&mut self, caller: AccountId, policy: PolicyId, claim: usize) -> Result<ClaimPayment> {
        self.with_policy("pay_claim", policy, |pol, env| pol.pay_claim(env, caller, claim))
    }

    /// Run the heartbeat for `policy` until it settles.
    ///
    /// Market activity a pass triggers is routed before the next pass, so
    /// an immediately filled sale or buyback is acted on in the same call.
    pub fn check_and_update_state(&mut self, policy: PolicyId) -> Result<bool> {
        self.atomically("check_and_update_state", |p| {
            let mut changed = false;
            for _ in 0..constants::MAX_HEARTBEAT_ROUNDS {
                let moved = p.run_policy(policy, |pol, env| pol.check_and_update_state(env))?;
                let had_events = p.market.pending_events() > 0;
                p.route_events()?;
                changed |= moved;
                if !moved && !had_events {
                    break;
                }
            }
            Ok(changed)
        })
    }

    /// Heartbeat every policy. Returns how many changed.
    ///
    /// Each policy is advanced atomically on its own; one that fails is
    /// rolled back and logged, and the rest still run.
    pub fn heartbeat_all(&mut self) -> usize {
        let ids: Vec<PolicyId> = self.policies.keys().copied().collect();
        let mut changed = 0;
        for id in ids {
            match self.check_and_update_state(id) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(policy = %id, error = %e, "heartbeat failed"),
            }
        }
        changed
    }

    pub fn policy(&self, id: PolicyId) -> Result<&Policy> {
        self.policies.get(&id).ok_or(RiskpoolError::PolicyNotFound(id))
    }

    pub fn policies(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values()
    }

    pub fn policy_info(&self, id: PolicyId) -> Result<PolicyInfo> {
        Ok(self.policy(id)?.info())
    }

    pub fn tranche_info(&self, id: PolicyId, tranche: usize) -> Result<TrancheInfo> {
        self.policy(id)?.tranche_info(tranche, self.now)
    }

    pub fn tranche_premium_info(&self, id: PolicyId, tranche: usize, premium: usize) -> Result<PremiumInfo> {
        self.policy(id)?.tranche_premium_info(tranche, premium)
    }

    pub fn commission_balances(&self, id: PolicyId) -> Result<CommissionBalances> {
        Ok(self.policy(id)?.commission_balances())
    }

    pub fn claim_stats(&self, id: PolicyId) -> Result<ClaimStats> {
        Ok(self.policy(id)?.claim_stats())
    }

    // =================================================================
    // Facets
    // =================================================================

    #[must_use]
    pub fn facets(&self) -> &DispatchTable {
        &self.facets
    }

    pub fn upgrade_facet(&mut self, caller: AccountId, facet: Facet, version: u32) -> Result<()> {
        self.atomically("upgrade_facet", |p| p.facets.upgrade(&p.acl, caller, facet, version))
    }

    pub fn freeze_upgrades(&mut self, caller: AccountId) -> Result<()> {
        self.atomically("freeze_upgrades", |p| p.facets.freeze(&p.acl, caller))
    }

    // =================================================================
    // Internals
    // =================================================================

    /// Run `op`, route the market events it caused and audit the
    /// treasuries. Any error restores the state from before the call.
    fn atomically<T>(&mut self, op: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        let result = f(self).and_then(|value| {
            self.route_events()?;
            self.audit()?;
            Ok(value)
        });
        if let Err(err) = &result {
            tracing::warn!(op, error = %err, "operation rolled back");
            *self = snapshot;
        }
        result
    }

    fn with_policy<T>(
        &mut self,
        op: &'static str,
        policy: PolicyId,
        f: impl FnOnce(&mut Policy, &mut dyn PolicyEnvironment) -> Result<T>,
    ) -> Result<T> {
        self.atomically(op, |p| p.run_policy(policy, f))
    }

    fn run_policy<T>(
        &mut self,
        id: PolicyId,
        f: impl FnOnce(&mut Policy, &mut dyn PolicyEnvironment) -> Result<T>,
    ) -> Result<T> {
        let policy = self
            .policies
            .get_mut(&id)
            .ok_or(RiskpoolError::PolicyNotFound(id))?;
        let owner = policy.owner_entity();
        let treasury = self
            .treasuries
            .get_mut(&owner)
            .ok_or(RiskpoolError::EntityNotFound(owner))?;
        let mut env = Environment {
            now: self.now,
            ledger: &mut self.ledger,
            market: &mut self.market,
            treasury,
            roles: &self.acl,
            facets: &self.facets,
            accounts: &self.entities,
            fee_bank: self.fee_bank,
        };
        f(policy, &mut env)
    }

    /// Deliver queued market events: treasury first, then the policy.
    fn route_events(&mut self) -> Result<()> {
        for event in self.market.drain_events() {
            let id = event.observer().policy;
            let policy = self
                .policies
                .get_mut(&id)
                .ok_or(RiskpoolError::PolicyNotFound(id))?;
            let owner = policy.owner_entity();
            self.treasuries
                .get_mut(&owner)
                .ok_or(RiskpoolError::EntityNotFound(owner))?
                .on_market_event(&mut self.ledger, &event)?;
            policy.on_market_event(&event)?;
        }
        Ok(())
    }

    fn entity_for_rep(&self, caller: AccountId, entity: EntityId) -> Result<&Entity> {
        let found = self.entities.get(entity)?;
        if !self.acl.is_entity_rep(entity, caller) {
            return Err(RiskpoolError::unauthorized("must be entity rep"));
        }
        Ok(found)
    }

    fn treasury_mut(&mut self, entity: EntityId) -> Result<&mut Treasury> {
        self.treasuries
            .get_mut(&entity)
            .ok_or(RiskpoolError::EntityNotFound(entity))
    }

    fn treasury_of(&self, policy: PolicyId) -> Result<&Treasury> {
        self.treasury(self.policy(policy)?.owner_entity())
    }
}

fn nonzero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(RiskpoolError::invalid_amount("amount is zero"));
    }
    Ok(())
}
