//! A single-policy world for unit tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use riskpool_ledger::{AclStore, AssetLedger};
use riskpool_market::Market;
use riskpool_treasury::{Treasury, TreasuryAudit};
use riskpool_types::{
    AccountId, EntityId, MarketConfig, PolicyId, PolicyLimits, PolicyRole, PolicyTerms, Result,
    Role, RoleContext, TrancheSpec, PremiumEntry, fixtures,
};

use crate::{DispatchTable, Environment, Policy, PolicyEnvironment};

pub const DAI: &str = "DAI";

pub struct World {
    pub now: DateTime<Utc>,
    pub ledger: AssetLedger,
    pub market: Market,
    pub treasury: Treasury,
    pub acl: AclStore,
    pub facets: DispatchTable,
    pub accounts: BTreeMap<EntityId, AccountId>,
    pub fee_bank: AccountId,
    pub admin: AccountId,
    pub owner: AccountId,
    pub reps: BTreeMap<PolicyRole, AccountId>,
    pub policy: Policy,
}

impl World {
    /// Dates `[100, 200, 300]`, no commissions, nothing created yet.
    pub fn new() -> Self {
        let terms = fixtures::terms(DAI, fixtures::dates([100, 200, 300]), fixtures::parties());
        Self::with_terms(terms)
    }

    pub fn with_terms(terms: PolicyTerms) -> Self {
        let admin = AccountId::new();
        let owner = AccountId::new();
        let mut acl = AclStore::bootstrap(admin);
        let owner_entity = EntityId::new();
        let policy_id = PolicyId::new();
        acl.grant(RoleContext::Policy(policy_id), owner, Role::PolicyOwner);

        let mut accounts = BTreeMap::new();
        accounts.insert(owner_entity, AccountId::new());
        let mut reps = BTreeMap::new();
        for role in [
            PolicyRole::Underwriter,
            PolicyRole::Broker,
            PolicyRole::InsuredParty,
            PolicyRole::ClaimsAdmin,
        ] {
            if let Some(entity) = terms.parties.entity_for(role) {
                let rep = AccountId::new();
                acl.grant(RoleContext::Entity(entity), rep, Role::EntityRep);
                accounts.insert(entity, AccountId::new());
                reps.insert(role, rep);
            }
        }

        let mut treasury = Treasury::new(owner_entity, AccountId::new());
        treasury.register_policy(policy_id, &terms.unit).unwrap();
        let policy = Policy::new(policy_id, AccountId::new(), owner_entity, terms, PolicyLimits::default()).unwrap();

        Self {
            now: fixtures::epoch(),
            ledger: AssetLedger::new(),
            market: Market::new(AccountId::new(), MarketConfig::default()),
            treasury,
            acl,
            facets: DispatchTable::default(),
            accounts,
            fee_bank: AccountId::new(),
            admin,
            owner,
            reps,
            policy,
        }
    }

    pub fn rep(&self, role: PolicyRole) -> AccountId {
        self.reps[&role]
    }

    /// Run `op` against the policy, then route market events.
    pub fn run<T>(&mut self, op: impl FnOnce(&mut Policy, &mut dyn PolicyEnvironment) -> Result<T>) -> Result<T> {
        let mut env = Environment {
            now: self.now,
            ledger: &mut self.ledger,
            market: &mut self.market,
            treasury: &mut self.treasury,
            roles: &self.acl,
            facets: &self.facets,
            accounts: &self.accounts,
            fee_bank: self.fee_bank,
        };
        let out = op(&mut self.policy, &mut env)?;
        for event in self.market.drain_events() {
            self.treasury.on_market_event(&mut self.ledger, &event)?;
            self.policy.on_market_event(&event)?;
        }
        Ok(out)
    }

    pub fn heartbeat(&mut self) -> Result<bool> {
        self.run(|p, env| p.check_and_update_state(env))
    }

    pub fn at(&mut self, secs: i64) -> &mut Self {
        self.now = fixtures::at(secs);
        self
    }

    /// Add a treasury-held tranche of 100 shares at 2 DAI with premiums
    /// due every 50 seconds from t=50.
    pub fn add_tranche(&mut self, premiums: &[u128]) -> usize {
        let spec = TrancheSpec {
            num_shares: 100,
            price_per_share: 2,
            denomination: DAI.into(),
            premiums: PremiumEntry::schedule(premiums, fixtures::at(50), chrono::Duration::seconds(50)),
            initial_holder: None,
        };
        let owner = self.owner;
        self.run(|p, env| p.create_tranche(env, owner, &spec)).unwrap()
    }

    /// Collect every required approval.
    pub fn approve_all(&mut self) {
        let owner = self.owner;
        self.run(|p, env| p.mark_ready_for_approval(env, owner)).unwrap();
        let required = self.policy.terms.policy_type.required_approvals();
        for role in required {
            let rep = self.rep(*role);
            self.run(|p, env| p.approve(env, rep, *role)).unwrap();
        }
    }

    /// A funded account that has approved the policy account for premiums.
    pub fn payer(&mut self, amount: u128) -> AccountId {
        let payer = AccountId::new();
        self.ledger.mint(payer, DAI, amount).unwrap();
        self.ledger.approve(payer, self.policy.account, DAI, amount);
        payer
    }

    pub fn pay(&mut self, payer: AccountId, tranche: usize, amount: u128) -> Result<usize> {
        self.run(|p, env| p.pay_premium(env, payer, tranche, amount))
    }

    /// Buy `shares` of the tranche's sale offer with a fresh investor.
    pub fn invest(&mut self, tranche: usize, shares: u128) -> AccountId {
        let investor = AccountId::new();
        let offer = self.policy.tranches[tranche].initial_sale_offer.unwrap();
        let price = self.policy.tranches[tranche].price_per_share;
        self.ledger.mint(investor, DAI, shares * price).unwrap();
        self.ledger.approve(investor, self.market.account(), DAI, shares * price);
        let now = self.now;
        let (ledger, market) = (&mut self.ledger, &mut self.market);
        market.buy(ledger, now, investor, offer, shares).unwrap();
        for event in self.market.drain_events() {
            self.treasury.on_market_event(&mut self.ledger, &event).unwrap();
            self.policy.on_market_event(&event).unwrap();
        }
        investor
    }

    /// One tranche with premiums of 10 due at t=50, 100, 150 and 200, all
    /// paid on time, fully sold to one investor. Returns at t=200 with the
    /// policy active and a tranche balance of 240.
    pub fn activated() -> (Self, AccountId) {
        let mut w = Self::new();
        w.add_tranche(&[10, 10, 10, 10]);
        w.approve_all();
        let payer = w.payer(40);
        w.pay(payer, 0, 10).unwrap();
        w.at(100).heartbeat().unwrap();
        w.pay(payer, 0, 10).unwrap();
        let investor = w.invest(0, 100);
        w.at(150).pay(payer, 0, 10).unwrap();
        w.at(200).heartbeat().unwrap();
        w.pay(payer, 0, 10).unwrap();
        (w, investor)
    }

    pub fn assert_treasury_consistent(&self) {
        TreasuryAudit::run(&self.treasury, &self.ledger).into_result().unwrap();
    }
}
