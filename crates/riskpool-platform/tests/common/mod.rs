//! Shared platform setup for the integration suites.

#![allow(dead_code)]

use chrono::Duration;
use riskpool_platform::Platform;
use riskpool_types::{
    AccountId, EntityId, PlatformConfig, PolicyId, PolicyParties, PolicyRole, PolicyState,
    PremiumEntry, RiskpoolError, TrancheInfo, TrancheSpec, fixtures,
};

pub const DAI: &str = "DAI";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Setup {
    pub platform: Platform,
    pub admin: AccountId,
    pub insurer: EntityId,
    pub owner: AccountId,
    pub parties: PolicyParties,
    pub reps: Vec<(PolicyRole, AccountId)>,
    pub policy: PolicyId,
    pub payer: AccountId,
}

pub fn new_entity(platform: &mut Platform, admin: AccountId) -> (EntityId, AccountId) {
    let rep = AccountId::new();
    let id = platform.create_entity(admin, rep).expect("entity");
    (id, rep)
}

pub fn setup(config: PlatformConfig) -> Setup {
    init_tracing();
    let admin = AccountId::new();
    let mut platform = Platform::new(config, admin, fixtures::epoch()).expect("platform");
    let (insurer, owner) = new_entity(&mut platform, admin);
    let (underwriter, uw_rep) = new_entity(&mut platform, admin);
    let (broker, broker_rep) = new_entity(&mut platform, admin);
    let (insured, insured_rep) = new_entity(&mut platform, admin);
    let (claims_admin, ca_rep) = new_entity(&mut platform, admin);
    let parties = PolicyParties {
        underwriter,
        broker,
        insured_party: Some(insured),
        claims_admin,
    };
    let terms = fixtures::terms(DAI, fixtures::dates([100, 200, 300]), parties);
    let policy = platform.create_policy(owner, insurer, terms).expect("policy");

    let payer = AccountId::new();
    platform.issue(admin, payer, DAI, 10_000).expect("issue");
    let policy_account = platform.policy(policy).expect("policy").account();
    platform.approve(payer, policy_account, DAI, 10_000);

    Setup {
        platform,
        admin,
        insurer,
        owner,
        parties,
        reps: vec![
            (PolicyRole::Underwriter, uw_rep),
            (PolicyRole::Broker, broker_rep),
            (PolicyRole::InsuredParty, insured_rep),
            (PolicyRole::ClaimsAdmin, ca_rep),
        ],
        policy,
        payer,
    }
}

impl Setup {
    pub fn rep(&self, role: PolicyRole) -> AccountId {
        self.reps
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, a)| *a)
            .expect("rep")
    }

    /// Premiums fall due at t=50 and every 50 seconds after.
    pub fn tranche(&mut self, shares: u128, price: u128, premiums: &[u128]) -> usize {
        let spec = TrancheSpec {
            num_shares: shares,
            price_per_share: price,
            denomination: DAI.into(),
            premiums: PremiumEntry::schedule(premiums, fixtures::at(50), Duration::seconds(50)),
            initial_holder: None,
        };
        self.platform
            .create_tranche(self.owner, self.policy, &spec)
            .expect("tranche")
    }

    pub fn approve_all(&mut self) {
        self.platform
            .mark_ready_for_approval(self.owner, self.policy)
            .expect("ready");
        for (role, rep) in self.reps.clone() {
            self.platform
                .approve_policy(rep, self.policy, role)
                .expect("approve");
        }
    }

    pub fn at(&mut self, secs: i64) -> &mut Self {
        self.platform.set_time(fixtures::at(secs)).expect("clock");
        self
    }

    pub fn heartbeat(&mut self) -> bool {
        self.platform
            .check_and_update_state(self.policy)
            .expect("heartbeat")
    }

    pub fn pay(&mut self, tranche: usize, amount: u128) -> Result<usize, RiskpoolError> {
        self.platform
            .pay_premium(self.payer, self.policy, tranche, amount)
    }

    pub fn info(&self, tranche: usize) -> TrancheInfo {
        self.platform
            .tranche_info(self.policy, tranche)
            .expect("tranche info")
    }

    pub fn state(&self) -> PolicyState {
        self.platform.policy(self.policy).expect("policy").state()
    }

    /// A fresh investor buys `shares` from the tranche's sale offer.
    pub fn invest(&mut self, tranche: usize, shares: u128) -> AccountId {
        let info = self.info(tranche);
        let offer = info.initial_sale_offer_id.expect("listed");
        let cost = shares * info.price_per_share;
        let investor = AccountId::new();
        self.platform.issue(self.admin, investor, DAI, cost).expect("issue");
        let market = self.platform.market_account();
        self.platform.approve(investor, market, DAI, cost);
        self.platform.buy(investor, offer, shares).expect("buy");
        investor
    }

    /// Pay every premium of a single 100 x 2 DAI tranche on time, sell it to
    /// one investor and leave the policy active at t=200 with a tranche
    /// balance of 240.
    pub fn activate_single_tranche(&mut self) -> (usize, AccountId) {
        let a = self.tranche(100, 2, &[10, 10, 10, 10]);
        self.approve_all();
        self.pay(a, 10).expect("premium");
        self.at(100).heartbeat();
        self.pay(a, 10).expect("premium");
        let investor = self.invest(a, 100);
        self.at(150).pay(a, 10).expect("premium");
        self.at(200).heartbeat();
        self.pay(a, 10).expect("premium");
        assert_eq!(self.state(), PolicyState::Active);
        assert_eq!(self.info(a).balance, 240);
        (a, investor)
    }
}
