//! The policy aggregate.
//!
//! A [`Policy`] is created in `Created` state by an entity's treasury owner,
//! collects tranches, goes through approval by its parties and is then
//! driven forward by [`Policy::check_and_update_state`]. Its lifecycle:
//!
//! ```text
//! Created -> ReadyForApproval -> InApproval -> Approved -> Initiated -> Active
//!    |             |                 |            |                      |
//!    +-------------+-----------------+------------+--> Cancelled         v
//!                                                            Matured / Buyback -> Closed
//! ```

use std::collections::BTreeSet;

use riskpool_types::{
    AccountId, Claim, ClaimStats, CommissionBalances, EntityId, MarketEvent, ObserverKind,
    PolicyId, PolicyInfo, PolicyLimits, PolicyRole, PolicyState, PolicyTerms, PolicyType,
    PremiumInfo, Result, RiskpoolError, Role, RoleContext, TrancheInfo, TrancheSpec,
    TrancheState,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    PolicyEnvironment,
    facets::{Facet, FacetVersion},
    tranche::Tranche,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub(crate) id: PolicyId,
    /// Holds commissions and receives premium payments in transit.
    pub(crate) account: AccountId,
    /// Entity whose treasury pools this policy's funds.
    pub(crate) owner_entity: EntityId,
    pub(crate) terms: PolicyTerms,
    pub(crate) limits: PolicyLimits,
    pub(crate) state: PolicyState,
    pub(crate) tranches: Vec<Tranche>,
    pub(crate) approvals: BTreeSet<PolicyRole>,
    pub(crate) claims: Vec<Claim>,
    pub(crate) commission_balances: CommissionBalances,
}

impl Policy {
    /// Validate `terms` and build a policy in `Created` state.
    pub fn new(
        id: PolicyId,
        account: AccountId,
        owner_entity: EntityId,
        terms: PolicyTerms,
        limits: PolicyLimits,
    ) -> Result<Self> {
        terms.dates.validate()?;
        terms.commissions.validate()?;
        if terms.unit.is_empty() {
            return Err(RiskpoolError::InvalidPolicy {
                reason: "unit asset not set".into(),
            });
        }
        if terms.policy_type == PolicyType::Spv && terms.parties.insured_party.is_none() {
            return Err(RiskpoolError::InvalidPolicy {
                reason: "insured party required".into(),
            });
        }
        tracing::info!(
            policy = %id,
            owner = %owner_entity,
            policy_type = ?terms.policy_type,
            unit = %terms.unit,
            "policy created"
        );
        Ok(Self {
            id,
            account,
            owner_entity,
            terms,
            limits,
            state: PolicyState::Created,
            tranches: Vec::new(),
            approvals: BTreeSet::new(),
            claims: Vec::new(),
            commission_balances: CommissionBalances::default(),
        })
    }

    // =================================================================
    // Tranches
    // =================================================================

    /// Add a tranche and mint its shares to the initial holder (the
    /// treasury unless given).
    pub fn create_tranche(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        caller: AccountId,
        spec: &TrancheSpec,
    ) -> Result<usize> {
        match env.facets().resolve(Facet::Core) {
            FacetVersion::V1 => self.create_tranche_v1(env, caller, spec),
        }
    }

    fn create_tranche_v1(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        caller: AccountId,
        spec: &TrancheSpec,
    ) -> Result<usize> {
        self.ensure_owner(env, caller)?;
        if self.state != PolicyState::Created {
            return Err(RiskpoolError::invalid_state("must be in created state"));
        }
        if self.tranches.len() >= self.limits.max_tranches_per_policy {
            return Err(RiskpoolError::InvalidTranche {
                reason: format!(
                    "policy already has {} tranches",
                    self.limits.max_tranches_per_policy
                ),
            });
        }
        if spec.denomination != self.terms.unit {
            return Err(RiskpoolError::InvalidTranche {
                reason: format!(
                    "denomination {} differs from policy unit {}",
                    spec.denomination, self.terms.unit
                ),
            });
        }

        let index = self.tranches.len();
        let token = self.id.tranche_token(index);
        let holder = spec.initial_holder.unwrap_or_else(|| env.treasury_account());
        let tranche = Tranche::new(index, token.clone(), spec, holder, &self.limits)?;
        env.ledger().mint(holder, &token, spec.num_shares)?;
        self.tranches.push(tranche);
        tracing::info!(
            policy = %self.id,
            tranche = index,
            token = %token,
            shares = spec.num_shares,
            price = spec.price_per_share,
            holder = %holder,
            "tranche created"
        );
        Ok(index)
    }

    // =================================================================
    // Approval
    // =================================================================

    /// Owner closes the draft: no more tranches, approvals may start.
    pub fn mark_ready_for_approval(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId) -> Result<()> {
        match env.facets().resolve(Facet::Core) {
            FacetVersion::V1 => {
                self.ensure_owner(env, caller)?;
                if self.state != PolicyState::Created {
                    return Err(RiskpoolError::invalid_state("must be in created state"));
                }
                if self.tranches.is_empty() {
                    return Err(RiskpoolError::invalid_state("policy has no tranches"));
                }
                self.set_state(PolicyState::ReadyForApproval);
                Ok(())
            }
        }
    }

    /// Record `role`'s approval. `caller` must represent the entity holding it.
    pub fn approve(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, role: PolicyRole) -> Result<()> {
        match env.facets().resolve(Facet::Core) {
            FacetVersion::V1 => self.approve_v1(env, caller, role),
        }
    }

    fn approve_v1(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, role: PolicyRole) -> Result<()> {
        if !matches!(self.state, PolicyState::ReadyForApproval | PolicyState::InApproval) {
            return Err(RiskpoolError::invalid_state("must be ready for approval"));
        }
        let required = self.terms.policy_type.required_approvals();
        if !required.contains(&role) {
            return Err(RiskpoolError::InvalidPolicy {
                reason: format!("{role} approval not required"),
            });
        }
        let entity = self.terms.parties.entity_for(role).ok_or_else(|| RiskpoolError::InvalidPolicy {
            reason: format!("{role} not set"),
        })?;
        if !env.roles().is_entity_rep(entity, caller) {
            return Err(RiskpoolError::unauthorized(format!("must be {role} rep")));
        }
        if !self.approvals.insert(role) {
            return Err(RiskpoolError::AlreadyExists {
                reason: "already approved".into(),
            });
        }
        tracing::info!(policy = %self.id, role = %role, caller = %caller, "policy approved by party");
        if required.iter().all(|r| self.approvals.contains(r)) {
            self.set_state(PolicyState::Approved);
        } else {
            self.set_state(PolicyState::InApproval);
        }
        Ok(())
    }

    #[must_use]
    pub fn pending_approvals(&self) -> Vec<PolicyRole> {
        self.terms
            .policy_type
            .required_approvals()
            .iter()
            .copied()
            .filter(|r| !self.approvals.contains(r))
            .collect()
    }

    /// Reserve a floor for this policy in its treasury. Once only.
    pub fn set_min_balance(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, amount: u128) -> Result<()> {
        self.ensure_owner(env, caller)?;
        env.set_min_policy_balance(self.id, amount)
    }

    // =================================================================
    // Market events
    // =================================================================

    /// Book a trade or closure of one of this policy's offers.
    pub fn on_market_event(&mut self, event: &MarketEvent) -> Result<()> {
        let observer = event.observer();
        if observer.policy != self.id {
            return Err(RiskpoolError::Internal(format!(
                "event for {} routed to {}",
                observer.policy, self.id
            )));
        }
        let policy = self.id;
        let tranche = self
            .tranches
            .get_mut(observer.tranche)
            .ok_or(RiskpoolError::TrancheNotFound(observer.tranche))?;
        match (event, observer.kind) {
            (MarketEvent::Trade(t), ObserverKind::TrancheSale) => {
                tranche.shares_sold = tranche
                    .shares_sold
                    .checked_add(t.gave_amount)
                    .ok_or(RiskpoolError::Overflow { context: "shares sold" })?;
                tranche.credit(t.got_amount)?;
                tracing::debug!(policy = %policy, tranche = tranche.index, shares = t.gave_amount, proceeds = t.got_amount, "tranche shares sold");
            }
            (MarketEvent::Closure(c), ObserverKind::TrancheSale) => {
                if c.fully_filled && tranche.state == TrancheState::Selling {
                    // A dust remainder closes the offer with shares unsold.
                    if tranche.shares_sold == tranche.num_shares {
                        tranche.transition(TrancheState::Active);
                    } else {
                        tracing::warn!(
                            policy = %policy,
                            tranche = tranche.index,
                            sold = tranche.shares_sold,
                            returned = c.refunded_amount,
                            "sale offer closed short of full"
                        );
                    }
                }
            }
            (MarketEvent::Trade(t), ObserverKind::Buyback) => {
                tranche.debit(t.gave_amount)?;
                tracing::debug!(policy = %policy, tranche = tranche.index, shares = t.got_amount, paid = t.gave_amount, "tranche shares bought back");
            }
            // Only traded amounts left the tranche balance; refunded escrow
            // was never debited from it.
            (MarketEvent::Closure(c), ObserverKind::Buyback) => {
                if c.fully_filled {
                    tranche.buyback_completed = true;
                    tracing::info!(policy = %policy, tranche = tranche.index, "buyback completed");
                }
            }
        }
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn id(&self) -> PolicyId {
        self.id
    }

    #[must_use]
    pub fn account(&self) -> AccountId {
        self.account
    }

    #[must_use]
    pub fn owner_entity(&self) -> EntityId {
        self.owner_entity
    }

    #[must_use]
    pub fn state(&self) -> PolicyState {
        self.state
    }

    #[must_use]
    pub fn terms(&self) -> &PolicyTerms {
        &self.terms
    }

    #[must_use]
    pub fn tranches(&self) -> &[Tranche] {
        &self.tranches
    }

    pub fn tranche(&self, index: usize) -> Result<&Tranche> {
        self.tranches.get(index).ok_or(RiskpoolError::TrancheNotFound(index))
    }

    #[must_use]
    pub fn info(&self) -> PolicyInfo {
        PolicyInfo {
            id: self.id,
            treasury: self.owner_entity,
            policy_type: self.terms.policy_type,
            state: self.state,
            dates: self.terms.dates,
            unit: self.terms.unit.clone(),
            num_tranches: self.tranches.len(),
            commissions: self.terms.commissions,
            pending_approvals: self.pending_approvals(),
            num_claims: self.claims.len(),
        }
    }

    pub fn tranche_info(&self, index: usize, now: chrono::DateTime<chrono::Utc>) -> Result<TrancheInfo> {
        Ok(self.tranche(index)?.info(now))
    }

    pub fn tranche_premium_info(&self, index: usize, premium: usize) -> Result<PremiumInfo> {
        self.tranche(index)?.premium_info(premium)
    }

    #[must_use]
    pub fn commission_balances(&self) -> CommissionBalances {
        self.commission_balances
    }

    pub fn claim(&self, index: usize) -> Result<&Claim> {
        self.claims.get(index).ok_or(RiskpoolError::ClaimNotFound(index))
    }

    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    #[must_use]
    pub fn claim_stats(&self) -> ClaimStats {
        self.claims.iter().collect()
    }

    /// SHA-256 over the serialised policy, hex encoded.
    pub fn state_digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    // =================================================================
    // Internals
    // =================================================================

    pub(crate) fn ensure_owner(&self, env: &dyn PolicyEnvironment, caller: AccountId) -> Result<()> {
        if env.roles().has_role(RoleContext::Policy(self.id), caller, Role::PolicyOwner) {
            return Ok(());
        }
        Err(RiskpoolError::unauthorized("must be policy owner"))
    }

    pub(crate) fn set_state(&mut self, next: PolicyState) {
        if self.state == next {
            return;
        }
        tracing::info!(policy = %self.id, from = %self.state, to = %next, "policy state changed");
        self.state = next;
    }
}
