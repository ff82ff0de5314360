//! Claims against a policy's tranches.
//!
//! Claims are made by a representative of the claimant entity (the insured
//! party on SPV policies, the owning entity on portfolio policies) and decided
//! by the claims admin. Approval reserves the amount against the tranche
//! balance at once; payment goes through the treasury, which may queue it.

use riskpool_types::{
    AccountId, Claim, ClaimPayment, ClaimState, EntityId, PolicyRole, PolicyState, PolicyType,
    Result, RiskpoolError, TrancheState,
};

use crate::{
    Policy, PolicyEnvironment,
    facets::{Facet, FacetVersion},
};

impl Policy {
    /// Entity that receives claim payouts.
    #[must_use]
    pub fn claimant(&self) -> EntityId {
        match self.terms.policy_type {
            PolicyType::Spv => self.terms.parties.insured_party.unwrap_or(self.owner_entity),
            PolicyType::Portfolio => self.owner_entity,
        }
    }

    /// What a new claim on tranche `index` may still ask for.
    pub fn claimable(&self, index: usize) -> Result<u128> {
        let tranche = self.tranche(index)?;
        let pending = self
            .claims
            .iter()
            .filter(|c| c.tranche == index && c.state.is_undecided())
            .fold(0u128, |acc, c| acc.saturating_add(c.amount));
        Ok(tranche.balance.saturating_sub(pending))
    }

    pub fn make_claim(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        caller: AccountId,
        index: usize,
        amount: u128,
    ) -> Result<usize> {
        match env.facets().resolve(Facet::Claims) {
            FacetVersion::V1 => self.make_claim_v1(env, caller, index, amount),
        }
    }

    fn make_claim_v1(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        caller: AccountId,
        index: usize,
        amount: u128,
    ) -> Result<usize> {
        let claimant = self.claimant();
        if !env.roles().is_entity_rep(claimant, caller) {
            return Err(RiskpoolError::unauthorized("must be insured party rep"));
        }
        if self.state != PolicyState::Active {
            return Err(RiskpoolError::invalid_state("must be in active state"));
        }
        if self.tranche(index)?.state != TrancheState::Active {
            return Err(RiskpoolError::invalid_state("must be in active state"));
        }
        if amount == 0 {
            return Err(RiskpoolError::invalid_amount("claim amount is zero"));
        }
        let available = self.claimable(index)?;
        if amount > available {
            return Err(RiskpoolError::ClaimTooHigh {
                requested: amount,
                available,
            });
        }
        self.claims.push(Claim {
            tranche: index,
            amount,
            claimant,
            state: ClaimState::Created,
            disputed: false,
            acknowledged: false,
            created_at: env.now(),
        });
        let claim = self.claims.len() - 1;
        tracing::info!(policy = %self.id, claim, tranche = index, amount, "claim made");
        Ok(claim)
    }

    pub fn dispute_claim(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        match env.facets().resolve(Facet::Claims) {
            FacetVersion::V1 => self.set_disputed_v1(env, caller, claim, true),
        }
    }

    pub fn undispute_claim(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        match env.facets().resolve(Facet::Claims) {
            FacetVersion::V1 => self.set_disputed_v1(env, caller, claim, false),
        }
    }

    fn set_disputed_v1(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        caller: AccountId,
        claim: usize,
        disputed: bool,
    ) -> Result<()> {
        self.ensure_party_rep(env, caller, PolicyRole::Underwriter)?;
        let policy = self.id;
        let c = self.undecided_claim_mut(claim)?;
        c.disputed = disputed;
        c.state = if disputed { ClaimState::Disputed } else { ClaimState::Created };
        tracing::info!(policy = %policy, claim, disputed, "claim dispute flag changed");
        Ok(())
    }

    pub fn acknowledge_claim(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        match env.facets().resolve(Facet::Claims) {
            FacetVersion::V1 => self.acknowledge_claim_v1(env, caller, claim),
        }
    }

    fn acknowledge_claim_v1(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        self.ensure_party_rep(env, caller, PolicyRole::ClaimsAdmin)?;
        let c = self.claims.get_mut(claim).ok_or(RiskpoolError::ClaimNotFound(claim))?;
        c.acknowledged = true;
        Ok(())
    }

    /// Approve an undecided claim and reserve its amount against the tranche.
    pub fn approve_claim(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        match env.facets().resolve(Facet::Claims) {
            FacetVersion::V1 => self.approve_claim_v1(env, caller, claim),
        }
    }

    fn approve_claim_v1(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        self.ensure_party_rep(env, caller, PolicyRole::ClaimsAdmin)?;
        let (index, amount) = {
            let c = self.undecided_claim_mut(claim)?;
            (c.tranche, c.amount)
        };
        self.tranches
            .get_mut(index)
            .ok_or(RiskpoolError::TrancheNotFound(index))?
            .debit(amount)?;
        self.claims[claim].state = ClaimState::Approved;
        tracing::info!(policy = %self.id, claim, tranche = index, amount, "claim approved");
        Ok(())
    }

    pub fn decline_claim(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        match env.facets().resolve(Facet::Claims) {
            FacetVersion::V1 => self.decline_claim_v1(env, caller, claim),
        }
    }

    fn decline_claim_v1(&mut self, env: &mut dyn PolicyEnvironment, caller: AccountId, claim: usize) -> Result<()> {
        self.ensure_party_rep(env, caller, PolicyRole::ClaimsAdmin)?;
        let policy = self.id;
        let c = self.undecided_claim_mut(claim)?;
        c.state = ClaimState::Declined;
        tracing::info!(policy = %policy, claim, amount = c.amount, "claim declined");
        Ok(())
    }

    /// Pay an approved claim to the claimant's entity account.
    pub fn pay_claim(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        caller: AccountId,
        claim: usize,
    ) -> Result<ClaimPayment> {
        match env.facets().resolve(Facet::Claims) {
            FacetVersion::V1 => self.pay_claim_v1(env, caller, claim),
        }
    }

    fn pay_claim_v1(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        caller: AccountId,
        claim: usize,
    ) -> Result<ClaimPayment> {
        self.ensure_party_rep(env, caller, PolicyRole::ClaimsAdmin)?;
        let c = self.claims.get(claim).ok_or(RiskpoolError::ClaimNotFound(claim))?;
        if c.state != ClaimState::Approved {
            return Err(RiskpoolError::invalid_state("must be approved"));
        }
        let recipient = env.entity_account(c.claimant)?;
        let payment = env.pay_claim(self.id, recipient, c.amount)?;
        self.claims[claim].state = ClaimState::Paid;
        tracing::info!(policy = %self.id, claim, ?payment, "claim paid out");
        Ok(payment)
    }

    pub(crate) fn has_undecided_claims(&self) -> bool {
        self.claims.iter().any(|c| c.state.is_undecided())
    }

    fn undecided_claim_mut(&mut self, claim: usize) -> Result<&mut Claim> {
        let c = self.claims.get_mut(claim).ok_or(RiskpoolError::ClaimNotFound(claim))?;
        if !c.state.is_undecided() {
            return Err(RiskpoolError::invalid_state(format!("claim already {}", c.state)));
        }
        Ok(c)
    }

    fn ensure_party_rep(&self, env: &dyn PolicyEnvironment, caller: AccountId, role: PolicyRole) -> Result<()> {
        let entity = self
            .terms
            .parties
            .entity_for(role)
            .ok_or_else(|| RiskpoolError::unauthorized(format!("no {role} on policy")))?;
        if env.roles().is_entity_rep(entity, caller) {
            return Ok(());
        }
        Err(RiskpoolError::unauthorized(format!("must be {role} rep")))
    }
}
