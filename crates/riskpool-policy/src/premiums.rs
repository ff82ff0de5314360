//! Premium payments.
//!
//! The payer approves the policy account for the gross amount. Commissions
//! stay on the policy account; the net amount moves to the treasury and is
//! credited to the tranche and to the policy's treasury balance.

use riskpool_types::{AccountId, PolicyState, Result, RiskpoolError};

use crate::{
    Policy, PolicyEnvironment, commissions,
    facets::{Facet, FacetVersion},
};

impl Policy {
    /// Pay `amount` toward tranche `index`'s premium schedule.
    ///
    /// Returns the number of obligations the payment completed.
    pub fn pay_premium(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        payer: AccountId,
        index: usize,
        amount: u128,
    ) -> Result<usize> {
        match env.facets().resolve(Facet::Premiums) {
            FacetVersion::V1 => self.pay_premium_v1(env, payer, index, amount),
        }
    }

    fn pay_premium_v1(
        &mut self,
        env: &mut dyn PolicyEnvironment,
        payer: AccountId,
        index: usize,
        amount: u128,
    ) -> Result<usize> {
        if amount == 0 {
            return Err(RiskpoolError::invalid_amount("premium amount is zero"));
        }
        if matches!(self.state, PolicyState::Cancelled | PolicyState::Closed) {
            return Err(not_allowed("payment not allowed"));
        }
        let now = env.now();
        let tranche = self
            .tranches
            .get(index)
            .ok_or(RiskpoolError::TrancheNotFound(index))?;
        if tranche.state.is_terminal() {
            return Err(not_allowed("payment not allowed"));
        }
        let Some(next) = tranche.next_premium() else {
            return Err(not_allowed("payment exceeds premiums due"));
        };
        if amount > tranche.outstanding() {
            return Err(not_allowed("payment exceeds premiums due"));
        }
        if now > next.due_at {
            return Err(not_allowed("payment too late"));
        }
        // Before initiation only the first obligation may be paid.
        if now < self.terms.dates.initiation
            && (tranche.premiums_paid > 0 || amount > tranche.next_premium_amount())
        {
            return Err(not_allowed("only the first premium is payable before initiation"));
        }

        let shares = commissions::split(&self.terms.commissions, amount)?;
        let net = commissions::net_of(amount, &shares)?;
        let unit = self.terms.unit.clone();
        let treasury = env.treasury_account();
        {
            let ledger = env.ledger();
            ledger.transfer_from(self.account, payer, self.account, &unit, amount)?;
            if net > 0 {
                ledger.transfer(self.account, treasury, &unit, net)?;
            }
        }
        if net > 0 {
            env.credit_treasury(self.id, net)?;
        }

        let tranche = &mut self.tranches[index];
        let completed = tranche.apply_payment(amount)?;
        tranche.credit(net)?;
        commissions::accumulate(&mut self.commission_balances, &shares)?;
        tracing::info!(
            policy = %self.id,
            tranche = index,
            payer = %payer,
            amount,
            net,
            commissions = shares.total(),
            completed,
            "premium paid"
        );
        Ok(completed)
    }
}

fn not_allowed(reason: &str) -> RiskpoolError {
    RiskpoolError::PaymentNotAllowed {
        reason: reason.into(),
    }
}
