//! Commission split of premium payments.
//!
//! Each role's share is `floor(P * bp / 10000)` of the gross payment `P`,
//! computed independently per role. Shares accumulate on the policy account
//! until [`Policy::pay_commissions`] distributes them.

use riskpool_types::{
    CommissionBalances, CommissionRates, PolicyRole, Result, RiskpoolError,
    amount::{checked_add, checked_sub},
};

use crate::{
    Policy, PolicyEnvironment,
    facets::{Facet, FacetVersion},
};

/// Shares of one gross payment.
pub fn split(rates: &CommissionRates, gross: u128) -> Result<CommissionBalances> {
    Ok(CommissionBalances {
        broker: rates.broker.fraction_of(gross)?,
        underwriter: rates.underwriter.fraction_of(gross)?,
        claims_admin: rates.claims_admin.fraction_of(gross)?,
        protocol: rates.protocol.fraction_of(gross)?,
    })
}

/// Gross payment less every share.
pub fn net_of(gross: u128, shares: &CommissionBalances) -> Result<u128> {
    checked_sub(gross, shares.total(), "premium net of commissions")
}

pub(crate) fn accumulate(into: &mut CommissionBalances, shares: &CommissionBalances) -> Result<()> {
    into.broker = checked_add(into.broker, shares.broker, "broker commission")?;
    into.underwriter = checked_add(into.underwriter, shares.underwriter, "underwriter commission")?;
    into.claims_admin = checked_add(into.claims_admin, shares.claims_admin, "claims admin commission")?;
    into.protocol = checked_add(into.protocol, shares.protocol, "protocol commission")?;
    Ok(())
}

impl Policy {
    /// Pay out accumulated commissions: broker, underwriter and claims admin
    /// to their entity accounts, the protocol share to the fee bank.
    pub fn pay_commissions(&mut self, env: &mut dyn PolicyEnvironment) -> Result<CommissionBalances> {
        match env.facets().resolve(Facet::Commissions) {
            FacetVersion::V1 => self.pay_commissions_v1(env),
        }
    }

    fn pay_commissions_v1(&mut self, env: &mut dyn PolicyEnvironment) -> Result<CommissionBalances> {
        let due = self.commission_balances;
        if due.is_zero() {
            return Ok(due);
        }
        let parties = self.terms.parties;
        let payouts = [
            (
                env.entity_account(parties.entity_for(PolicyRole::Broker).ok_or_else(missing_party)?)?,
                due.broker,
            ),
            (
                env.entity_account(parties.entity_for(PolicyRole::Underwriter).ok_or_else(missing_party)?)?,
                due.underwriter,
            ),
            (
                env.entity_account(parties.entity_for(PolicyRole::ClaimsAdmin).ok_or_else(missing_party)?)?,
                due.claims_admin,
            ),
            (env.fee_bank(), due.protocol),
        ];
        let unit = self.terms.unit.clone();
        for (to, amount) in payouts {
            if amount > 0 {
                env.ledger().transfer(self.account, to, &unit, amount)?;
            }
        }
        self.commission_balances = CommissionBalances::default();
        tracing::info!(
            policy = %self.id,
            broker = due.broker,
            underwriter = due.underwriter,
            claims_admin = due.claims_admin,
            protocol = due.protocol,
            "commissions paid"
        );
        Ok(due)
    }
}

fn missing_party() -> RiskpoolError {
    RiskpoolError::InvalidPolicy {
        reason: "commission recipient not set".into(),
    }
}
