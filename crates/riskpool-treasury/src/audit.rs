//! Treasury invariant checker.
//!
//! Checked after every operation that moves treasury funds:
//! ```text
//! ∀ asset: virtual == Σ policy.balance
//! ∀ asset: real    == ledger.balance_of(treasury account)
//! ∀ asset: real    <= virtual + unpaid claims
//! ∀ asset: paid claims form a prefix of the queue
//! ```
//!
//! A violation means bookkeeping and funds have drifted apart. The platform
//! treats it as an internal error and rolls the operation back.

use riskpool_ledger::AssetLedger;
use riskpool_types::{Result, RiskpoolError};

use crate::Treasury;

/// Result of auditing one treasury.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreasuryAudit {
    violations: Vec<String>,
}

impl TreasuryAudit {
    /// Check every tracked asset of `treasury` against `ledger`.
    #[must_use]
    pub fn run(treasury: &Treasury, ledger: &AssetLedger) -> Self {
        let mut violations = Vec::new();
        for (asset, eco) in treasury.assets() {
            let policy_total = treasury
                .policies()
                .filter(|(_, pe)| &pe.asset == asset)
                .fold(0u128, |acc, (_, pe)| acc.saturating_add(pe.balance));
            if eco.virtual_balance != policy_total {
                violations.push(format!(
                    "{asset}: virtual balance {} != policy balances {policy_total}",
                    eco.virtual_balance
                ));
            }

            let held = ledger.balance_of(treasury.account(), asset);
            if eco.real_balance != held {
                violations.push(format!(
                    "{asset}: real balance {} != held {held}",
                    eco.real_balance
                ));
            }

            let claims = treasury.get_claims(asset);
            if claims.unpaid_total != eco.unpaid_claims_total {
                violations.push(format!(
                    "{asset}: unpaid claims {} != queued {}",
                    eco.unpaid_claims_total, claims.unpaid_total
                ));
            }
            if eco.real_balance > eco.virtual_balance.saturating_add(eco.unpaid_claims_total) {
                violations.push(format!(
                    "{asset}: real {} exceeds virtual {} + unpaid {}",
                    eco.real_balance, eco.virtual_balance, eco.unpaid_claims_total
                ));
            }
            if treasury.queue(asset).is_some_and(|q| !q.is_fifo_consistent()) {
                violations.push(format!("{asset}: paid claims are not a queue prefix"));
            }
        }
        if !violations.is_empty() {
            tracing::error!(treasury = %treasury.entity(), ?violations, "treasury audit failed");
        }
        Self { violations }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// # Errors
    /// [`RiskpoolError::Internal`] listing every violation.
    pub fn into_result(self) -> Result<()> {
        if self.is_clean() {
            return Ok(());
        }
        Err(RiskpoolError::Internal(format!(
            "treasury invariant violated: {}",
            self.violations.join("; ")
        )))
    }
}
