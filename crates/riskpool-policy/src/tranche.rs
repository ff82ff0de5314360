//! A tranche: one slice of a policy's risk capital.
//!
//! Tokens representing the tranche's shares are minted on creation. The
//! premium schedule is a list of obligations; payments fill them in order,
//! so a single payment may complete several and leave the next one partly
//! paid.

use chrono::{DateTime, Utc};
use riskpool_types::{
    AccountId, Asset, OfferId, PolicyLimits, PremiumEntry, PremiumInfo, Result, RiskpoolError,
    TrancheInfo, TrancheSpec, TrancheState,
    amount::{checked_add, checked_sub},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tranche {
    pub index: usize,
    pub state: TrancheState,
    pub token: Asset,
    pub num_shares: u128,
    pub price_per_share: u128,
    pub denomination: Asset,
    pub initial_holder: AccountId,
    /// Nonzero obligations, in due order.
    pub premiums: Vec<PremiumEntry>,
    /// Obligations fully paid; they are always a prefix of `premiums`.
    pub premiums_paid: usize,
    /// Paid toward `premiums[premiums_paid]`.
    pub next_paid_so_far: u128,
    /// Gross premiums received.
    pub premium_payments_total: u128,
    pub shares_sold: u128,
    pub initial_sale_offer: Option<OfferId>,
    pub buyback_offer: Option<OfferId>,
    pub buyback_completed: bool,
    /// Net premiums and sale proceeds, less approved claims and buyback spend.
    pub balance: u128,
}

impl Tranche {
    /// Validate `spec` and build tranche `index`. Zero premium entries are
    /// dropped before the limit is applied.
    pub fn new(
        index: usize,
        token: Asset,
        spec: &TrancheSpec,
        initial_holder: AccountId,
        limits: &PolicyLimits,
    ) -> Result<Self> {
        if spec.num_shares == 0 {
            return Err(RiskpoolError::InvalidTranche {
                reason: "number of shares must be positive".into(),
            });
        }
        if spec.price_per_share == 0 {
            return Err(RiskpoolError::InvalidTranche {
                reason: "price per share must be positive".into(),
            });
        }
        if spec.denomination.is_empty() {
            return Err(RiskpoolError::InvalidTranche {
                reason: "denomination asset not set".into(),
            });
        }
        spec.num_shares
            .checked_mul(spec.price_per_share)
            .ok_or(RiskpoolError::Overflow { context: "tranche value" })?;

        let premiums: Vec<PremiumEntry> = spec.premiums.iter().copied().filter(|p| p.amount > 0).collect();
        if premiums.len() > limits.max_premiums_per_tranche {
            return Err(RiskpoolError::InvalidPremiumSchedule {
                reason: format!(
                    "{} premiums exceed the limit of {}",
                    premiums.len(),
                    limits.max_premiums_per_tranche
                ),
            });
        }
        if premiums.windows(2).any(|w| w[1].due_at < w[0].due_at) {
            return Err(RiskpoolError::InvalidPremiumSchedule {
                reason: "premium due dates must not decrease".into(),
            });
        }

        Ok(Self {
            index,
            state: TrancheState::Created,
            token,
            num_shares: spec.num_shares,
            price_per_share: spec.price_per_share,
            denomination: spec.denomination.clone(),
            initial_holder,
            premiums,
            premiums_paid: 0,
            next_paid_so_far: 0,
            premium_payments_total: 0,
            shares_sold: 0,
            initial_sale_offer: None,
            buyback_offer: None,
            buyback_completed: false,
            balance: 0,
        })
    }

    /// Next obligation not yet fully paid.
    #[must_use]
    pub fn next_premium(&self) -> Option<&PremiumEntry> {
        self.premiums.get(self.premiums_paid)
    }

    /// Still owed on the next obligation.
    #[must_use]
    pub fn next_premium_amount(&self) -> u128 {
        self.next_premium()
            .map_or(0, |p| p.amount.saturating_sub(self.next_paid_so_far))
    }

    /// Everything still owed across the schedule.
    #[must_use]
    pub fn outstanding(&self) -> u128 {
        self.premiums[self.premiums_paid.min(self.premiums.len())..]
            .iter()
            .fold(0u128, |acc, p| acc.saturating_add(p.amount))
            .saturating_sub(self.next_paid_so_far)
    }

    /// All obligations paid, or the next one not yet due.
    #[must_use]
    pub fn premiums_current(&self, now: DateTime<Utc>) -> bool {
        self.next_premium().is_none_or(|p| p.due_at >= now)
    }

    /// Obligations past due and not fully paid.
    #[must_use]
    pub fn premiums_missed(&self, now: DateTime<Utc>) -> usize {
        self.premiums[self.premiums_paid.min(self.premiums.len())..]
            .iter()
            .take_while(|p| p.due_at < now)
            .count()
    }

    /// Apply a gross payment to the schedule, oldest obligation first.
    /// Returns the number of obligations completed.
    pub fn apply_payment(&mut self, amount: u128) -> Result<usize> {
        if amount > self.outstanding() {
            return Err(RiskpoolError::PaymentNotAllowed {
                reason: "payment exceeds premiums due".into(),
            });
        }
        let mut left = amount;
        let mut completed = 0;
        while left > 0 {
            let owed = self.next_premium_amount();
            if left < owed {
                self.next_paid_so_far += left;
                break;
            }
            left -= owed;
            self.premiums_paid += 1;
            self.next_paid_so_far = 0;
            completed += 1;
        }
        self.premium_payments_total = checked_add(self.premium_payments_total, amount, "premium total")?;
        Ok(completed)
    }

    pub fn credit(&mut self, amount: u128) -> Result<()> {
        self.balance = checked_add(self.balance, amount, "tranche balance")?;
        Ok(())
    }

    pub fn debit(&mut self, amount: u128) -> Result<()> {
        self.balance = checked_sub(self.balance, amount, "tranche balance")?;
        Ok(())
    }

    /// Move to `next` unless already terminal. Returns whether it moved.
    pub fn transition(&mut self, next: TrancheState) -> bool {
        if self.state.is_terminal() || self.state == next {
            return false;
        }
        tracing::info!(tranche = self.index, token = %self.token, from = %self.state, to = %next, "tranche state changed");
        self.state = next;
        true
    }

    #[must_use]
    pub fn info(&self, now: DateTime<Utc>) -> TrancheInfo {
        TrancheInfo {
            index: self.index,
            state: self.state,
            token: self.token.clone(),
            num_shares: self.num_shares,
            price_per_share: self.price_per_share,
            denomination: self.denomination.clone(),
            num_premiums: self.premiums.len(),
            num_premiums_paid: self.premiums_paid,
            next_premium_amount: self.next_premium_amount(),
            next_premium_due_at: self.next_premium().map(|p| p.due_at),
            next_premium_paid_so_far: self.next_paid_so_far,
            premium_payments_missed: self.premiums_missed(now),
            premium_payments_total: self.premium_payments_total,
            shares_sold: self.shares_sold,
            initial_sale_offer_id: self.initial_sale_offer,
            final_buyback_offer_id: self.buyback_offer,
            buyback_completed: self.buyback_completed,
            balance: self.balance,
        }
    }

    pub fn premium_info(&self, premium: usize) -> Result<PremiumInfo> {
        let entry = self.premiums.get(premium).ok_or_else(|| RiskpoolError::InvalidPremiumSchedule {
            reason: format!("no premium {premium} in tranche {}", self.index),
        })?;
        Ok(PremiumInfo {
            amount: entry.amount,
            due_at: entry.due_at,
            paid: premium < self.premiums_paid,
        })
    }
}
