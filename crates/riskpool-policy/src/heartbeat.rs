//! The heartbeat: time-driven policy and tranche transitions.
//!
//! [`Policy::check_and_update_state`] may be called by anyone at any time.
//! It only acts on conditions that hold at `env.now()` and have not been
//! acted on yet, so calling it twice in a row changes nothing the second
//! time.

use riskpool_treasury::OrderRequest;
use riskpool_types::{ObserverKind, PolicyState, Result, RiskpoolError, TrancheState};

use crate::{
    Policy, PolicyEnvironment,
    facets::{Facet, FacetVersion},
};

impl Policy {
    /// Advance the policy as far as the current time allows.
    ///
    /// Returns whether anything changed. Market activity triggered here
    /// (sale fills, buyback fills) is reported back through
    /// [`Policy::on_market_event`], which may enable a further step on the
    /// next call.
    pub fn check_and_update_state(&mut self, env: &mut dyn PolicyEnvironment) -> Result<bool> {
        match env.facets().resolve(Facet::Core) {
            FacetVersion::V1 => {
                let before = self.progress();
                self.advance_v1(env)?;
                Ok(before != self.progress())
            }
        }
    }

    fn advance_v1(&mut self, env: &mut dyn PolicyEnvironment) -> Result<()> {
        if self.state.is_final() {
            return Ok(());
        }
        let now = env.now();
        let dates = self.terms.dates;

        if self.state.is_pending_approval() {
            if now >= dates.initiation {
                tracing::warn!(policy = %self.id, state = %self.state, "approvals incomplete at initiation");
                self.cancel_all();
            }
            return Ok(());
        }

        if self.state == PolicyState::Approved && now >= dates.initiation {
            if self.all_premiums_current(now) {
                self.begin_sale(env)?;
            } else if now >= dates.start {
                tracing::warn!(policy = %self.id, "premiums not current at start");
                self.cancel_all();
                return Ok(());
            }
        }

        if self.state == PolicyState::Initiated && now >= dates.start {
            self.end_sale(env)?;
            self.set_state(PolicyState::Active);
        }

        if self.state == PolicyState::Active && now < dates.maturation {
            self.cancel_lapsed(now);
        }

        if matches!(self.state, PolicyState::Active | PolicyState::Matured) && now >= dates.maturation {
            self.mature(env)?;
        }

        if self.state == PolicyState::Buyback && self.buybacks_completed() {
            self.set_state(PolicyState::Closed);
        }
        Ok(())
    }

    /// List treasury-held tranche tokens for sale at their issue price.
    fn begin_sale(&mut self, env: &mut dyn PolicyEnvironment) -> Result<()> {
        let treasury = env.treasury_account();
        for index in 0..self.tranches.len() {
            let tranche = &self.tranches[index];
            if tranche.state.is_terminal() {
                continue;
            }
            let holdings = env.balance_of(treasury, &tranche.token);
            if holdings == 0 {
                self.tranches[index].transition(TrancheState::Active);
                continue;
            }
            let order = OrderRequest {
                tranche: index,
                kind: ObserverKind::TrancheSale,
                pay_asset: tranche.token.clone(),
                pay_amount: holdings,
                buy_asset: tranche.denomination.clone(),
                buy_amount: holdings
                    .checked_mul(tranche.price_per_share)
                    .ok_or(RiskpoolError::Overflow { context: "tranche sale price" })?,
            };
            let offer = env.create_order(self.id, order)?;
            let tranche = &mut self.tranches[index];
            tranche.initial_sale_offer = Some(offer);
            tranche.transition(TrancheState::Selling);
        }
        self.set_state(PolicyState::Initiated);
        Ok(())
    }

    /// Close the sale window: unsold or lapsed tranches are cancelled.
    fn end_sale(&mut self, env: &mut dyn PolicyEnvironment) -> Result<()> {
        let now = env.now();
        for index in 0..self.tranches.len() {
            match self.tranches[index].state {
                TrancheState::Selling => {
                    if let Some(offer) = self.tranches[index].initial_sale_offer {
                        if env.is_offer_active(offer) {
                            env.cancel_order(self.id, offer)?;
                        }
                    }
                    tracing::warn!(policy = %self.id, tranche = index, "tranche not sold by start");
                    self.tranches[index].transition(TrancheState::Cancelled);
                }
                TrancheState::Active if !self.tranches[index].premiums_current(now) => {
                    self.tranches[index].transition(TrancheState::Cancelled);
                }
                TrancheState::Created => {
                    self.tranches[index].transition(TrancheState::Cancelled);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn cancel_lapsed(&mut self, now: chrono::DateTime<chrono::Utc>) {
        for tranche in &mut self.tranches {
            if tranche.state == TrancheState::Active && !tranche.premiums_current(now) {
                tracing::warn!(tranche = tranche.index, missed = tranche.premiums_missed(now), "premiums missed");
                tranche.transition(TrancheState::Cancelled);
            }
        }
    }

    /// Mature the policy. Buybacks wait until no claim is undecided.
    fn mature(&mut self, env: &mut dyn PolicyEnvironment) -> Result<()> {
        if self.has_undecided_claims() {
            self.set_state(PolicyState::Matured);
            return Ok(());
        }
        let now = env.now();
        for tranche in &mut self.tranches {
            if tranche.state == TrancheState::Active {
                let next = if tranche.premiums_current(now) {
                    TrancheState::Matured
                } else {
                    TrancheState::Cancelled
                };
                tranche.transition(next);
            }
        }
        let treasury = env.treasury_account();
        for index in 0..self.tranches.len() {
            let tranche = &self.tranches[index];
            if tranche.state != TrancheState::Matured
                || tranche.buyback_offer.is_some()
                || tranche.buyback_completed
            {
                continue;
            }
            let outstanding = env
                .total_supply(&tranche.token)
                .saturating_sub(env.balance_of(treasury, &tranche.token));
            if tranche.balance == 0 || outstanding == 0 {
                self.tranches[index].buyback_completed = true;
                continue;
            }
            let order = OrderRequest {
                tranche: index,
                kind: ObserverKind::Buyback,
                pay_asset: tranche.denomination.clone(),
                pay_amount: tranche.balance,
                buy_asset: tranche.token.clone(),
                buy_amount: outstanding,
            };
            let offer = env.create_order(self.id, order)?;
            self.tranches[index].buyback_offer = Some(offer);
            tracing::info!(policy = %self.id, tranche = index, offer = %offer, outstanding, "buyback listed");
        }
        self.set_state(PolicyState::Buyback);
        Ok(())
    }

    fn cancel_all(&mut self) {
        for tranche in &mut self.tranches {
            tranche.transition(TrancheState::Cancelled);
        }
        self.set_state(PolicyState::Cancelled);
    }

    fn all_premiums_current(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.tranches
            .iter()
            .filter(|t| !t.state.is_terminal())
            .all(|t| t.premiums_current(now))
    }

    fn buybacks_completed(&self) -> bool {
        self.tranches
            .iter()
            .filter(|t| t.state == TrancheState::Matured)
            .all(|t| t.buyback_completed)
    }

    /// Everything the heartbeat can move.
    fn progress(&self) -> (PolicyState, Vec<(TrancheState, bool, bool, bool)>) {
        let tranches = self
            .tranches
            .iter()
            .map(|t| {
                (
                    t.state,
                    t.initial_sale_offer.is_some(),
                    t.buyback_offer.is_some(),
                    t.buyback_completed,
                )
            })
            .collect();
        (self.state, tranches)
    }
}
