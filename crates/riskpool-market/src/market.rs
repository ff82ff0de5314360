//! The market: escrowing offer book with immediate matching.
//!
//! ## Escrow model
//!
//! The market owns an account on the [`AssetLedger`]. Placing an offer pulls
//! its full pay amount into that account (`transfer_from` with the market as
//! spender, so owners approve the market first). Fills pay makers and takers
//! out of escrow; cancellation and unrestable remainders are refunded.
//!
//! ## Atomicity
//!
//! Every operation validates and plans against the book before the first
//! transfer. A failed transfer restores the book, so no partial state
//! survives an error.

use chrono::{DateTime, Utc};
use riskpool_ledger::AssetLedger;
use riskpool_types::{
    AccountId, Asset, ClosureReport, MarketConfig, MarketEvent, Offer, OfferId, OfferObserver,
    Result, RiskpoolError, RoleOracle, TradeReport, amount::checked_sub, constants,
};
use rust_decimal::Decimal;

use crate::{
    OrderBook,
    matcher::{self, Fill, MatchOutcome},
};

/// Request to place an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    pub owner: AccountId,
    pub pay_asset: Asset,
    pub pay_amount: u128,
    pub buy_asset: Asset,
    pub buy_amount: u128,
    /// Overrides the configured matching switch.
    pub matching: Option<bool>,
    pub observer: Option<OfferObserver>,
}

impl NewOffer {
    #[must_use]
    pub fn new(
        owner: AccountId,
        pay_amount: u128,
        pay_asset: impl Into<Asset>,
        buy_amount: u128,
        buy_asset: impl Into<Asset>,
    ) -> Self {
        Self {
            owner,
            pay_asset: pay_asset.into(),
            pay_amount,
            buy_asset: buy_asset.into(),
            buy_amount,
            matching: None,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: OfferObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Rest the full amount without matching.
    #[must_use]
    pub fn without_matching(mut self) -> Self {
        self.matching = Some(false);
        self
    }
}

/// What became of a placed offer's escrow.
///
/// `spent + resting + refunded` always equals the pay amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub id: OfferId,
    pub fills: usize,
    /// Paid to makers.
    pub spent: u128,
    /// Left on the book under `id`.
    pub resting: u128,
    /// Returned to the owner at once.
    pub refunded: u128,
}

/// Aggregated view of one price level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthLevel {
    /// Buy asset asked per unit of pay asset.
    pub unit_price: Option<Decimal>,
    pub pay_amount: u128,
    pub buy_amount: u128,
    pub offers: usize,
}

/// A market instance.
#[derive(Debug, Clone)]
pub struct Market {
    account: AccountId,
    config: MarketConfig,
    book: OrderBook,
    last_offer_id: OfferId,
    events: Vec<MarketEvent>,
}

impl Market {
    /// Create a market holding escrow in `account`.
    #[must_use]
    pub fn new(account: AccountId, config: MarketConfig) -> Self {
        Self {
            account,
            config,
            book: OrderBook::new(),
            last_offer_id: OfferId(constants::FIRST_OFFER_ID - 1),
            events: Vec::new(),
        }
    }

    /// Escrow account. Owners approve this account before placing offers.
    #[must_use]
    pub fn account(&self) -> AccountId {
        self.account
    }

    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    // =================================================================
    // Offer placement
    // =================================================================

    /// Place an offer, matching it against the book unless matching is off.
    ///
    /// Always consumes a fresh offer id. The id stays active only if a
    /// remainder rests on the book.
    pub fn offer(&mut self, ledger: &mut AssetLedger, now: DateTime<Utc>, req: NewOffer) -> Result<OfferId> {
        self.place(ledger, now, req).map(|p| p.id)
    }

    /// [`offer`](Self::offer), reporting what happened to the escrow.
    pub fn place(&mut self, ledger: &mut AssetLedger, now: DateTime<Utc>, req: NewOffer) -> Result<Placement> {
        self.ensure_open(now)?;
        validate_pair(&req.pay_asset, req.pay_amount, &req.buy_asset, req.buy_amount)?;
        let pay_dust = self.config.dust_limit(&req.pay_asset);
        if req.pay_amount < pay_dust {
            return Err(RiskpoolError::InvalidOffer {
                reason: format!("pay amount {} below dust limit {pay_dust}", req.pay_amount),
            });
        }

        let saved = self.book.clone();
        let outcome = if req.matching.unwrap_or(self.config.matching_enabled) {
            let maker_dust = self.config.dust_limit(&req.buy_asset);
            matcher::match_limit(
                &mut self.book,
                req.owner,
                &req.pay_asset,
                req.pay_amount,
                &req.buy_asset,
                req.buy_amount,
                maker_dust,
            )
        } else {
            Ok(MatchOutcome {
                pay_remaining: req.pay_amount,
                buy_remaining: req.buy_amount,
                ..MatchOutcome::default()
            })
        };
        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                self.book = saved;
                return Err(e);
            }
        };
        if let Err(e) = ledger.transfer_from(
            self.account,
            req.owner,
            self.account,
            &req.pay_asset,
            req.pay_amount,
        ) {
            self.book = saved;
            return Err(e);
        }

        let id = self.next_offer_id();
        let taker_tag = req.observer.map(|o| (id, o));
        self.settle_fills(ledger, req.owner, &req.pay_asset, &req.buy_asset, &outcome.fills, taker_tag)?;

        let rests = outcome.pay_remaining > 0
            && outcome.buy_remaining > 0
            && outcome.pay_remaining >= pay_dust;
        let resting = if rests { outcome.pay_remaining } else { 0 };
        let refund = checked_sub(
            checked_sub(req.pay_amount, outcome.spent, "offer escrow")?,
            resting,
            "offer escrow",
        )?;
        if refund > 0 {
            ledger.transfer(self.account, req.owner, &req.pay_asset, refund)?;
        }

        if rests {
            self.book.insert_offer(Offer {
                id,
                owner: req.owner,
                pay_asset: req.pay_asset.clone(),
                pay_amount: outcome.pay_remaining,
                buy_asset: req.buy_asset.clone(),
                buy_amount: outcome.buy_remaining,
                original_pay_amount: outcome.pay_remaining,
                original_buy_amount: outcome.buy_remaining,
                observer: req.observer,
                created_at: now,
            })?;
        } else if let Some(observer) = req.observer {
            self.events.push(MarketEvent::Closure(ClosureReport {
                offer_id: id,
                owner: req.owner,
                observer,
                refunded_asset: req.pay_asset.clone(),
                refunded_amount: refund,
                fully_filled: true,
            }));
        }

        tracing::info!(
            offer = %id,
            owner = %req.owner,
            pay_asset = %req.pay_asset,
            pay_amount = req.pay_amount,
            buy_asset = %req.buy_asset,
            buy_amount = req.buy_amount,
            fills = outcome.fills.len(),
            resting,
            "offer placed"
        );
        Ok(Placement {
            id,
            fills: outcome.fills.len(),
            spent: outcome.spent,
            resting,
            refunded: refund,
        })
    }

    // =================================================================
    // Taking
    // =================================================================

    /// Take `quantity` of offer `id`'s pay asset, paying the proportional,
    /// floor-rounded buy amount.
    pub fn buy(
        &mut self,
        ledger: &mut AssetLedger,
        now: DateTime<Utc>,
        caller: AccountId,
        id: OfferId,
        quantity: u128,
    ) -> Result<Fill> {
        self.ensure_open(now)?;
        let offer = self.book.get(id).ok_or_else(|| self.inactive_or_missing(id))?;
        if offer.owner == caller {
            tracing::warn!(offer = %id, caller = %caller, "self-trade blocked");
            return Err(RiskpoolError::SelfTradeBlocked);
        }
        if quantity == 0 {
            return Err(RiskpoolError::invalid_amount("buy quantity is zero"));
        }
        if quantity > offer.pay_amount {
            return Err(RiskpoolError::invalid_amount(format!(
                "quantity {quantity} exceeds offer remainder {}",
                offer.pay_amount
            )));
        }
        let spend = matcher::spend_for(offer.pay_amount, offer.buy_amount, quantity)?;
        if spend == 0 {
            return Err(RiskpoolError::invalid_amount("fill rounds to zero"));
        }
        let maker = offer.owner;
        let pay_asset = offer.pay_asset.clone();
        let buy_asset = offer.buy_asset.clone();

        ledger.transfer_from(self.account, caller, self.account, &buy_asset, spend)?;
        let fill = matcher::take(&mut self.book, id, quantity, self.config.dust_limit(&pay_asset))?;
        debug_assert_eq!(fill.maker, maker);
        self.settle_fills(ledger, caller, &buy_asset, &pay_asset, std::slice::from_ref(&fill), None)?;
        Ok(fill)
    }

    /// Sell exactly `pay_amount` of `pay_asset` (or as much as the book
    /// absorbs) for `buy_asset`, best price first.
    ///
    /// # Errors
    /// `InsufficientLiquidity` if fewer than `min_fill` units are bought.
    pub fn sell_all_amount(
        &mut self,
        ledger: &mut AssetLedger,
        now: DateTime<Utc>,
        caller: AccountId,
        pay_asset: &str,
        pay_amount: u128,
        buy_asset: &str,
        min_fill: u128,
    ) -> Result<u128> {
        self.ensure_open(now)?;
        validate_pair(pay_asset, pay_amount, buy_asset, 1)?;

        let saved = self.book.clone();
        let outcome = match matcher::sweep(
            &mut self.book,
            caller,
            pay_asset,
            pay_amount,
            buy_asset,
            self.config.dust_limit(buy_asset),
        ) {
            Ok(o) => o,
            Err(e) => {
                self.book = saved;
                return Err(e);
            }
        };
        if outcome.bought < min_fill {
            self.book = saved;
            tracing::warn!(
                caller = %caller,
                pay_asset,
                pay_amount,
                buy_asset,
                bought = outcome.bought,
                min_fill,
                "sell-all below minimum fill"
            );
            return Err(RiskpoolError::InsufficientLiquidity {
                required: min_fill,
                filled: outcome.bought,
            });
        }
        if outcome.spent > 0 {
            if let Err(e) = ledger.transfer_from(self.account, caller, self.account, pay_asset, outcome.spent) {
                self.book = saved;
                return Err(e);
            }
        }
        self.settle_fills(ledger, caller, pay_asset, buy_asset, &outcome.fills, None)?;
        tracing::info!(
            caller = %caller,
            pay_asset,
            spent = outcome.spent,
            buy_asset,
            bought = outcome.bought,
            "sell-all executed"
        );
        Ok(outcome.bought)
    }

    // =================================================================
    // Cancellation
    // =================================================================

    /// Cancel offer `id`, refunding its escrow to the owner.
    ///
    /// Allowed for the owner, for anyone once the market has closed, and for
    /// a system admin while the offer is untouched.
    pub fn cancel(
        &mut self,
        ledger: &mut AssetLedger,
        roles: &dyn RoleOracle,
        now: DateTime<Utc>,
        caller: AccountId,
        id: OfferId,
    ) -> Result<()> {
        let offer = self.book.get(id).ok_or_else(|| self.inactive_or_missing(id))?;
        let allowed = offer.owner == caller
            || self.config.is_closed(now)
            || (roles.is_system_admin(caller) && offer.is_untouched());
        if !allowed {
            return Err(RiskpoolError::unauthorized("only the offer owner may cancel"));
        }

        let offer = self.book.remove_offer(id)?;
        ledger.transfer(self.account, offer.owner, &offer.pay_asset, offer.pay_amount)?;
        if let Some(observer) = offer.observer {
            self.events.push(MarketEvent::Closure(ClosureReport {
                offer_id: id,
                owner: offer.owner,
                observer,
                refunded_asset: offer.pay_asset.clone(),
                refunded_amount: offer.pay_amount,
                fully_filled: false,
            }));
        }
        tracing::info!(offer = %id, caller = %caller, refunded = offer.pay_amount, "offer cancelled");
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Whether `id` is resting with a nonzero remainder.
    #[must_use]
    pub fn is_active(&self, id: OfferId) -> bool {
        self.book.contains(id)
    }

    #[must_use]
    pub fn get_offer(&self, id: OfferId) -> Option<&Offer> {
        self.book.get(id)
    }

    #[must_use]
    pub fn get_owner(&self, id: OfferId) -> Option<AccountId> {
        self.book.get(id).map(|o| o.owner)
    }

    /// Best resting offer paying `pay_asset` for `buy_asset`.
    #[must_use]
    pub fn best_offer(&self, pay_asset: &str, buy_asset: &str) -> Option<OfferId> {
        self.book.best_offer(pay_asset, buy_asset, None).map(|o| o.id)
    }

    /// Offers paying `pay_asset` for `buy_asset`, aggregated per price level, best first.
    #[must_use]
    pub fn depth(&self, pay_asset: &str, buy_asset: &str) -> Vec<DepthLevel> {
        self.book
            .levels(pay_asset, buy_asset)
            .map(|level| DepthLevel {
                unit_price: level.front().and_then(Offer::unit_price),
                pay_amount: level.total_pay(),
                buy_amount: level.total_buy(),
                offers: level.len(),
            })
            .collect()
    }

    /// Resting offers owned by `owner`.
    pub fn offers_of(&self, owner: AccountId) -> impl Iterator<Item = &Offer> {
        self.book.offers_of(owner)
    }

    #[must_use]
    pub fn open_offer_count(&self) -> usize {
        self.book.offer_count()
    }

    /// Highest offer id issued so far (`OfferId(0)` before the first offer).
    #[must_use]
    pub fn last_offer_id(&self) -> OfferId {
        self.last_offer_id
    }

    /// Take all queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    // =================================================================
    // Internals
    // =================================================================

    fn ensure_open(&self, now: DateTime<Utc>) -> Result<()> {
        if self.config.is_closed(now) {
            return Err(RiskpoolError::MarketClosed);
        }
        Ok(())
    }

    fn next_offer_id(&mut self) -> OfferId {
        self.last_offer_id = self.last_offer_id.next();
        self.last_offer_id
    }

    fn inactive_or_missing(&self, id: OfferId) -> RiskpoolError {
        if id.0 >= constants::FIRST_OFFER_ID && id <= self.last_offer_id {
            RiskpoolError::OfferNotActive(id)
        } else {
            RiskpoolError::OfferNotFound(id)
        }
    }

    /// Pay out fills from escrow. `taker_pays` is the asset the taker has
    /// already placed in escrow, `taker_buys` the asset makers hand over.
    fn settle_fills(
        &mut self,
        ledger: &mut AssetLedger,
        taker: AccountId,
        taker_pays: &str,
        taker_buys: &str,
        fills: &[Fill],
        taker_tag: Option<(OfferId, OfferObserver)>,
    ) -> Result<()> {
        for fill in fills {
            ledger.transfer(self.account, fill.maker, taker_pays, fill.spend)?;
            ledger.transfer(self.account, taker, taker_buys, fill.quantity)?;
            if let Some(refund) = fill.closed.filter(|r| *r > 0) {
                ledger.transfer(self.account, fill.maker, taker_buys, refund)?;
            }

            if let Some(observer) = fill.observer {
                self.events.push(MarketEvent::Trade(TradeReport {
                    offer_id: fill.offer_id,
                    owner: fill.maker,
                    observer,
                    gave_asset: taker_buys.to_string(),
                    gave_amount: fill.quantity,
                    got_asset: taker_pays.to_string(),
                    got_amount: fill.spend,
                }));
                if let Some(refund) = fill.closed {
                    self.events.push(MarketEvent::Closure(ClosureReport {
                        offer_id: fill.offer_id,
                        owner: fill.maker,
                        observer,
                        refunded_asset: taker_buys.to_string(),
                        refunded_amount: refund,
                        fully_filled: true,
                    }));
                }
            }
            if let Some((offer_id, observer)) = taker_tag {
                self.events.push(MarketEvent::Trade(TradeReport {
                    offer_id,
                    owner: taker,
                    observer,
                    gave_asset: taker_pays.to_string(),
                    gave_amount: fill.spend,
                    got_asset: taker_buys.to_string(),
                    got_amount: fill.quantity,
                }));
            }
        }
        Ok(())
    }
}

fn validate_pair(pay_asset: &str, pay_amount: u128, buy_asset: &str, buy_amount: u128) -> Result<()> {
    if pay_amount == 0 || buy_amount == 0 {
        return Err(RiskpoolError::invalid_amount("offer amounts must be positive"));
    }
    if pay_asset.is_empty() || buy_asset.is_empty() {
        return Err(RiskpoolError::InvalidOffer {
            reason: "asset not set".into(),
        });
    }
    if pay_asset == buy_asset {
        return Err(RiskpoolError::InvalidOffer {
            reason: "cannot trade an asset for itself".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use riskpool_ledger::AclStore;
    use riskpool_types::{ObserverKind, PolicyId, RoleContext, fixtures};

    use super::*;

    struct Harness {
        market: Market,
        ledger: AssetLedger,
        acl: AclStore,
        admin: AccountId,
    }

    impl Harness {
        fn new(config: MarketConfig) -> Self {
            let admin = AccountId::new();
            Self {
                market: Market::new(AccountId::new(), config),
                ledger: AssetLedger::new(),
                acl: AclStore::bootstrap(admin),
                admin,
            }
        }

        fn funded(&mut self, asset: &str, amount: u128) -> AccountId {
            let user = AccountId::new();
            self.ledger.mint(user, asset, amount).unwrap();
            self.ledger.approve(user, self.market.account(), asset, amount);
            user
        }

        fn offer(&mut self, owner: AccountId, pay: (&str, u128), buy: (&str, u128)) -> Result<OfferId> {
            self.market.offer(
                &mut self.ledger,
                fixtures::epoch(),
                NewOffer::new(owner, pay.1, pay.0, buy.1, buy.0),
            )
        }
    }

    #[test]
    fn resting_offer_escrows_funds() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("DAI", 100);
        let id = h.offer(maker, ("DAI", 100), ("WETH", 10)).unwrap();
        assert_eq!(id, OfferId(1));
        assert!(h.market.is_active(id));
        assert_eq!(h.ledger.balance_of(maker, "DAI"), 0);
        assert_eq!(h.ledger.balance_of(h.market.account(), "DAI"), 100);
        assert_eq!(h.market.get_owner(id), Some(maker));
    }

    #[test]
    fn offer_ids_are_sequential_even_when_filled() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 10);
        let taker = h.funded("DAI", 20);
        let first = h.offer(maker, ("WETH", 10), ("DAI", 20)).unwrap();
        let second = h.offer(taker, ("DAI", 20), ("WETH", 10)).unwrap();
        assert_eq!((first, second), (OfferId(1), OfferId(2)));
        assert!(!h.market.is_active(first));
        assert!(!h.market.is_active(second));
        assert_eq!(h.ledger.balance_of(maker, "DAI"), 20);
        assert_eq!(h.ledger.balance_of(taker, "WETH"), 10);
        assert_eq!(h.ledger.balance_of(h.market.account(), "DAI"), 0);
    }

    #[test]
    fn rejects_invalid_offers() {
        let mut h = Harness::new(MarketConfig::default());
        let user = h.funded("DAI", 100);
        assert!(matches!(
            h.offer(user, ("DAI", 0), ("WETH", 1)),
            Err(RiskpoolError::InvalidAmount { .. })
        ));
        assert!(matches!(
            h.offer(user, ("DAI", 1), ("DAI", 1)),
            Err(RiskpoolError::InvalidOffer { .. })
        ));
        assert_eq!(h.market.last_offer_id(), OfferId(0));
    }

    #[test]
    fn escrow_failure_leaves_no_trace() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 10);
        h.offer(maker, ("WETH", 10), ("DAI", 10)).unwrap();
        let broke = AccountId::new();
        let err = h.offer(broke, ("DAI", 10), ("WETH", 10)).unwrap_err();
        assert!(err.to_string().contains("amount exceeds allowance"));
        assert!(h.market.get_offer(OfferId(1)).unwrap().is_untouched());
        assert_eq!(h.market.last_offer_id(), OfferId(1));
    }

    #[test]
    fn placement_accounts_for_all_escrow() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 5);
        h.offer(maker, ("WETH", 5), ("DAI", 5)).unwrap();
        let taker = h.funded("DAI", 12);
        let placement = h
            .market
            .place(&mut h.ledger, fixtures::epoch(), NewOffer::new(taker, 12, "DAI", 8, "WETH"))
            .unwrap();
        assert_eq!(placement.fills, 1);
        assert_eq!((placement.spent, placement.resting, placement.refunded), (5, 4, 3));
        assert_eq!(h.ledger.balance_of(taker, "DAI"), 3);
        let rest = h.market.get_offer(placement.id).unwrap();
        assert_eq!((rest.pay_amount, rest.buy_amount), (4, 3));
    }

    #[test]
    fn buy_partial_then_remainder() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 10);
        let id = h.offer(maker, ("WETH", 10), ("DAI", 20)).unwrap();
        let taker = h.funded("DAI", 20);

        let fill = h.market.buy(&mut h.ledger, fixtures::epoch(), taker, id, 4).unwrap();
        assert_eq!((fill.quantity, fill.spend), (4, 8));
        let offer = h.market.get_offer(id).unwrap();
        assert_eq!((offer.pay_amount, offer.buy_amount), (6, 12));

        h.market.buy(&mut h.ledger, fixtures::epoch(), taker, id, 6).unwrap();
        assert!(!h.market.is_active(id));
        assert_eq!(h.ledger.balance_of(taker, "WETH"), 10);
        assert_eq!(h.ledger.balance_of(maker, "DAI"), 20);
        assert!(matches!(
            h.market.buy(&mut h.ledger, fixtures::epoch(), taker, id, 1),
            Err(RiskpoolError::OfferNotActive(_))
        ));
    }

    #[test]
    fn buy_rejections() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 10);
        let id = h.offer(maker, ("WETH", 10), ("DAI", 20)).unwrap();
        let taker = h.funded("DAI", 20);
        let now = fixtures::epoch();
        assert!(matches!(
            h.market.buy(&mut h.ledger, now, taker, id, 0),
            Err(RiskpoolError::InvalidAmount { .. })
        ));
        assert_eq!(
            h.market.buy(&mut h.ledger, now, maker, id, 1).unwrap_err(),
            RiskpoolError::SelfTradeBlocked
        );
        assert!(matches!(
            h.market.buy(&mut h.ledger, now, taker, OfferId(99), 1),
            Err(RiskpoolError::OfferNotFound(_))
        ));
    }

    #[test]
    fn cancel_by_owner_refunds() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("DAI", 50);
        let id = h.offer(maker, ("DAI", 50), ("WETH", 5)).unwrap();
        let stranger = AccountId::new();
        let now = fixtures::epoch();
        assert!(matches!(
            h.market.cancel(&mut h.ledger, &h.acl, now, stranger, id),
            Err(RiskpoolError::Unauthorized { .. })
        ));
        h.market.cancel(&mut h.ledger, &h.acl, now, maker, id).unwrap();
        assert_eq!(h.ledger.balance_of(maker, "DAI"), 50);
        assert!(matches!(
            h.market.cancel(&mut h.ledger, &h.acl, now, maker, id),
            Err(RiskpoolError::OfferNotActive(_))
        ));
    }

    #[test]
    fn admin_cancels_only_untouched_offers() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 10);
        let first = h.offer(maker, ("WETH", 5), ("DAI", 5)).unwrap();
        let second = h.offer(maker, ("WETH", 5), ("DAI", 5)).unwrap();
        let taker = h.funded("DAI", 2);
        let now = fixtures::epoch();
        h.market.buy(&mut h.ledger, now, taker, first, 2).unwrap();

        let admin = h.admin;
        assert!(h.market.cancel(&mut h.ledger, &h.acl, now, admin, first).is_err());
        h.market.cancel(&mut h.ledger, &h.acl, now, admin, second).unwrap();
        assert!(h.acl.has_role(RoleContext::System, admin, riskpool_types::Role::SystemAdmin));
    }

    #[test]
    fn closed_market_blocks_trading_and_opens_cancel() {
        let close = fixtures::at(100);
        let mut h = Harness::new(MarketConfig {
            closing_time: Some(close),
            ..MarketConfig::default()
        });
        let maker = h.funded("DAI", 10);
        let id = h.offer(maker, ("DAI", 10), ("WETH", 1)).unwrap();

        let late = fixtures::at(200);
        assert_eq!(
            h.market
                .offer(&mut h.ledger, late, NewOffer::new(maker, 1, "DAI", 1, "WETH"))
                .unwrap_err(),
            RiskpoolError::MarketClosed
        );
        let anyone = AccountId::new();
        h.market.cancel(&mut h.ledger, &h.acl, late, anyone, id).unwrap();
        assert_eq!(h.ledger.balance_of(maker, "DAI"), 10);
    }

    #[test]
    fn dust_offers_rejected_and_dust_remainders_refunded() {
        let mut config = MarketConfig::default();
        config.dust_limits.insert("DAI".into(), 10);
        let mut h = Harness::new(config);
        let user = h.funded("DAI", 100);
        assert!(matches!(
            h.offer(user, ("DAI", 5), ("WETH", 5)),
            Err(RiskpoolError::InvalidOffer { .. })
        ));

        let maker = h.funded("WETH", 45);
        h.offer(maker, ("WETH", 45), ("DAI", 45)).unwrap();
        // Buys 45 of 50 wanted; the 5 DAI remainder is dust and goes back.
        let id = h.offer(user, ("DAI", 50), ("WETH", 50)).unwrap();
        assert!(!h.market.is_active(id));
        assert_eq!(h.ledger.balance_of(user, "DAI"), 55);
        assert_eq!(h.ledger.balance_of(user, "WETH"), 45);
    }

    #[test]
    fn matching_disabled_rests_crossing_offer() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 10);
        h.offer(maker, ("WETH", 10), ("DAI", 10)).unwrap();
        let taker = h.funded("DAI", 10);
        let id = h
            .market
            .offer(
                &mut h.ledger,
                fixtures::epoch(),
                NewOffer::new(taker, 10, "DAI", 10, "WETH").without_matching(),
            )
            .unwrap();
        assert!(h.market.is_active(id));
        assert_eq!(h.market.open_offer_count(), 2);
    }

    #[test]
    fn sell_all_amount_scenario() {
        const E18: u128 = 1_000_000_000_000_000_000;
        let mut h = Harness::new(MarketConfig::default());
        let a = h.funded("DAI", 20 * E18);
        let b = h.funded("DAI", 10 * E18);
        let first = h.offer(a, ("DAI", 20 * E18), ("WETH", 10 * E18)).unwrap();
        let second = h.offer(b, ("DAI", 10 * E18), ("WETH", 10 * E18)).unwrap();

        let seller = h.funded("WETH", 5 * E18);
        let bought = h
            .market
            .sell_all_amount(&mut h.ledger, fixtures::epoch(), seller, "WETH", 5 * E18, "DAI", 10 * E18)
            .unwrap();
        assert_eq!(bought, 10 * E18);
        let o1 = h.market.get_offer(first).unwrap();
        assert_eq!((o1.pay_amount, o1.buy_amount), (10 * E18, 5 * E18));
        assert!(h.market.get_offer(second).unwrap().is_untouched());
        assert_eq!(h.ledger.balance_of(seller, "DAI"), 10 * E18);
        assert_eq!(h.ledger.balance_of(a, "WETH"), 5 * E18);
    }

    #[test]
    fn sell_all_amount_below_minimum_reverts() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("DAI", 10);
        let id = h.offer(maker, ("DAI", 10), ("WETH", 10)).unwrap();
        let seller = h.funded("WETH", 20);
        let err = h
            .market
            .sell_all_amount(&mut h.ledger, fixtures::epoch(), seller, "WETH", 20, "DAI", 11)
            .unwrap_err();
        assert_eq!(
            err,
            RiskpoolError::InsufficientLiquidity {
                required: 11,
                filled: 10
            }
        );
        assert!(h.market.get_offer(id).unwrap().is_untouched());
        assert_eq!(h.ledger.balance_of(seller, "WETH"), 20);
    }

    #[test]
    fn observed_offers_emit_events() {
        let mut h = Harness::new(MarketConfig::default());
        let treasury = h.funded("TRANCHE", 10);
        let observer = OfferObserver {
            policy: PolicyId::new(),
            tranche: 0,
            kind: ObserverKind::TrancheSale,
        };
        let id = h
            .market
            .offer(
                &mut h.ledger,
                fixtures::epoch(),
                NewOffer::new(treasury, 10, "TRANCHE", 100, "DAI").with_observer(observer),
            )
            .unwrap();
        let buyer = h.funded("DAI", 100);
        h.market.buy(&mut h.ledger, fixtures::epoch(), buyer, id, 10).unwrap();

        let events = h.market.drain_events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            MarketEvent::Trade(t) => {
                assert_eq!((t.gave_amount, t.got_amount), (10, 100));
                assert_eq!(t.got_asset, "DAI");
            }
            MarketEvent::Closure(_) => panic!("expected trade first"),
        }
        assert!(matches!(&events[1], MarketEvent::Closure(c) if c.fully_filled));
        assert_eq!(h.market.pending_events(), 0);
    }

    #[test]
    fn depth_aggregates_levels() {
        let mut h = Harness::new(MarketConfig::default());
        let maker = h.funded("WETH", 30);
        h.offer(maker, ("WETH", 10), ("DAI", 20)).unwrap();
        h.offer(maker, ("WETH", 10), ("DAI", 20)).unwrap();
        h.offer(maker, ("WETH", 10), ("DAI", 30)).unwrap();
        let depth = h.market.depth("WETH", "DAI");
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].offers, 2);
        assert_eq!(depth[0].unit_price, Some(Decimal::new(2, 0)));
        assert_eq!(depth[1].unit_price, Some(Decimal::new(3, 0)));
        assert_eq!(h.market.best_offer("WETH", "DAI"), Some(OfferId(1)));
    }
}
