//! Pure matching against the offer book.
//!
//! The functions here walk the book and adjust resting offers, producing a
//! list of [`Fill`]s. They never touch balances: the [`Market`](crate::Market)
//! applies the resulting transfers once a match is final.
//!
//! ## Price compatibility
//!
//! A taker paying `t_pay` for `t_buy` crosses a maker paying `m_pay` for
//! `m_buy` when `t_pay * m_pay >= m_buy * t_buy`. Both products are formed
//! in 256 bits.
//!
//! ## Self-Trade Prevention
//!
//! Offers owned by the taker are skipped. The taker continues with the next
//! offer at that level.

use std::cmp::Ordering;

use riskpool_types::{
    AccountId, OfferId, OfferObserver, Result, RiskpoolError,
    amount::{checked_sub, cmp_products, mul_div_floor},
};

use crate::OrderBook;

/// One fill of a resting offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub offer_id: OfferId,
    pub maker: AccountId,
    pub observer: Option<OfferObserver>,
    /// Amount of the maker's pay asset handed to the taker.
    pub quantity: u128,
    /// Amount of the maker's buy asset the taker pays.
    pub spend: u128,
    /// Set when the offer left the book: the escrow returned to the maker
    /// (zero when fully consumed, the dust remainder otherwise).
    pub closed: Option<u128>,
}

/// Result of matching a new limit offer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub fills: Vec<Fill>,
    /// Pay amount still available to rest.
    pub pay_remaining: u128,
    /// Buy amount still wanted.
    pub buy_remaining: u128,
    /// Total paid to makers.
    pub spent: u128,
}

/// Result of a market sell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub fills: Vec<Fill>,
    /// Total received by the taker.
    pub bought: u128,
    /// Total paid to makers.
    pub spent: u128,
}

/// Does a taker paying `taker_pay` for `taker_buy` cross a maker paying
/// `maker_pay` for `maker_buy`?
#[must_use]
pub fn is_price_compatible(taker_pay: u128, taker_buy: u128, maker_pay: u128, maker_buy: u128) -> bool {
    cmp_products(maker_buy, taker_buy, taker_pay, maker_pay) != Ordering::Greater
}

/// Amount a taker pays for `quantity` of an offer's pay asset, floor-rounded.
/// Taking the whole remainder pays the exact remaining buy amount.
pub fn spend_for(pay_amount: u128, buy_amount: u128, quantity: u128) -> Result<u128> {
    if quantity == pay_amount {
        return Ok(buy_amount);
    }
    mul_div_floor(quantity, buy_amount, pay_amount)
}

/// Take `quantity` from resting offer `id`.
///
/// An offer whose remainder falls to zero, or below `dust`, leaves the book.
///
/// # Errors
/// `OfferNotActive` if the offer is not resting, `InvalidAmount` for a zero
/// quantity, a quantity above the remaining amount, or a fill that would
/// cost the taker nothing.
pub fn take(book: &mut OrderBook, id: OfferId, quantity: u128, dust: u128) -> Result<Fill> {
    let offer = book.get_mut(id).ok_or(RiskpoolError::OfferNotActive(id))?;
    if quantity == 0 {
        return Err(RiskpoolError::invalid_amount("fill quantity is zero"));
    }
    if quantity > offer.pay_amount {
        return Err(RiskpoolError::invalid_amount(format!(
            "fill {quantity} exceeds offer remainder {}",
            offer.pay_amount
        )));
    }
    let spend = spend_for(offer.pay_amount, offer.buy_amount, quantity)?;
    if spend == 0 {
        return Err(RiskpoolError::invalid_amount("fill rounds to zero"));
    }

    offer.pay_amount = checked_sub(offer.pay_amount, quantity, "offer pay remainder")?;
    offer.buy_amount = checked_sub(offer.buy_amount, spend, "offer buy remainder")?;
    let mut fill = Fill {
        offer_id: id,
        maker: offer.owner,
        observer: offer.observer,
        quantity,
        spend,
        closed: None,
    };

    let remainder = offer.pay_amount;
    if remainder == 0 || remainder < dust {
        book.remove_offer(id)?;
        fill.closed = Some(remainder);
    }
    tracing::debug!(offer = %id, quantity, spend, closed = fill.closed.is_some(), "fill");
    Ok(fill)
}

/// Match a new limit offer against the book.
///
/// The taker pays `pay_asset` and wants `buy_asset`. Makers are visited
/// best price first; matching stops at the first incompatible price. After
/// each fill the taker's pay amount is scaled to its remaining buy amount,
/// keeping the taker's own price.
pub fn match_limit(
    book: &mut OrderBook,
    taker: AccountId,
    pay_asset: &str,
    pay_amount: u128,
    buy_asset: &str,
    buy_amount: u128,
    maker_dust: u128,
) -> Result<MatchOutcome> {
    let mut out = MatchOutcome {
        pay_remaining: pay_amount,
        buy_remaining: buy_amount,
        ..MatchOutcome::default()
    };

    while out.pay_remaining > 0 && out.buy_remaining > 0 {
        // Makers pay what the taker buys.
        let Some(best) = book.best_offer(buy_asset, pay_asset, Some(taker)) else {
            break;
        };
        if !is_price_compatible(
            out.pay_remaining,
            out.buy_remaining,
            best.pay_amount,
            best.buy_amount,
        ) {
            break;
        }
        let id = best.id;
        let quantity = best.pay_amount.min(out.buy_remaining);
        if spend_for(best.pay_amount, best.buy_amount, quantity)? == 0 {
            break;
        }

        let fill = take(book, id, quantity, maker_dust)?;
        out.spent = out
            .spent
            .checked_add(fill.spend)
            .ok_or(RiskpoolError::Overflow { context: "match spent" })?;

        let buy_before = out.buy_remaining;
        out.buy_remaining = checked_sub(out.buy_remaining, quantity, "taker buy remainder")?;
        out.pay_remaining = mul_div_floor(out.buy_remaining, out.pay_remaining, buy_before)?;
        out.fills.push(fill);
    }
    Ok(out)
}

/// Sell `pay_amount` of `pay_asset` for as much `buy_asset` as the book
/// offers, best price first, with no price limit.
pub fn sweep(
    book: &mut OrderBook,
    taker: AccountId,
    pay_asset: &str,
    pay_amount: u128,
    buy_asset: &str,
    maker_dust: u128,
) -> Result<SweepOutcome> {
    let mut out = SweepOutcome::default();
    let mut remaining = pay_amount;

    while remaining > 0 {
        let Some(best) = book.best_offer(buy_asset, pay_asset, Some(taker)) else {
            break;
        };
        let id = best.id;
        let quantity = if remaining >= best.buy_amount {
            best.pay_amount
        } else {
            mul_div_floor(remaining, best.pay_amount, best.buy_amount)?
        };
        if quantity == 0 || spend_for(best.pay_amount, best.buy_amount, quantity)? == 0 {
            break;
        }

        let fill = take(book, id, quantity, maker_dust)?;
        remaining = checked_sub(remaining, fill.spend, "sweep remainder")?;
        out.spent = checked_sub(pay_amount, remaining, "sweep spent")?;
        out.bought = out
            .bought
            .checked_add(fill.quantity)
            .ok_or(RiskpoolError::Overflow { context: "sweep bought" })?;
        out.fills.push(fill);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use riskpool_types::Offer;

    use super::*;

    const E18: u128 = 1_000_000_000_000_000_000;

    fn book_with(offers: Vec<Offer>) -> OrderBook {
        let mut book = OrderBook::new();
        for o in offers {
            book.insert_offer(o).unwrap();
        }
        book
    }

    #[test]
    fn compatibility_is_inclusive() {
        assert!(is_price_compatible(10, 5, 10, 20));
        assert!(is_price_compatible(20, 10, 10, 20));
        assert!(!is_price_compatible(10, 10, 10, 20));
    }

    #[test]
    fn spend_rounds_down_and_final_fill_is_exact() {
        assert_eq!(spend_for(3, 10, 1).unwrap(), 3);
        assert_eq!(spend_for(3, 10, 3).unwrap(), 10);
    }

    #[test]
    fn take_partial_then_full() {
        let maker = AccountId::new();
        let mut book = book_with(vec![Offer::dummy(1, maker, ("DAI", 20 * E18), ("WETH", 10 * E18))]);
        let fill = take(&mut book, OfferId(1), 10 * E18, 0).unwrap();
        assert_eq!(fill.spend, 5 * E18);
        assert_eq!(fill.closed, None);
        let offer = book.get(OfferId(1)).unwrap();
        assert_eq!((offer.pay_amount, offer.buy_amount), (10 * E18, 5 * E18));

        let fill = take(&mut book, OfferId(1), 10 * E18, 0).unwrap();
        assert_eq!(fill.closed, Some(0));
        assert!(book.is_empty());
    }

    #[test]
    fn take_rejects_bad_quantities() {
        let mut book = book_with(vec![Offer::dummy(1, AccountId::new(), ("DAI", 1000), ("WETH", 1))]);
        assert!(take(&mut book, OfferId(1), 0, 0).is_err());
        assert!(take(&mut book, OfferId(1), 1001, 0).is_err());
        assert!(take(&mut book, OfferId(1), 1, 0).is_err(), "spend rounds to zero");
        assert!(matches!(
            take(&mut book, OfferId(2), 1, 0),
            Err(RiskpoolError::OfferNotActive(_))
        ));
    }

    #[test]
    fn take_closes_dust_remainder() {
        let mut book = book_with(vec![Offer::dummy(1, AccountId::new(), ("DAI", 100), ("WETH", 100))]);
        let fill = take(&mut book, OfferId(1), 95, 10).unwrap();
        assert_eq!(fill.closed, Some(5));
        assert!(book.is_empty());
    }

    #[test]
    fn limit_match_partial_fill_rests_remainder() {
        // Maker sells 10 WETH for 20 DAI; taker pays 10 DAI for 5 WETH.
        let maker = AccountId::new();
        let mut book = book_with(vec![Offer::dummy(1, maker, ("WETH", 10), ("DAI", 20))]);
        let out = match_limit(&mut book, AccountId::new(), "DAI", 10, "WETH", 5, 0).unwrap();
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].quantity, 5);
        assert_eq!(out.fills[0].spend, 10);
        assert_eq!((out.pay_remaining, out.buy_remaining), (0, 0));
        let offer = book.get(OfferId(1)).unwrap();
        assert_eq!((offer.pay_amount, offer.buy_amount), (5, 10));
    }

    #[test]
    fn limit_match_stops_at_incompatible_price() {
        let mut book = book_with(vec![Offer::dummy(1, AccountId::new(), ("WETH", 10), ("DAI", 20))]);
        let out = match_limit(&mut book, AccountId::new(), "DAI", 10, "WETH", 10, 0).unwrap();
        assert!(out.fills.is_empty());
        assert_eq!((out.pay_remaining, out.buy_remaining), (10, 10));
    }

    #[test]
    fn limit_match_walks_levels_and_keeps_taker_price() {
        let mut book = book_with(vec![
            Offer::dummy(1, AccountId::new(), ("WETH", 5), ("DAI", 5)),
            Offer::dummy(2, AccountId::new(), ("WETH", 5), ("DAI", 10)),
        ]);
        // Taker pays up to 2 DAI per WETH for 8 WETH.
        let out = match_limit(&mut book, AccountId::new(), "DAI", 16, "WETH", 8, 0).unwrap();
        assert_eq!(out.fills.len(), 2);
        assert_eq!(out.fills[0].offer_id, OfferId(1));
        assert_eq!(out.spent, 5 + 6);
        assert_eq!((out.pay_remaining, out.buy_remaining), (0, 0));
        let second = book.get(OfferId(2)).unwrap();
        assert_eq!((second.pay_amount, second.buy_amount), (2, 4));
    }

    #[test]
    fn limit_match_remainder_keeps_taker_price() {
        let mut book = book_with(vec![
            Offer::dummy(1, AccountId::new(), ("WETH", 5), ("DAI", 5)),
            Offer::dummy(2, AccountId::new(), ("WETH", 5), ("DAI", 10)),
        ]);
        // 1.5 DAI per WETH crosses the first level only.
        let out = match_limit(&mut book, AccountId::new(), "DAI", 12, "WETH", 8, 0).unwrap();
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.spent, 5);
        assert_eq!((out.pay_remaining, out.buy_remaining), (4, 3));
        assert!(out.spent + out.pay_remaining <= 12);
    }

    #[test]
    fn limit_match_skips_own_offers() {
        let me = AccountId::new();
        let mut book = book_with(vec![
            Offer::dummy(1, me, ("WETH", 10), ("DAI", 10)),
            Offer::dummy(2, AccountId::new(), ("WETH", 10), ("DAI", 10)),
        ]);
        let out = match_limit(&mut book, me, "DAI", 10, "WETH", 10, 0).unwrap();
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].offer_id, OfferId(2));
        assert!(book.contains(OfferId(1)));
    }

    #[test]
    fn sweep_takes_best_first() {
        // Two bids for WETH: 20 DAI for 10 WETH and 10 DAI for 10 WETH.
        let mut book = book_with(vec![
            Offer::dummy(1, AccountId::new(), ("DAI", 20 * E18), ("WETH", 10 * E18)),
            Offer::dummy(2, AccountId::new(), ("DAI", 10 * E18), ("WETH", 10 * E18)),
        ]);
        let out = sweep(&mut book, AccountId::new(), "WETH", 5 * E18, "DAI", 0).unwrap();
        assert_eq!(out.bought, 10 * E18);
        assert_eq!(out.spent, 5 * E18);
        let first = book.get(OfferId(1)).unwrap();
        assert_eq!((first.pay_amount, first.buy_amount), (10 * E18, 5 * E18));
        assert!(book.get(OfferId(2)).unwrap().is_untouched());
    }

    #[test]
    fn sweep_stops_when_book_is_empty() {
        let mut book = book_with(vec![Offer::dummy(1, AccountId::new(), ("DAI", 10), ("WETH", 10))]);
        let out = sweep(&mut book, AccountId::new(), "WETH", 50, "DAI", 0).unwrap();
        assert_eq!(out.bought, 10);
        assert_eq!(out.spent, 10);
        assert!(book.is_empty());
    }

    #[test]
    fn random_fills_respect_maker_price() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let pay: u128 = rng.gen_range(1..1_000_000);
            let buy: u128 = rng.gen_range(1..1_000_000);
            let mut book = book_with(vec![Offer::dummy(1, AccountId::new(), ("DAI", pay), ("WETH", buy))]);
            let quantity = rng.gen_range(1..=pay);
            if let Ok(fill) = take(&mut book, OfferId(1), quantity, 0) {
                // floor rounding: spend * pay <= quantity * buy < (spend + 1) * pay
                assert!(fill.spend * pay <= quantity * buy);
                assert!(quantity * buy < (fill.spend + 1) * pay);
            }
        }
    }
}
