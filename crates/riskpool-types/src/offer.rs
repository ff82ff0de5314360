//! Offer and market event types.
//!
//! An [`Offer`] escrows `pay_amount` of `pay_asset` in the market and asks
//! for `buy_amount` of `buy_asset` in return. Offers placed by a treasury on
//! behalf of a policy carry an [`OfferObserver`]; every fill and closure of
//! such an offer is reported as a [`MarketEvent`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, Asset, OfferId, PolicyId, amount::to_decimal};

/// Why a policy placed an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObserverKind {
    /// Initial sale of tranche tokens held by the treasury.
    TrancheSale,
    /// Policy repurchasing its tranche tokens at maturity.
    Buyback,
}

impl std::fmt::Display for ObserverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrancheSale => write!(f, "TRANCHE_SALE"),
            Self::Buyback => write!(f, "BUYBACK"),
        }
    }
}

/// Tags an offer with the policy and tranche it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferObserver {
    pub policy: PolicyId,
    pub tranche: usize,
    pub kind: ObserverKind,
}

/// A resting offer on the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub owner: AccountId,
    pub pay_asset: Asset,
    /// Remaining amount escrowed.
    pub pay_amount: u128,
    pub buy_asset: Asset,
    /// Remaining amount asked for.
    pub buy_amount: u128,
    /// Pay amount when the offer started resting. Defines the book price.
    pub original_pay_amount: u128,
    /// Buy amount when the offer started resting.
    pub original_buy_amount: u128,
    pub observer: Option<OfferObserver>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Nothing has been taken from this offer since it started resting.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.pay_amount == self.original_pay_amount && self.buy_amount == self.original_buy_amount
    }

    /// Amount of `buy_asset` asked per unit of `pay_asset`, for display.
    #[must_use]
    pub fn unit_price(&self) -> Option<Decimal> {
        to_decimal(self.original_buy_amount)?.checked_div(to_decimal(self.original_pay_amount)?)
    }

    /// Amount of `pay_asset` already handed out.
    #[must_use]
    pub fn filled_pay_amount(&self) -> u128 {
        self.original_pay_amount.saturating_sub(self.pay_amount)
    }
}

impl std::fmt::Display for Offer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Offer[{}] {} {} for {} {}",
            self.id, self.pay_amount, self.pay_asset, self.buy_amount, self.buy_asset
        )
    }
}

/// A single fill, seen from the observed offer's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReport {
    pub offer_id: OfferId,
    pub owner: AccountId,
    pub observer: OfferObserver,
    /// Asset and amount the observed offer handed over.
    pub gave_asset: Asset,
    pub gave_amount: u128,
    /// Asset and amount the observed offer received.
    pub got_asset: Asset,
    pub got_amount: u128,
}

/// An observed offer left the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureReport {
    pub offer_id: OfferId,
    pub owner: AccountId,
    pub observer: OfferObserver,
    /// Escrow returned to the owner.
    pub refunded_asset: Asset,
    pub refunded_amount: u128,
    /// The offer left the book through trading (any refund is a rounding
    /// or dust remainder), not through cancellation.
    pub fully_filled: bool,
}

/// Event queued by the market for observed offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketEvent {
    Trade(TradeReport),
    Closure(ClosureReport),
}

impl MarketEvent {
    #[must_use]
    pub fn observer(&self) -> &OfferObserver {
        match self {
            Self::Trade(t) => &t.observer,
            Self::Closure(c) => &c.observer,
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    pub fn dummy(id: u64, owner: AccountId, pay: (&str, u128), buy: (&str, u128)) -> Self {
        Self {
            id: OfferId(id),
            owner,
            pay_asset: pay.0.to_string(),
            pay_amount: pay.1,
            buy_asset: buy.0.to_string(),
            buy_amount: buy.1,
            original_pay_amount: pay.1,
            original_buy_amount: buy.1,
            observer: None,
            created_at: Utc::now(),
        }
    }
}
