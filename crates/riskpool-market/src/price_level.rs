//! A single price level in the offer book.
//!
//! Offers at the same price ratio are stored in FIFO order (time priority)
//! using a [`VecDeque`].

use std::cmp::Ordering;
use std::collections::VecDeque;

use riskpool_types::{AccountId, Offer, OfferId, amount::cmp_products};

/// Price of an offer as the exact ratio `buy / pay`.
///
/// Ordered ascending: the smallest ask per unit paid out is the best offer
/// for a taker. Ratios are compared by cross-multiplication in 256 bits, so
/// `10/20` and `5/10` are the same key.
#[derive(Debug, Clone, Copy)]
pub struct PriceKey {
    pub pay: u128,
    pub buy: u128,
}

impl PriceKey {
    #[must_use]
    pub fn of(offer: &Offer) -> Self {
        Self {
            pay: offer.original_pay_amount,
            buy: offer.original_buy_amount,
        }
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_products(self.buy, other.pay, other.buy, self.pay)
    }
}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PriceKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriceKey {}

/// All offers resting at one price ratio.
///
/// The front of the deque has the highest time priority and is filled first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: PriceKey,
    pub offers: VecDeque<Offer>,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: PriceKey) -> Self {
        Self {
            price,
            offers: VecDeque::new(),
        }
    }

    /// Add an offer at the back (lowest time priority).
    pub fn push_back(&mut self, offer: Offer) {
        self.offers.push_back(offer);
    }

    /// Peek at the oldest offer.
    #[must_use]
    pub fn front(&self) -> Option<&Offer> {
        self.offers.front()
    }

    /// Oldest offer not owned by `owner`.
    #[must_use]
    pub fn first_not_owned_by(&self, owner: Option<AccountId>) -> Option<&Offer> {
        self.offers
            .iter()
            .find(|o| owner.is_none_or(|skip| o.owner != skip))
    }

    /// Total remaining pay amount at this level.
    #[must_use]
    pub fn total_pay(&self) -> u128 {
        self.offers
            .iter()
            .fold(0u128, |acc, o| acc.saturating_add(o.pay_amount))
    }

    /// Total remaining buy amount at this level.
    #[must_use]
    pub fn total_buy(&self) -> u128 {
        self.offers
            .iter()
            .fold(0u128, |acc, o| acc.saturating_add(o.buy_amount))
    }

    pub fn get_mut(&mut self, id: OfferId) -> Option<&mut Offer> {
        self.offers.iter_mut().find(|o| o.id == id)
    }

    /// Remove a specific offer by id.
    pub fn remove_offer(&mut self, id: OfferId) -> Option<Offer> {
        let pos = self.offers.iter().position(|o| o.id == id)?;
        self.offers.remove(pos)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: u64, owner: AccountId, pay: u128, buy: u128) -> Offer {
        Offer::dummy(id, owner, ("DAI", pay), ("WETH", buy))
    }

    #[test]
    fn keys_compare_by_ratio() {
        let a = PriceKey { pay: 20, buy: 10 };
        let b = PriceKey { pay: 10, buy: 5 };
        let c = PriceKey { pay: 10, buy: 10 };
        assert_eq!(a, b);
        assert!(a < c, "half a unit asked per unit paid beats one");
    }

    #[test]
    fn keys_do_not_overflow() {
        let a = PriceKey {
            pay: u128::MAX,
            buy: u128::MAX - 1,
        };
        let b = PriceKey {
            pay: u128::MAX,
            buy: u128::MAX,
        };
        assert!(a < b);
    }

    #[test]
    fn fifo_order() {
        let owner = AccountId::new();
        let mut level = PriceLevel::new(PriceKey { pay: 1, buy: 1 });
        level.push_back(offer(1, owner, 5, 5));
        level.push_back(offer(2, owner, 7, 7));
        assert_eq!(level.front().unwrap().id, OfferId(1));
        assert_eq!(level.len(), 2);
        assert_eq!(level.total_pay(), 12);
        assert_eq!(level.total_buy(), 12);
    }

    #[test]
    fn skips_owner() {
        let me = AccountId::new();
        let other = AccountId::new();
        let mut level = PriceLevel::new(PriceKey { pay: 1, buy: 1 });
        level.push_back(offer(1, me, 5, 5));
        level.push_back(offer(2, other, 5, 5));
        assert_eq!(level.first_not_owned_by(Some(me)).unwrap().id, OfferId(2));
        assert_eq!(level.first_not_owned_by(None).unwrap().id, OfferId(1));
    }

    #[test]
    fn remove_by_id() {
        let owner = AccountId::new();
        let mut level = PriceLevel::new(PriceKey { pay: 1, buy: 1 });
        level.push_back(offer(1, owner, 5, 5));
        level.push_back(offer(2, owner, 5, 5));
        assert_eq!(level.remove_offer(OfferId(2)).unwrap().id, OfferId(2));
        assert!(level.remove_offer(OfferId(9)).is_none());
        assert_eq!(level.len(), 1);
    }
}
