//! The offer book for every asset pair.
//!
//! Each directed pair `(pay_asset, buy_asset)` has its own
//! `BTreeMap<PriceKey, PriceLevel>`, iterated best (lowest ask per unit)
//! first. An auxiliary `HashMap<OfferId, (pair, price)>` locates any resting
//! offer without scanning the book.

use std::collections::{BTreeMap, HashMap};

use riskpool_types::{AccountId, Asset, Offer, OfferId, Result, RiskpoolError};

use crate::price_level::{PriceKey, PriceLevel};

type Pair = (Asset, Asset);

/// Resting offers of one market instance.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pairs: BTreeMap<Pair, BTreeMap<PriceKey, PriceLevel>>,
    index: HashMap<OfferId, (Pair, PriceKey)>,
}

impl OrderBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =================================================================
    // Insertion / removal
    // =================================================================

    /// Rest an offer at its original price ratio.
    pub fn insert_offer(&mut self, offer: Offer) -> Result<()> {
        if self.index.contains_key(&offer.id) {
            return Err(RiskpoolError::AlreadyExists {
                reason: format!("{} already on the book", offer.id),
            });
        }
        if offer.original_pay_amount == 0 || offer.original_buy_amount == 0 {
            return Err(RiskpoolError::InvalidOffer {
                reason: "zero amount cannot rest".into(),
            });
        }
        let pair = (offer.pay_asset.clone(), offer.buy_asset.clone());
        let price = PriceKey::of(&offer);
        self.index.insert(offer.id, (pair.clone(), price));
        self.pairs
            .entry(pair)
            .or_default()
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(offer);
        Ok(())
    }

    /// Take an offer off the book.
    pub fn remove_offer(&mut self, id: OfferId) -> Result<Offer> {
        let (pair, price) = self
            .index
            .remove(&id)
            .ok_or(RiskpoolError::OfferNotFound(id))?;
        let levels = self
            .pairs
            .get_mut(&pair)
            .ok_or(RiskpoolError::OfferNotFound(id))?;
        let level = levels
            .get_mut(&price)
            .ok_or(RiskpoolError::OfferNotFound(id))?;
        let offer = level
            .remove_offer(id)
            .ok_or(RiskpoolError::OfferNotFound(id))?;
        if level.is_empty() {
            levels.remove(&price);
        }
        if levels.is_empty() {
            self.pairs.remove(&pair);
        }
        Ok(offer)
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn get(&self, id: OfferId) -> Option<&Offer> {
        let (pair, price) = self.index.get(&id)?;
        self.pairs
            .get(pair)?
            .get(price)?
            .offers
            .iter()
            .find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: OfferId) -> Option<&mut Offer> {
        let (pair, price) = self.index.get(&id)?;
        self.pairs.get_mut(pair)?.get_mut(price)?.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: OfferId) -> bool {
        self.index.contains_key(&id)
    }

    /// Best offer paying `pay_asset` for `buy_asset`, skipping offers owned
    /// by `skip_owner`. Equal prices resolve oldest first.
    #[must_use]
    pub fn best_offer(&self, pay_asset: &str, buy_asset: &str, skip_owner: Option<AccountId>) -> Option<&Offer> {
        self.levels(pay_asset, buy_asset)
            .find_map(|level| level.first_not_owned_by(skip_owner))
    }

    /// Price levels for a pair, best first.
    pub fn levels(&self, pay_asset: &str, buy_asset: &str) -> impl Iterator<Item = &PriceLevel> {
        self.pairs
            .get(&(pay_asset.to_string(), buy_asset.to_string()))
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    /// Resting offers owned by `owner`.
    pub fn offers_of(&self, owner: AccountId) -> impl Iterator<Item = &Offer> {
        self.pairs
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(|level| level.offers.iter())
            .filter(move |o| o.owner == owner)
    }

    #[must_use]
    pub fn offer_count(&self) -> usize {
        self.index.len()
    }

    /// Number of directed pairs with at least one resting offer.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
