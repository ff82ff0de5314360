//! # riskpool-market
//!
//! Escrowing offer book for fungible assets.
//!
//! ## Architecture
//!
//! ```text
//! Market ──> OrderBook ──> (pay, buy) pair ──> BTreeMap<PriceKey, PriceLevel>
//!   │                                                     └─> VecDeque<Offer>
//!   ├─> matcher (pure: match_limit, sweep, take)
//!   └─> AssetLedger (escrow in the market account)
//! ```
//!
//! Offers are priced by the exact ratio `buy / pay` of the amounts they
//! started resting with. Fills are proportional with floor rounding in favour
//! of the maker. Offers tagged with an observer report trades and closures
//! as [`MarketEvent`](riskpool_types::MarketEvent)s for the owning policy.

pub mod market;
pub mod matcher;
pub mod orderbook;
pub mod price_level;

pub use market::{DepthLevel, Market, NewOffer, Placement};
pub use matcher::{Fill, MatchOutcome, SweepOutcome, is_price_compatible, match_limit, spend_for, sweep, take};
pub use orderbook::OrderBook;
pub use price_level::{PriceKey, PriceLevel};
