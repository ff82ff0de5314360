//! # riskpool-treasury
//!
//! Per-entity pooled funds for policies.
//!
//! ## Architecture
//!
//! A [`Treasury`] keeps per-asset [`Economics`](riskpool_types::Economics)
//! and a [`PolicyEconomics`](riskpool_types::PolicyEconomics) entry for every
//! registered policy. Claims are paid from real funds when possible and
//! otherwise wait in a per-asset [`ClaimsQueue`] that drains strictly in
//! arrival order. Policies trade through the treasury: sale and buyback
//! offers are escrowed from treasury holdings and their market events are
//! booked back through [`Treasury::on_market_event`].
//!
//! [`TreasuryAudit`] checks the bookkeeping against ledger holdings.

pub mod audit;
pub mod claims_queue;
pub mod treasury;

pub use audit::TreasuryAudit;
pub use claims_queue::ClaimsQueue;
pub use treasury::{OrderRequest, Treasury};
