//! # riskpool-policy
//!
//! The policy aggregate and its lifecycle.
//!
//! ## Architecture
//!
//! A [`Policy`] owns its tranches, approvals, claims and accrued commissions.
//! Everything outside it (balances, roles, the treasury and the market) is
//! reached through a [`PolicyEnvironment`]. Operations are grouped by facet:
//!
//! - **Core**: tranche creation, approvals and the heartbeat
//!   ([`Policy::check_and_update_state`])
//! - **Premiums**: [`Policy::pay_premium`]
//! - **Claims**: make, dispute, approve, decline and pay
//! - **Commissions**: [`Policy::pay_commissions`]
//!
//! Each facet resolves its implementation version through the platform's
//! [`DispatchTable`] before running.
//!
//! Market activity on offers the treasury placed for the policy comes back
//! as [`MarketEvent`](riskpool_types::MarketEvent)s, booked by
//! [`Policy::on_market_event`].

pub mod claims;
pub mod commissions;
pub mod env;
pub mod facets;
pub mod heartbeat;
pub mod policy;
pub mod premiums;
pub mod tranche;

#[cfg(test)]
pub(crate) mod testing;

pub use env::{AccountDirectory, Environment, PolicyEnvironment};
pub use facets::{DispatchTable, Facet, FacetVersion};
pub use policy::Policy;
pub use tranche::Tranche;
