//! # riskpool-platform
//!
//! The single entry point to a Riskpool instance.
//!
//! [`Platform`] wires the asset ledger, role store, market, per-entity
//! treasuries and policies together and advances them on one block clock.
//! Every mutating call is all-or-nothing, and the market events it causes
//! are delivered to the owning treasury and policy before it returns.
//!
//! ```text
//!  caller ──► Platform ──► Policy ──► Treasury ──► Market
//!                │                                   │
//!                └────────── MarketEvent routing ◄───┘
//! ```

pub mod entity;
pub mod platform;

pub use entity::{Entity, EntityRegistry};
pub use platform::Platform;
