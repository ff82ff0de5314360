//! # riskpool-types
//!
//! Shared types, errors, and configuration for the **Riskpool** platform.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`EntityId`], [`PolicyId`], [`OfferId`], [`Asset`]
//! - **Amounts**: `u128` with 256-bit widened math and [`BasisPoints`]
//! - **Market model**: [`Offer`], [`OfferObserver`], [`MarketEvent`]
//! - **Treasury model**: [`Economics`], [`PolicyEconomics`], [`TreasuryClaim`]
//! - **Tranche model**: [`TrancheState`], [`PremiumEntry`], [`TrancheInfo`]
//! - **Policy model**: [`PolicyState`], [`PolicyType`], [`PolicyRole`], [`CommissionRates`]
//! - **Claims**: [`Claim`], [`ClaimState`]
//! - **Roles**: [`Role`], [`RoleContext`], [`RoleOracle`]
//! - **Configuration**: [`PlatformConfig`], [`MarketConfig`], [`PolicyLimits`]
//! - **Errors**: [`RiskpoolError`] with `RP_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod amount;
pub mod claim;
pub mod config;
pub mod constants;
pub mod economics;
pub mod error;
pub mod ids;
pub mod offer;
pub mod policy;
pub mod role;
pub mod tranche;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

pub use amount::BasisPoints;
pub use claim::*;
pub use config::*;
pub use economics::*;
pub use error::*;
pub use ids::*;
pub use offer::*;
pub use policy::*;
pub use role::*;
pub use tranche::*;

// Constants are accessed via `riskpool_types::constants::FOO` and the
// arithmetic helpers via `riskpool_types::amount::*`.
