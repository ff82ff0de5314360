//! # riskpool-ledger
//!
//! Shared state the economic engines are built on:
//!
//! 1. **AssetLedger**: balances, allowances and supply for every fungible asset
//! 2. **AclStore**: role assignments, queried through `RoleOracle`
//! 3. **ReentrancyLock**: scoped guard for fund-moving critical sections
//!
//! None of these know about policies or offers. The market, treasury and
//! policy planes receive them by reference.

pub mod acl;
pub mod asset_ledger;
pub mod reentrancy;

pub use acl::AclStore;
pub use asset_ledger::AssetLedger;
pub use reentrancy::{ReentrancyGuard, ReentrancyLock};
