//! Identifiers used throughout Riskpool.
//!
//! Account-like identities (`AccountId`, `EntityId`, `PolicyId`) use UUIDv7
//! for time-ordered sorting. Offers use a sequential `OfferId` owned by the
//! market instance that issued them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Asset symbol (e.g. "DAI", "WETH", or a derived tranche-token symbol).
pub type Asset = String;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Anything that can hold fungible balances: users, entity accounts,
/// treasuries, policies, the market escrow and the protocol fee bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Last four bytes, hex encoded. Handy in log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0.as_bytes()[12..])
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An organisation registered on the platform. Owns one treasury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PolicyId
// ---------------------------------------------------------------------------

/// A policy created by an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Deterministic symbol of the tranche token for tranche `index`.
    ///
    /// Every node derives the same symbol for the same policy and index.
    #[must_use]
    pub fn tranche_token(&self, index: usize) -> Asset {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"riskpool:tranche_token:v1:");
        hasher.update(self.0.as_bytes());
        hasher.update((index as u64).to_le_bytes());
        let hash = hasher.finalize();
        format!("TRANCHE-{}-{index}", hex::encode(&hash[..6]))
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OfferId
// ---------------------------------------------------------------------------

/// Sequential offer identifier, monotonically increasing per market.
///
/// `OfferId(0)` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OfferId(pub u64);

impl OfferId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offer:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
