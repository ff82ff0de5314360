//! Tranche value types: lifecycle states, premium entries and read views.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Asset, OfferId};

/// Lifecycle of a tranche.
///
/// ```text
/// Created -> Selling -> Active -> Matured
///    |          |         |
///    +----------+---------+----> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum TrancheState {
    Created,
    Selling,
    Active,
    Matured,
    Cancelled,
}

impl TrancheState {
    /// Matured and cancelled tranches never change state again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Matured | Self::Cancelled)
    }
}

impl std::fmt::Display for TrancheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Selling => write!(f, "SELLING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Matured => write!(f, "MATURED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One scheduled premium obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumEntry {
    pub amount: u128,
    pub due_at: DateTime<Utc>,
}

impl PremiumEntry {
    #[must_use]
    pub fn new(amount: u128, due_at: DateTime<Utc>) -> Self {
        Self { amount, due_at }
    }

    /// Build a schedule of `amounts` due every `interval`, the first one at `first_due`.
    #[must_use]
    pub fn schedule(amounts: &[u128], first_due: DateTime<Utc>, interval: Duration) -> Vec<Self> {
        let mut due_at = first_due;
        let mut out = Vec::with_capacity(amounts.len());
        for &amount in amounts {
            out.push(Self { amount, due_at });
            due_at += interval;
        }
        out
    }
}

/// Parameters for a new tranche.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheSpec {
    pub num_shares: u128,
    pub price_per_share: u128,
    pub denomination: Asset,
    pub premiums: Vec<PremiumEntry>,
    /// Receives the minted tranche tokens. `None` means the policy's treasury,
    /// which lists them for sale once the policy initiates.
    pub initial_holder: Option<AccountId>,
}

/// Read view of a tranche.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheInfo {
    pub index: usize,
    pub state: TrancheState,
    pub token: Asset,
    pub num_shares: u128,
    pub price_per_share: u128,
    pub denomination: Asset,
    pub num_premiums: usize,
    pub num_premiums_paid: usize,
    /// Still owed on the next premium (zero when all are paid).
    pub next_premium_amount: u128,
    pub next_premium_due_at: Option<DateTime<Utc>>,
    /// Paid so far toward the next premium.
    pub next_premium_paid_so_far: u128,
    /// Premiums whose due date has passed unpaid.
    pub premium_payments_missed: usize,
    pub premium_payments_total: u128,
    pub shares_sold: u128,
    pub initial_sale_offer_id: Option<OfferId>,
    pub final_buyback_offer_id: Option<OfferId>,
    pub buyback_completed: bool,
    /// Premium income net of commissions plus sale proceeds, less approved claims.
    pub balance: u128,
}

/// Read view of a single premium entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumInfo {
    pub amount: u128,
    pub due_at: DateTime<Utc>,
    pub paid: bool,
}
