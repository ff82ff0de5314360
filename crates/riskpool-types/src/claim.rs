//! Policy-level claim types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// Disposition of a claim.
///
/// `Created <-> Disputed`, then `Approved | Declined`, then `Approved -> Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ClaimState {
    Created,
    Disputed,
    Approved,
    Declined,
    Paid,
}

impl ClaimState {
    /// Still awaiting approval or decline.
    #[must_use]
    pub fn is_undecided(self) -> bool {
        matches!(self, Self::Created | Self::Disputed)
    }
}

impl std::fmt::Display for ClaimState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Declined => write!(f, "DECLINED"),
            Self::Paid => write!(f, "PAID"),
        }
    }
}

/// A claim against one tranche of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub tranche: usize,
    pub amount: u128,
    /// Entity whose account receives the payout.
    pub claimant: EntityId,
    pub state: ClaimState,
    /// Set while disputed.
    pub disputed: bool,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

/// Claim counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStats {
    pub created: usize,
    pub disputed: usize,
    pub approved: usize,
    pub declined: usize,
    pub paid: usize,
    pub acknowledged: usize,
}

impl ClaimStats {
    /// Claims not yet approved or declined.
    #[must_use]
    pub fn undecided(&self) -> usize {
        self.created + self.disputed
    }
}

impl<'a> FromIterator<&'a Claim> for ClaimStats {
    fn from_iter<I: IntoIterator<Item = &'a Claim>>(iter: I) -> Self {
        let mut stats = Self::default();
        for claim in iter {
            match claim.state {
                ClaimState::Created => stats.created += 1,
                ClaimState::Disputed => stats.disputed += 1,
                ClaimState::Approved => stats.approved += 1,
                ClaimState::Declined => stats.declined += 1,
                ClaimState::Paid => stats.paid += 1,
            }
            if claim.acknowledged {
                stats.acknowledged += 1;
            }
        }
        stats
    }
}
