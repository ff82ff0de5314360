//! Policy value types: states, parties, dates and commission figures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Asset, EntityId, PolicyId, Result, RiskpoolError, amount::BasisPoints, constants,
};

/// Lifecycle of a policy.
///
/// ```text
/// Created -> ReadyForApproval -> InApproval -> Approved -> Initiated -> Active
///    |              |                |            |                      |
///    +--------------+----------------+------------+-> Cancelled          v
///                                                          Matured <-> Buyback -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PolicyState {
    Created,
    ReadyForApproval,
    InApproval,
    Approved,
    Cancelled,
    Initiated,
    Active,
    Matured,
    Buyback,
    Closed,
}

impl PolicyState {
    /// Approval has not completed yet.
    #[must_use]
    pub fn is_pending_approval(self) -> bool {
        matches!(self, Self::Created | Self::ReadyForApproval | Self::InApproval)
    }

    /// No further transitions are possible.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Cancelled | Self::Closed)
    }
}

impl std::fmt::Display for PolicyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::ReadyForApproval => "READY_FOR_APPROVAL",
            Self::InApproval => "IN_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Cancelled => "CANCELLED",
            Self::Initiated => "INITIATED",
            Self::Active => "ACTIVE",
            Self::Matured => "MATURED",
            Self::Buyback => "BUYBACK",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Which parties must approve before a policy may initiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyType {
    /// Special purpose vehicle: underwriter, broker, insured party and claims admin.
    Spv,
    /// Portfolio cover: underwriter, broker and claims admin.
    Portfolio,
}

impl PolicyType {
    /// Roles whose approval is required.
    #[must_use]
    pub fn required_approvals(self) -> &'static [PolicyRole] {
        match self {
            Self::Spv => &[
                PolicyRole::Underwriter,
                PolicyRole::Broker,
                PolicyRole::InsuredParty,
                PolicyRole::ClaimsAdmin,
            ],
            Self::Portfolio => &[
                PolicyRole::Underwriter,
                PolicyRole::Broker,
                PolicyRole::ClaimsAdmin,
            ],
        }
    }
}

/// A party to a policy, represented by an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PolicyRole {
    Underwriter,
    Broker,
    InsuredParty,
    ClaimsAdmin,
}

impl std::fmt::Display for PolicyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Underwriter => write!(f, "underwriter"),
            Self::Broker => write!(f, "broker"),
            Self::InsuredParty => write!(f, "insured party"),
            Self::ClaimsAdmin => write!(f, "claims admin"),
        }
    }
}

/// Entities filling each policy role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyParties {
    pub underwriter: EntityId,
    pub broker: EntityId,
    /// Absent on portfolio policies.
    pub insured_party: Option<EntityId>,
    pub claims_admin: EntityId,
}

impl PolicyParties {
    /// Entity holding `role`, if any.
    #[must_use]
    pub fn entity_for(&self, role: PolicyRole) -> Option<EntityId> {
        match role {
            PolicyRole::Underwriter => Some(self.underwriter),
            PolicyRole::Broker => Some(self.broker),
            PolicyRole::InsuredParty => self.insured_party,
            PolicyRole::ClaimsAdmin => Some(self.claims_admin),
        }
    }
}

/// Key instants of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDates {
    /// Approvals must be complete and tranche sales begin.
    pub initiation: DateTime<Utc>,
    /// Cover starts; unsold tranches are cancelled.
    pub start: DateTime<Utc>,
    /// Cover ends; tranches mature and are bought back.
    pub maturation: DateTime<Utc>,
}

impl PolicyDates {
    /// Dates must be strictly increasing.
    pub fn validate(&self) -> Result<()> {
        if self.initiation >= self.start {
            return Err(RiskpoolError::InvalidPolicy {
                reason: "initiation date must be before start date".into(),
            });
        }
        if self.start >= self.maturation {
            return Err(RiskpoolError::InvalidPolicy {
                reason: "start date must be before maturation date".into(),
            });
        }
        Ok(())
    }
}

/// Commission rates per role, each applied to the gross premium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRates {
    pub broker: BasisPoints,
    pub underwriter: BasisPoints,
    pub claims_admin: BasisPoints,
    pub protocol: BasisPoints,
}

impl CommissionRates {
    /// Sum of all rates.
    #[must_use]
    pub fn total(&self) -> u32 {
        u32::from(self.broker.0)
            + u32::from(self.underwriter.0)
            + u32::from(self.claims_admin.0)
            + u32::from(self.protocol.0)
    }

    /// The combined rate may not exceed the whole premium.
    pub fn validate(&self) -> Result<()> {
        if self.total() > u32::from(constants::MAX_COMMISSION_BP) {
            return Err(RiskpoolError::InvalidPolicy {
                reason: format!("commission rates sum to {}bp", self.total()),
            });
        }
        Ok(())
    }
}

/// Commissions accrued on a policy and not yet paid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBalances {
    pub broker: u128,
    pub underwriter: u128,
    pub claims_admin: u128,
    pub protocol: u128,
}

impl CommissionBalances {
    /// Sum of all balances, saturating.
    #[must_use]
    pub fn total(&self) -> u128 {
        self.broker
            .saturating_add(self.underwriter)
            .saturating_add(self.claims_admin)
            .saturating_add(self.protocol)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

/// Everything needed to create a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTerms {
    pub policy_type: PolicyType,
    pub dates: PolicyDates,
    /// Denomination asset of every tranche and every premium.
    pub unit: Asset,
    pub parties: PolicyParties,
    /// Broker, underwriter and claims-admin rates. The protocol rate is
    /// taken from platform configuration.
    pub commissions: CommissionRates,
}

/// Read view of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInfo {
    pub id: PolicyId,
    pub treasury: EntityId,
    pub policy_type: PolicyType,
    pub state: PolicyState,
    pub dates: PolicyDates,
    pub unit: Asset,
    pub num_tranches: usize,
    pub commissions: CommissionRates,
    pub pending_approvals: Vec<PolicyRole>,
    pub num_claims: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dates(offsets: [i64; 3]) -> PolicyDates {
        let base = DateTime::from_timestamp(10_000, 0).unwrap();
        PolicyDates {
            initiation: base + Duration::seconds(offsets[0]),
            start: base + Duration::seconds(offsets[1]),
            maturation: base + Duration::seconds(offsets[2]),
        }
    }

    #[test]
    fn dates_must_increase() {
        dates([0, 10, 20]).validate().unwrap();
        assert!(dates([10, 10, 20]).validate().is_err());
        assert!(dates([0, 20, 20]).validate().is_err());
    }

    #[test]
    fn required_approvals_by_type() {
        assert_eq!(PolicyType::Spv.required_approvals().len(), 4);
        assert!(
            !PolicyType::Portfolio
                .required_approvals()
                .contains(&PolicyRole::InsuredParty)
        );
    }

    #[test]
    fn commission_total_limit() {
        let rates = CommissionRates {
            broker: BasisPoints(5_000),
            underwriter: BasisPoints(5_000),
            claims_admin: BasisPoints(1),
            protocol: BasisPoints::ZERO,
        };
        assert_eq!(rates.total(), 10_001);
        assert!(rates.validate().is_err());
        CommissionRates::default().validate().unwrap();
    }

    #[test]
    fn pending_and_final_states() {
        assert!(PolicyState::InApproval.is_pending_approval());
        assert!(!PolicyState::Approved.is_pending_approval());
        assert!(PolicyState::Closed.is_final());
        assert!(!PolicyState::Buyback.is_final());
        assert_eq!(PolicyState::ReadyForApproval.to_string(), "READY_FOR_APPROVAL");
    }
}
