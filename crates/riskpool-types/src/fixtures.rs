//! Fixture constructors shared by the workspace test suites.

use chrono::{DateTime, Duration, Utc};

use crate::{
    CommissionRates, EntityId, PolicyDates, PolicyParties, PolicyTerms, PolicyType,
};

/// A fixed, readable point in time: 2030-01-01T00:00:00Z.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_893_456_000, 0).unwrap_or_default()
}

/// `epoch()` plus `secs` seconds.
#[must_use]
pub fn at(secs: i64) -> DateTime<Utc> {
    epoch() + Duration::seconds(secs)
}

/// Initiation, start and maturation `offsets` seconds after `epoch()`.
#[must_use]
pub fn dates(offsets: [i64; 3]) -> PolicyDates {
    PolicyDates {
        initiation: at(offsets[0]),
        start: at(offsets[1]),
        maturation: at(offsets[2]),
    }
}

/// Parties with freshly generated entity ids.
#[must_use]
pub fn parties() -> PolicyParties {
    PolicyParties {
        underwriter: EntityId::new(),
        broker: EntityId::new(),
        insured_party: Some(EntityId::new()),
        claims_admin: EntityId::new(),
    }
}

/// Terms for an SPV policy with no commissions.
#[must_use]
pub fn terms(unit: &str, dates: PolicyDates, parties: PolicyParties) -> PolicyTerms {
    PolicyTerms {
        policy_type: PolicyType::Spv,
        dates,
        unit: unit.to_string(),
        parties,
        commissions: CommissionRates::default(),
    }
}

/// A random amount in `1..=max`.
#[must_use]
pub fn random_amount(max: u128) -> u128 {
    rand::random::<u128>() % max.max(1) + 1
}
