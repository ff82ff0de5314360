//! Configuration types for a Riskpool platform instance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Asset, Result, RiskpoolError, constants};

/// Top-level platform configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Market (order book) settings.
    pub market: MarketConfig,
    /// Limits applied when building policies.
    pub policy: PolicyLimits,
    /// Protocol commission charged on every premium payment, in basis points.
    pub protocol_commission_bp: u16,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            policy: PolicyLimits::default(),
            protocol_commission_bp: constants::DEFAULT_PROTOCOL_COMMISSION_BP,
        }
    }
}

impl PlatformConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| RiskpoolError::Configuration(format!("invalid config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations no platform could run with.
    pub fn validate(&self) -> Result<()> {
        if self.protocol_commission_bp > constants::MAX_COMMISSION_BP {
            return Err(RiskpoolError::Configuration(format!(
                "protocol commission {}bp exceeds {}bp",
                self.protocol_commission_bp,
                constants::MAX_COMMISSION_BP
            )));
        }
        if self.policy.max_premiums_per_tranche == 0 {
            return Err(RiskpoolError::Configuration(
                "max_premiums_per_tranche must be positive".into(),
            ));
        }
        if self.policy.max_tranches_per_policy == 0 {
            return Err(RiskpoolError::Configuration(
                "max_tranches_per_policy must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Market settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// After this instant no new offers are accepted and anyone may cancel.
    pub closing_time: Option<DateTime<Utc>>,
    /// Minimum pay amount per asset. Smaller offers are rejected and smaller
    /// remainders are refunded instead of resting.
    pub dust_limits: BTreeMap<Asset, u128>,
    /// Whether new offers are matched against the book before resting.
    pub matching_enabled: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            closing_time: None,
            dust_limits: BTreeMap::new(),
            matching_enabled: true,
        }
    }
}

impl MarketConfig {
    /// Dust limit for `asset` (zero when not configured).
    #[must_use]
    pub fn dust_limit(&self, asset: &str) -> u128 {
        self.dust_limits.get(asset).copied().unwrap_or(0)
    }

    /// Whether the market has closed at `now`.
    #[must_use]
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.closing_time.is_some_and(|t| now >= t)
    }
}

/// Structural limits on policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyLimits {
    /// Maximum non-zero premium entries per tranche.
    pub max_premiums_per_tranche: usize,
    /// Maximum tranches per policy.
    pub max_tranches_per_policy: usize,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            max_premiums_per_tranche: constants::DEFAULT_MAX_PREMIUMS_PER_TRANCHE,
            max_tranches_per_policy: constants::DEFAULT_MAX_TRANCHES_PER_POLICY,
        }
    }
}
