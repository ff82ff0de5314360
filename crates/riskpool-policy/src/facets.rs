//! Versioned dispatch of policy operations.
//!
//! Policy operations are grouped into [`Facet`]s. A [`DispatchTable`] maps
//! each facet to the [`FacetVersion`] that serves it; every operation
//! resolves its facet before running. Only versions compiled into this build
//! can be routed to, and a frozen table can no longer change.

use std::collections::BTreeMap;

use riskpool_types::{AccountId, Result, RiskpoolError, RoleOracle};
use serde::{Deserialize, Serialize};

/// A group of policy operations upgraded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Facet {
    /// Creation, tranches, approvals, heartbeat.
    Core,
    Premiums,
    Claims,
    Commissions,
    /// The dispatch table itself.
    Upgrade,
}

impl Facet {
    pub const ALL: [Self; 5] = [
        Self::Core,
        Self::Premiums,
        Self::Claims,
        Self::Commissions,
        Self::Upgrade,
    ];
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Core => "core",
            Self::Premiums => "premiums",
            Self::Claims => "claims",
            Self::Commissions => "commissions",
            Self::Upgrade => "upgrade",
        };
        f.write_str(s)
    }
}

/// Implementations compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacetVersion {
    V1,
}

impl FacetVersion {
    #[must_use]
    pub fn number(self) -> u32 {
        match self {
            Self::V1 => 1,
        }
    }

    #[must_use]
    pub fn from_number(version: u32) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            _ => None,
        }
    }
}

/// Facet routing for every policy on a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTable {
    routes: BTreeMap<Facet, FacetVersion>,
    frozen: bool,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self {
            routes: Facet::ALL.iter().map(|f| (*f, FacetVersion::V1)).collect(),
            frozen: false,
        }
    }
}

impl DispatchTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Version serving `facet`.
    #[must_use]
    pub fn resolve(&self, facet: Facet) -> FacetVersion {
        self.routes.get(&facet).copied().unwrap_or(FacetVersion::V1)
    }

    /// Route `facet` to `version`. System admins only.
    pub fn upgrade(&mut self, roles: &dyn RoleOracle, caller: AccountId, facet: Facet, version: u32) -> Result<()> {
        Self::ensure_admin(roles, caller)?;
        if self.frozen {
            return Err(RiskpoolError::UpgradesFrozen);
        }
        let resolved = FacetVersion::from_number(version).ok_or_else(|| RiskpoolError::FacetVersionUnsupported {
            facet: facet.to_string(),
            version,
        })?;
        self.routes.insert(facet, resolved);
        tracing::info!(facet = %facet, version, caller = %caller, "facet upgraded");
        Ok(())
    }

    /// Make the table permanent.
    pub fn freeze(&mut self, roles: &dyn RoleOracle, caller: AccountId) -> Result<()> {
        Self::ensure_admin(roles, caller)?;
        if self.frozen {
            return Err(RiskpoolError::UpgradesFrozen);
        }
        self.frozen = true;
        tracing::info!(caller = %caller, "facet upgrades frozen");
        Ok(())
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn ensure_admin(roles: &dyn RoleOracle, caller: AccountId) -> Result<()> {
        if roles.is_system_admin(caller) {
            return Ok(());
        }
        Err(RiskpoolError::unauthorized("must be system admin"))
    }
}
