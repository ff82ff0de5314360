//! System-wide constants for the Riskpool platform.

/// Denominator for basis-point commission rates (1 bp = 0.01%).
pub const BASIS_POINTS_DENOMINATOR: u128 = 10_000;

/// Largest accepted commission rate for a single role, and for the sum of all roles.
pub const MAX_COMMISSION_BP: u16 = 10_000;

/// Default maximum number of non-zero premium entries per tranche.
pub const DEFAULT_MAX_PREMIUMS_PER_TRANCHE: usize = 50;

/// Default maximum number of tranches per policy.
pub const DEFAULT_MAX_TRANCHES_PER_POLICY: usize = 20;

/// Default protocol commission in basis points.
pub const DEFAULT_PROTOCOL_COMMISSION_BP: u16 = 0;

/// Heartbeat passes per call. Each pass may react to market activity the
/// previous one triggered; the state machine settles well within this.
pub const MAX_HEARTBEAT_ROUNDS: usize = 8;

/// First offer id issued by a fresh market.
pub const FIRST_OFFER_ID: u64 = 1;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Platform name.
pub const PLATFORM_NAME: &str = "Riskpool";
