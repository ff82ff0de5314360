//! Error types for the Riskpool platform.
//!
//! All errors use the `RP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Market errors
//! - 2xx: Funds / arithmetic errors
//! - 3xx: Treasury errors
//! - 4xx: Tranche / premium errors
//! - 5xx: Policy errors
//! - 6xx: Claim errors
//! - 7xx: Authorization errors
//! - 8xx: Facet / upgrade errors
//! - 9xx: General / internal errors
//!
//! The reason fragments inside the messages ("claim too high", "must be in
//! active state", "amount exceeds allowance", ...) are part of the public
//! contract and must stay stable.

use std::fmt;

use thiserror::Error;

use crate::{EntityId, OfferId, PolicyId};

/// Coarse classification every [`RiskpoolError`] maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    InvalidState,
    InvalidAmount,
    InsufficientFunds,
    InsufficientLiquidity,
    AlreadySet,
    AlreadyExists,
    NotFound,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidState => "INVALID_STATE",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            Self::AlreadySet => "ALREADY_SET",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Central error enum for all Riskpool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskpoolError {
    // =================================================================
    // Market Errors (1xx)
    // =================================================================
    /// No offer with this id exists (never issued, or already deleted).
    #[error("RP_ERR_100: Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// The offer was cancelled or fully filled.
    #[error("RP_ERR_101: offer not active: {0}")]
    OfferNotActive(OfferId),

    /// Offer parameters failed validation.
    #[error("RP_ERR_102: Invalid offer: {reason}")]
    InvalidOffer { reason: String },

    /// The market closing time has passed.
    #[error("RP_ERR_103: market closed")]
    MarketClosed,

    /// Taker and maker are the same account (wash trading).
    #[error("RP_ERR_104: cannot trade with own offer")]
    SelfTradeBlocked,

    /// `sell_all_amount` could not reach the requested minimum fill.
    #[error("RP_ERR_105: insufficient liquidity: filled {filled}, required {required}")]
    InsufficientLiquidity { required: u128, filled: u128 },

    // =================================================================
    // Funds Errors (2xx)
    // =================================================================
    /// Holder balance too low.
    #[error("RP_ERR_200: amount exceeds balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    /// Spender allowance too low.
    #[error("RP_ERR_201: amount exceeds allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: u128, available: u128 },

    /// Zero or out-of-range quantity.
    #[error("RP_ERR_202: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Checked arithmetic overflowed.
    #[error("RP_ERR_203: arithmetic overflow in {context}")]
    Overflow { context: &'static str },

    // =================================================================
    // Treasury Errors (3xx)
    // =================================================================
    /// Claim or order larger than the policy's treasury balance.
    #[error("RP_ERR_300: exceeds policy balance: requested {requested}, balance {balance}")]
    ExceedsPolicyBalance { requested: u128, balance: u128 },

    /// Minimum policy balance may only be set once.
    #[error("RP_ERR_301: min balance already set for {0}")]
    MinBalanceAlreadySet(PolicyId),

    /// Caller is not a policy registered with this treasury.
    #[error("RP_ERR_302: policy not registered with treasury: {0}")]
    PolicyNotRegistered(PolicyId),

    /// Treasury transfer would break a treasury limit.
    #[error("RP_ERR_303: Treasury limit: {reason}")]
    TreasuryLimit { reason: String },

    /// A guarded section was entered while already held.
    #[error("RP_ERR_304: reentrant call blocked")]
    Reentrancy,

    // =================================================================
    // Tranche / Premium Errors (4xx)
    // =================================================================
    /// No tranche at this index.
    #[error("RP_ERR_400: Tranche not found: {0}")]
    TrancheNotFound(usize),

    /// Tranche parameters failed validation.
    #[error("RP_ERR_401: Invalid tranche: {reason}")]
    InvalidTranche { reason: String },

    /// Premium schedule failed validation.
    #[error("RP_ERR_402: Invalid premium schedule: {reason}")]
    InvalidPremiumSchedule { reason: String },

    /// Premium payment rejected by the payment window rules.
    #[error("RP_ERR_403: {reason}")]
    PaymentNotAllowed { reason: String },

    // =================================================================
    // Policy Errors (5xx)
    // =================================================================
    /// No policy with this id.
    #[error("RP_ERR_500: Policy not found: {0}")]
    PolicyNotFound(PolicyId),

    /// No entity with this id.
    #[error("RP_ERR_501: Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Operation not permitted in the target's current state.
    #[error("RP_ERR_502: {reason}")]
    InvalidState { reason: String },

    /// Duplicate approval / registration.
    #[error("RP_ERR_503: {reason}")]
    AlreadyExists { reason: String },

    /// Policy attributes failed validation.
    #[error("RP_ERR_504: Invalid policy: {reason}")]
    InvalidPolicy { reason: String },

    // =================================================================
    // Claim Errors (6xx)
    // =================================================================
    /// No claim at this index.
    #[error("RP_ERR_600: Claim not found: {0}")]
    ClaimNotFound(usize),

    /// Claim exceeds the tranche capital still unreserved.
    #[error("RP_ERR_601: claim too high: requested {requested}, available {available}")]
    ClaimTooHigh { requested: u128, available: u128 },

    // =================================================================
    // Authorization Errors (7xx)
    // =================================================================
    /// Caller lacks the required role or relationship.
    #[error("RP_ERR_700: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // =================================================================
    // Facet Errors (8xx)
    // =================================================================
    /// The dispatch table routes to a version this build does not carry.
    #[error("RP_ERR_800: facet {facet} has no implementation for version {version}")]
    FacetVersionUnsupported { facet: String, version: u32 },

    /// Upgrades have been frozen.
    #[error("RP_ERR_801: upgrades are frozen")]
    UpgradesFrozen,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Block time may only move forward.
    #[error("RP_ERR_900: clock cannot move backwards")]
    ClockRewind,

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("RP_ERR_901: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("RP_ERR_902: Serialization error: {0}")]
    Serialization(String),

    /// Unrecoverable internal error.
    #[error("RP_ERR_999: Internal error: {0}")]
    Internal(String),
}

impl RiskpoolError {
    /// Map onto the coarse error taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OfferNotFound(_)
            | Self::PolicyNotFound(_)
            | Self::EntityNotFound(_)
            | Self::TrancheNotFound(_)
            | Self::ClaimNotFound(_) => ErrorKind::NotFound,
            Self::OfferNotActive(_)
            | Self::MarketClosed
            | Self::SelfTradeBlocked
            | Self::Reentrancy
            | Self::PaymentNotAllowed { .. }
            | Self::InvalidState { .. }
            | Self::FacetVersionUnsupported { .. }
            | Self::UpgradesFrozen
            | Self::ClockRewind => ErrorKind::InvalidState,
            Self::InvalidOffer { .. }
            | Self::InvalidAmount { .. }
            | Self::Overflow { .. }
            | Self::ExceedsPolicyBalance { .. }
            | Self::InvalidTranche { .. }
            | Self::InvalidPremiumSchedule { .. }
            | Self::InvalidPolicy { .. }
            | Self::ClaimTooHigh { .. } => ErrorKind::InvalidAmount,
            Self::InsufficientBalance { .. }
            | Self::InsufficientAllowance { .. }
            | Self::TreasuryLimit { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientLiquidity { .. } => ErrorKind::InsufficientLiquidity,
            Self::MinBalanceAlreadySet(_) => ErrorKind::AlreadySet,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::PolicyNotRegistered(_) | Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Configuration(_) | Self::Serialization(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Shorthand for [`RiskpoolError::InvalidState`].
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RiskpoolError::Unauthorized`].
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RiskpoolError::InvalidAmount`].
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RiskpoolError>;

impl From<serde_json::Error> for RiskpoolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
