use thiserror::Error;

/// Engine-wide error taxonomy.
///
/// Validation and state-precondition variants are routine negative results:
/// the attempted operation is aborted with no side effects and the caller is
/// expected to handle them, not crash. Arithmetic and external variants are
/// never masked, since a silently wrong number in settlement accounting is a
/// solvency risk.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    // Validation
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("the zero address cannot hold claims")]
    ZeroAddress,

    #[error("fee curve must have at least one breakpoint")]
    EmptyCurve,

    #[error("breakpoint and value arrays differ in length")]
    LengthMismatch,

    #[error("curve breakpoints must be strictly ascending")]
    NonAscendingBreakpoints,

    #[error("slippage-fee curve withholds fees where the slippage curve never returns them")]
    IncompatibleCurves,

    #[error("invalid parameter value provided")]
    InvalidParameter,

    // State preconditions
    #[error("settlement has already been triggered for this pool")]
    SettlementAlreadyTriggered,

    #[error("settlement is not active - no claim window is open")]
    SettlementNotActive,

    #[error("the claim window has closed")]
    ClaimPeriodOver,

    #[error("the claim window has not elapsed yet")]
    ClaimPeriodNotElapsed,

    #[error("distribution shares have already been computed")]
    AlreadyComputed,

    #[error("distribution shares have not been computed yet")]
    DistributionNotComputed,

    #[error("this perpetual position has already claimed")]
    PositionAlreadyClaimed,

    #[error("cumulative holder claims would exceed the claimable cap")]
    CapExceeded,

    #[error("governance bonus proportionality ratios are not set")]
    RatiosNotSet,

    #[error("caller is not authorized for this operation")]
    Unauthorized,

    // Arithmetic
    #[error("arithmetic overflow - values exceeded u64 bounds")]
    ArithmeticOverflow,

    #[error("timestamp moved backward relative to the last update")]
    TimestampRegression,

    // Invariant violations
    #[error("distribution share ratio escaped the [0, BASE] range")]
    ShareOutOfBounds,

    #[error("claim-token value exceeds the pool's collateral backing")]
    SolvencyViolation,

    #[error("waterfall payouts exceed the amount set aside for redistribution")]
    ConservationViolation,

    // External collaborators
    #[error("oracle value is stale or invalid")]
    StaleOracle,

    #[error("insufficient token balance for transfer")]
    InsufficientBalance,
}

pub type Result<T> = core::result::Result<T, ProtocolError>;
