//! Invariant assertions for the Ballast engine.
//! These are the non-negotiable rules that protect solvency and fair
//! distribution; operations call them before committing and the property
//! tests call them after every model step.

use crate::error::{ProtocolError, Result};
use crate::math::{mul_div_down, BASE};

/// Every waterfall share ratio lives in `[0, BASE]`.
pub fn assert_share_within_full(share: u64) -> Result<()> {
    if share > BASE {
        return Err(ProtocolError::ShareOutOfBounds);
    }
    Ok(())
}

/// SLP solvency: the claim-token supply valued at the sanRate must not
/// exceed the pool's real collateral balance by more than the interest
/// that is earned but not yet released into the rate.
pub fn assert_slp_solvency(
    san_rate: u64,
    san_supply: u64,
    collateral_balance: u64,
    locked_interest: u64,
    fees_aside: u64,
) -> Result<()> {
    let claims_value =
        mul_div_down(san_supply, san_rate, BASE).ok_or(ProtocolError::ArithmeticOverflow)?;

    let backing = (collateral_balance as u128) + (locked_interest as u128) + (fees_aside as u128);
    if (claims_value as u128) > backing {
        return Err(ProtocolError::SolvencyViolation);
    }
    Ok(())
}

/// Waterfall conservation: redemptions can never pay out more collateral
/// than was frozen for redistribution.
pub fn assert_waterfall_conservation(total_paid: u64, amount_to_redistribute: u64) -> Result<()> {
    if total_paid > amount_to_redistribute {
        return Err(ProtocolError::ConservationViolation);
    }
    Ok(())
}

/// Time can stall but never run backward between updates.
pub fn assert_timestamp_monotonic(now: u64, last_update: u64) -> Result<()> {
    if now < last_update {
        return Err(ProtocolError::TimestampRegression);
    }
    Ok(())
}
