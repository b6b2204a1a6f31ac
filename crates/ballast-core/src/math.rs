//! Pure fixed-point arithmetic for the Ballast engine.
//! All functions are deterministic and widen to u128 internally,
//! so callers only ever see `None` on a genuine u64 overflow.

/// Fixed-point base for rates, ratios, curve values and waterfall shares.
/// A ratio of exactly 1.0 (100%) is `BASE`.
pub const BASE: u64 = 1_000_000_000;

/// Multiply two u64 values and divide by a third, rounding down.
/// Used everywhere an amount leaves the protocol, so rounding
/// favors protocol solvency.
/// Returns None on zero divisor or overflow.
pub fn mul_div_down(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }

    let result = (a as u128)
        .checked_mul(b as u128)?
        .checked_div(c as u128)?;

    u64::try_from(result).ok()
}

/// Multiply two u64 values and divide by a third, rounding up.
/// Used where the protocol owes an amount and must not short the claimant.
/// Returns None on zero divisor or overflow.
pub fn mul_div_up(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }

    let result = (a as u128)
        .checked_mul(b as u128)?
        .checked_add((c - 1) as u128)?
        .checked_div(c as u128)?;

    u64::try_from(result).ok()
}

/// Compute the global collateralization ratio, BASE-scaled.
///
/// # Arguments
/// * `collateral_value` - total collateral value in stablecoin units
/// * `stablecoin_liability` - total stablecoin supply backed by it
///
/// # Returns
/// `BASE` means exactly 100% covered. With no liability the coverage is
/// infinite; `u64::MAX` clamps against the top of every fee curve.
pub fn compute_collateral_ratio(collateral_value: u64, stablecoin_liability: u64) -> u64 {
    if stablecoin_liability == 0 {
        return u64::MAX;
    }

    mul_div_down(collateral_value, BASE, stablecoin_liability).unwrap_or(u64::MAX)
}

/// Apply a BASE-scaled fee to an amount.
///
/// # Returns
/// (net_amount, fee_amount), or None if `fee > BASE` or on overflow.
pub fn apply_fee(amount: u64, fee: u64) -> Option<(u64, u64)> {
    if fee > BASE {
        return None;
    }

    let fee_amount = mul_div_down(amount, fee, BASE)?;
    let net_amount = amount.checked_sub(fee_amount)?;
    Some((net_amount, fee_amount))
}
