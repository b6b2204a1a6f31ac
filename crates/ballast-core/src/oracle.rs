//! Collateral valuation oracle seam.

use crate::error::{ProtocolError, Result};

/// Supplies BASE-scaled stablecoin-per-collateral prices. Implementations
/// own their staleness checks; the engine trusts whichever bound it
/// explicitly requests and propagates oracle errors unmodified.
pub trait CollateralOracle {
    /// Conservative (lower) price bound, used when valuing collateral.
    fn read_lower(&self) -> Result<u64>;

    /// Upper price bound, used when valuing what the protocol owes.
    fn read_upper(&self) -> Result<u64>;
}

/// Fixed-price oracle for the keeper demo and the test suites.
#[derive(Debug, Clone, Copy)]
pub struct FixedOracle {
    lower: u64,
    upper: u64,
}

impl FixedOracle {
    pub fn new(lower: u64, upper: u64) -> Self {
        Self { lower, upper }
    }

    pub fn set(&mut self, lower: u64, upper: u64) {
        self.lower = lower;
        self.upper = upper;
    }
}

impl CollateralOracle for FixedOracle {
    fn read_lower(&self) -> Result<u64> {
        if self.lower == 0 {
            return Err(ProtocolError::StaleOracle);
        }
        Ok(self.lower)
    }

    fn read_upper(&self) -> Result<u64> {
        if self.upper == 0 {
            return Err(ProtocolError::StaleOracle);
        }
        Ok(self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::BASE;

    #[test]
    fn fixed_oracle_reports_both_bounds() {
        let oracle = FixedOracle::new(BASE - 1, BASE + 1);
        assert_eq!(oracle.read_lower().unwrap(), BASE - 1);
        assert_eq!(oracle.read_upper().unwrap(), BASE + 1);
    }

    #[test]
    fn zero_price_reads_as_stale() {
        let oracle = FixedOracle::new(0, BASE);
        assert_eq!(oracle.read_lower(), Err(ProtocolError::StaleOracle));
        assert_eq!(oracle.read_upper().unwrap(), BASE);
    }
}
