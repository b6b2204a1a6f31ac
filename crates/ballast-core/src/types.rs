//! Typed units for the two denominations claims are stored in.
//!
//! Holder claims are recorded in stablecoin value because the holder oracle
//! value is only frozen when the claim window closes; LP and hedger claims
//! are recorded in collateral value because their rates are frozen at
//! trigger time. Making the unit a type forces the single conversion point
//! to be explicit instead of a convention.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::math::{mul_div_down, BASE};

/// An amount denominated in stablecoin base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StablecoinValue(pub u64);

/// An amount denominated in collateral base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollateralValue(pub u64);

impl StablecoinValue {
    pub const ZERO: Self = Self(0);

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ProtocolError::ArithmeticOverflow)
    }

    /// Convert at a BASE-scaled oracle value (stablecoins per collateral
    /// unit). This is the only stable-to-collateral conversion in the
    /// engine, rounded down in the pool's favor.
    pub fn to_collateral(self, oracle_value: u64) -> Result<CollateralValue> {
        mul_div_down(self.0, BASE, oracle_value)
            .map(CollateralValue)
            .ok_or(ProtocolError::ArithmeticOverflow)
    }
}

impl CollateralValue {
    pub const ZERO: Self = Self(0);

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ProtocolError::ArithmeticOverflow)
    }
}

/// Opaque account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_to_collateral_at_par() {
        let v = StablecoinValue(1_200);
        assert_eq!(v.to_collateral(BASE).unwrap(), CollateralValue(1_200));
    }

    #[test]
    fn stable_to_collateral_at_double_price() {
        // Collateral worth 2 stablecoins each: half as many collateral units.
        let v = StablecoinValue(1_000);
        assert_eq!(v.to_collateral(2 * BASE).unwrap(), CollateralValue(500));
    }

    #[test]
    fn stable_to_collateral_rejects_zero_oracle() {
        assert_eq!(
            StablecoinValue(1).to_collateral(0),
            Err(ProtocolError::ArithmeticOverflow)
        );
    }

    #[test]
    fn address_from_u64_is_nonzero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from(7u64).is_zero());
    }
}
