//! Collaborator seams and the in-memory reference ledger.
//!
//! The engine never owns token mechanics, position bookkeeping, or oracle
//! plumbing; it calls them through the traits below. `StableLedger` and
//! `TokenLedger` are the in-memory implementations used by the keeper
//! binary and the test suites.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::math::{compute_collateral_ratio, mul_div_down, BASE};
use crate::oracle::CollateralOracle;
use crate::types::Address;

/// Fungible token surface consumed by the settlement and accrual paths.
/// Transfer failures propagate unmodified; the engine never retries.
pub trait FungibleToken {
    fn transfer(&mut self, from: Address, to: Address, amount: u64) -> Result<()>;
    fn transfer_from(&mut self, from: Address, to: Address, amount: u64) -> Result<()>;
    fn balance_of(&self, who: Address) -> u64;
}

/// Hedging-agent position registry.
pub trait PositionLedger {
    fn owner_of(&self, perpetual_id: u64) -> Result<Address>;
    fn is_approved_or_owner(&self, caller: Address, perpetual_id: u64) -> bool;
    /// Cash-out value of the position at a BASE-scaled rate, plus whether
    /// the position sits below its maintenance margin.
    fn cash_out_amount(&self, perpetual_id: u64, rate: u64) -> (u64, bool);
}

/// StableMaster-equivalent surface: supplies the global collateral ratio
/// and receives the multipliers the keeper pushes.
pub trait GlobalAccounting {
    fn get_collateral_ratio(&self) -> Result<u64>;
    fn set_fee_keeper(
        &mut self,
        mint_bonus_malus: u64,
        burn_bonus_malus: u64,
        slippage: u64,
        slippage_fee: u64,
    );
}

/// Perpetual-manager-equivalent surface for the hedger fee corrections.
pub trait PerpetualAccounting {
    fn set_ha_fees(&mut self, deposit_correction: u64, withdraw_correction: u64);
}

/// The multipliers most recently pushed by the keeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeMultipliers {
    pub mint_bonus_malus: u64,
    pub burn_bonus_malus: u64,
    pub slippage: u64,
    pub slippage_fee: u64,
}

/// In-memory global balance sheet. One instance per deployment: total
/// collateral stock, stablecoin liability, and the pushed fee multipliers.
pub struct StableLedger<O: CollateralOracle> {
    pub total_collateral: u64,
    pub stablecoin_supply: u64,
    pub fees: FeeMultipliers,
    pub ha_deposit_correction: u64,
    pub ha_withdraw_correction: u64,
    oracle: O,
}

impl<O: CollateralOracle> StableLedger<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            total_collateral: 0,
            stablecoin_supply: 0,
            fees: FeeMultipliers::default(),
            ha_deposit_correction: 0,
            ha_withdraw_correction: 0,
            oracle,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl<O: CollateralOracle> GlobalAccounting for StableLedger<O> {
    /// Collateral ratio = collateral stock valued at the lower oracle
    /// price, over the stablecoin liability. `u64::MAX` with no liability.
    fn get_collateral_ratio(&self) -> Result<u64> {
        let price = self.oracle.read_lower()?;
        let collateral_value = mul_div_down(self.total_collateral, price, BASE)
            .ok_or(ProtocolError::ArithmeticOverflow)?;
        Ok(compute_collateral_ratio(collateral_value, self.stablecoin_supply))
    }

    fn set_fee_keeper(
        &mut self,
        mint_bonus_malus: u64,
        burn_bonus_malus: u64,
        slippage: u64,
        slippage_fee: u64,
    ) {
        self.fees = FeeMultipliers {
            mint_bonus_malus,
            burn_bonus_malus,
            slippage,
            slippage_fee,
        };
    }
}

impl<O: CollateralOracle> PerpetualAccounting for StableLedger<O> {
    fn set_ha_fees(&mut self, deposit_correction: u64, withdraw_correction: u64) {
        self.ha_deposit_correction = deposit_correction;
        self.ha_withdraw_correction = withdraw_correction;
    }
}

/// One hedging-agent position in the in-memory book.
#[derive(Debug, Clone, Copy)]
pub struct PerpetualPosition {
    pub owner: Address,
    /// Collateral committed to the position, cashed out pro-rata at the
    /// frozen hedger rate.
    pub committed: u64,
    pub below_maintenance_margin: bool,
}

/// In-memory position registry used by the settlement tests.
#[derive(Debug, Default, Clone)]
pub struct PositionBook {
    positions: HashMap<u64, PerpetualPosition>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, perpetual_id: u64, position: PerpetualPosition) {
        self.positions.insert(perpetual_id, position);
    }
}

impl PositionLedger for PositionBook {
    fn owner_of(&self, perpetual_id: u64) -> Result<Address> {
        self.positions
            .get(&perpetual_id)
            .map(|p| p.owner)
            .ok_or(ProtocolError::InvalidParameter)
    }

    fn is_approved_or_owner(&self, caller: Address, perpetual_id: u64) -> bool {
        self.positions
            .get(&perpetual_id)
            .is_some_and(|p| p.owner == caller)
    }

    fn cash_out_amount(&self, perpetual_id: u64, rate: u64) -> (u64, bool) {
        match self.positions.get(&perpetual_id) {
            Some(p) => (
                mul_div_down(p.committed, rate, BASE).unwrap_or(0),
                p.below_maintenance_margin,
            ),
            None => (0, true),
        }
    }
}

/// Balance-map token. Transfers are all-or-nothing and never mint.
#[derive(Debug, Default, Clone)]
pub struct TokenLedger {
    balances: HashMap<Address, u64>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, to: Address, amount: u64) {
        *self.balances.entry(to).or_insert(0) += amount;
    }

    fn debit(&mut self, from: Address, amount: u64) -> Result<()> {
        let balance = self.balances.entry(from).or_insert(0);
        if *balance < amount {
            return Err(ProtocolError::InsufficientBalance);
        }
        *balance -= amount;
        Ok(())
    }
}

impl FungibleToken for TokenLedger {
    fn transfer(&mut self, from: Address, to: Address, amount: u64) -> Result<()> {
        self.debit(from, amount)?;
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn transfer_from(&mut self, from: Address, to: Address, amount: u64) -> Result<()> {
        // Allowance mechanics are out of scope; same all-or-nothing move.
        self.transfer(from, to, amount)
    }

    fn balance_of(&self, who: Address) -> u64 {
        self.balances.get(&who).copied().unwrap_or(0)
    }
}
