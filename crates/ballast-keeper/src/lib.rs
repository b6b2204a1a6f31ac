//! The keeper cycle: refresh the collateral-ratio-keyed multipliers and
//! drive the SLP interest accrual on a cadence.
//!
//! Each cycle is permissionless from the protocol's point of view; the
//! keeper just pays for the calls. The order matters: the fee refresh
//! produces the slippage pair the accrual will use for this cycle, so it
//! runs first.

use ballast_core::accrual::SlpPool;
use ballast_core::fees::FeeCurveManager;
use ballast_core::ledger::StableLedger;
use ballast_core::oracle::FixedOracle;
use ballast_core::types::Address;
use ballast_core::Result;

/// What one cycle did, for the operator log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub collateral_ratio: u64,
    pub mint_bonus_malus: u64,
    pub burn_bonus_malus: u64,
    pub slippage: u64,
    pub slippage_fee: u64,
    pub san_rate: u64,
}

pub struct Keeper {
    manager: FeeCurveManager,
    ledger: StableLedger<FixedOracle>,
    pool: SlpPool,
}

impl Keeper {
    pub fn new(
        oracle: FixedOracle,
        pool_address: Address,
        now: u64,
        max_interest_per_second: u64,
    ) -> Self {
        Self {
            manager: FeeCurveManager::new(),
            ledger: StableLedger::new(oracle),
            pool: SlpPool::new(pool_address, now, max_interest_per_second),
        }
    }

    pub fn manager_mut(&mut self) -> &mut FeeCurveManager {
        &mut self.manager
    }

    pub fn ledger_mut(&mut self) -> &mut StableLedger<FixedOracle> {
        &mut self.ledger
    }

    pub fn pool_mut(&mut self) -> &mut SlpPool {
        &mut self.pool
    }

    /// One full cycle: evaluate the curves at the current collateral
    /// ratio, hand the fresh slippage pair to the accrual, release the
    /// time-capped interest, then push the hedger corrections.
    pub fn run_cycle(&mut self, now: u64, pending_interest_gain: u64) -> Result<CycleReport> {
        let update = self.manager.refresh_fees(&mut self.ledger)?;
        self.pool.accrual.apply_fee_update(&update);

        let san_rate = self
            .pool
            .accrual
            .accrue(now, pending_interest_gain, self.pool.san_supply)?;

        self.manager.refresh_hedger_fees(&mut self.ledger);

        let report = CycleReport {
            collateral_ratio: update.collateral_ratio,
            mint_bonus_malus: update.mint_bonus_malus,
            burn_bonus_malus: update.burn_bonus_malus,
            slippage: update.slippage,
            slippage_fee: update.slippage_fee,
            san_rate,
        };
        tracing::info!(
            collateral_ratio = report.collateral_ratio,
            mint_bonus_malus = report.mint_bonus_malus,
            burn_bonus_malus = report.burn_bonus_malus,
            slippage = report.slippage,
            slippage_fee = report.slippage_fee,
            san_rate = report.san_rate,
            "keeper cycle complete"
        );
        Ok(report)
    }
}
