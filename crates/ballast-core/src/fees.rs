//! Fee curve management and the keeper-driven refresh path.
//!
//! The manager owns the four collateral-ratio-keyed curves plus the two
//! scalar hedger corrections. A permissionless keeper calls the refresh
//! entry points; governance replaces curves wholesale.

use serde::{Deserialize, Serialize};

use crate::auth::AuthorizationContext;
use crate::curve::PiecewiseCurve;
use crate::error::{ProtocolError, Result};
use crate::events::{self, FeesRefreshed, HedgerFeesRefreshed};
use crate::ledger::{GlobalAccounting, PerpetualAccounting};
use crate::math::BASE;
use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeCurveKind {
    MintFee,
    BurnFee,
    SlpSlippage,
    SlpSlippageFee,
}

/// The four multipliers produced by one refresh, for logging and callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeUpdate {
    pub collateral_ratio: u64,
    pub mint_bonus_malus: u64,
    pub burn_bonus_malus: u64,
    pub slippage: u64,
    pub slippage_fee: u64,
}

pub struct FeeCurveManager {
    mint_fee: PiecewiseCurve,
    burn_fee: PiecewiseCurve,
    slippage: PiecewiseCurve,
    slippage_fee: PiecewiseCurve,
    ha_deposit_correction: u64,
    ha_withdraw_correction: u64,
}

impl FeeCurveManager {
    /// Neutral defaults: 1x bonus-malus everywhere, no slippage, no
    /// slippage fee. The hedger corrections start at zero.
    pub fn new() -> Self {
        Self {
            mint_fee: PiecewiseCurve::flat(BASE),
            burn_fee: PiecewiseCurve::flat(BASE),
            slippage: PiecewiseCurve::flat(0),
            slippage_fee: PiecewiseCurve::flat(0),
            ha_deposit_correction: 0,
            ha_withdraw_correction: 0,
        }
    }

    pub fn curve(&self, kind: FeeCurveKind) -> &PiecewiseCurve {
        match kind {
            FeeCurveKind::MintFee => &self.mint_fee,
            FeeCurveKind::BurnFee => &self.burn_fee,
            FeeCurveKind::SlpSlippage => &self.slippage,
            FeeCurveKind::SlpSlippageFee => &self.slippage_fee,
        }
    }

    /// Replace one curve wholesale. Guardian-gated.
    ///
    /// Setting either SLP curve re-validates the pair: a non-zero
    /// slippage-fee breakpoint where slippage evaluates to zero would
    /// withhold fees from SLPs that slippage can never return, permanently
    /// stranding funds.
    pub fn set_curve(
        &mut self,
        auth: &AuthorizationContext,
        caller: Address,
        kind: FeeCurveKind,
        xs: &[u64],
        ys: &[u64],
    ) -> Result<()> {
        auth.require_guardian(caller)?;
        let curve = PiecewiseCurve::new(xs, ys)?;

        match kind {
            FeeCurveKind::MintFee => self.mint_fee = curve,
            FeeCurveKind::BurnFee => self.burn_fee = curve,
            FeeCurveKind::SlpSlippage => {
                Self::check_compatible(&self.slippage_fee, &curve)?;
                self.slippage = curve;
            }
            FeeCurveKind::SlpSlippageFee => {
                Self::check_compatible(&curve, &self.slippage)?;
                self.slippage_fee = curve;
            }
        }
        Ok(())
    }

    fn check_compatible(slippage_fee: &PiecewiseCurve, slippage: &PiecewiseCurve) -> Result<()> {
        for point in slippage_fee.points() {
            if point.y != 0 && slippage.evaluate(point.x) == 0 {
                return Err(ProtocolError::IncompatibleCurves);
            }
        }
        Ok(())
    }

    /// Set the two scalar hedger corrections, each a BASE-scaled fraction.
    pub fn set_ha_corrections(
        &mut self,
        auth: &AuthorizationContext,
        caller: Address,
        deposit_correction: u64,
        withdraw_correction: u64,
    ) -> Result<()> {
        auth.require_guardian(caller)?;
        if deposit_correction > BASE || withdraw_correction > BASE {
            return Err(ProtocolError::InvalidParameter);
        }
        self.ha_deposit_correction = deposit_correction;
        self.ha_withdraw_correction = withdraw_correction;
        Ok(())
    }

    /// Evaluate all four curves at the current collateral ratio and push
    /// the multipliers to the accounting collaborator. Permissionless and
    /// idempotent: calling twice at the same instant writes the same
    /// values. Staleness between calls is the keeper's economic problem,
    /// not enforced here.
    pub fn refresh_fees<L: GlobalAccounting>(&self, accounting: &mut L) -> Result<FeeUpdate> {
        let ratio = accounting.get_collateral_ratio()?;

        let update = FeeUpdate {
            collateral_ratio: ratio,
            mint_bonus_malus: self.mint_fee.evaluate(ratio),
            burn_bonus_malus: self.burn_fee.evaluate(ratio),
            slippage: self.slippage.evaluate(ratio),
            slippage_fee: self.slippage_fee.evaluate(ratio),
        };

        accounting.set_fee_keeper(
            update.mint_bonus_malus,
            update.burn_bonus_malus,
            update.slippage,
            update.slippage_fee,
        );

        events::emit(&FeesRefreshed {
            collateral_ratio: update.collateral_ratio,
            mint_bonus_malus: update.mint_bonus_malus,
            burn_bonus_malus: update.burn_bonus_malus,
            slippage: update.slippage,
            slippage_fee: update.slippage_fee,
        });

        Ok(update)
    }

    /// Push the two hedger corrections. Independent of the collateral
    /// ratio, same keeper cadence.
    pub fn refresh_hedger_fees<P: PerpetualAccounting>(&self, perpetuals: &mut P) {
        perpetuals.set_ha_fees(self.ha_deposit_correction, self.ha_withdraw_correction);
        events::emit(&HedgerFeesRefreshed {
            deposit_correction: self.ha_deposit_correction,
            withdraw_correction: self.ha_withdraw_correction,
        });
    }
}

impl Default for FeeCurveManager {
    fn default() -> Self {
        Self::new()
    }
}
