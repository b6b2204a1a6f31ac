//! SLP exchange-rate ("sanRate") accrual.
//!
//! The sanRate converts between the SLP claim token and underlying
//! collateral. Earned interest first lands in `locked_interest` and is
//! released into the rate gradually, capped per elapsed second, so a single
//! update can never move the rate by more than the configured bound.
//! Interest beyond the cap is deferred, never discarded.

use serde::{Deserialize, Serialize};

use crate::auth::AuthorizationContext;
use crate::error::{ProtocolError, Result};
use crate::events::{self, SanRateUpdated};
use crate::fees::FeeUpdate;
use crate::invariants;
use crate::ledger::FungibleToken;
use crate::math::{apply_fee, mul_div_down, BASE};
use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlpAccrualState {
    /// BASE-scaled claim-token price in collateral units. Monotonically
    /// non-decreasing except through `set_san_rate`.
    pub san_rate: u64,
    /// Earned interest not yet released into the rate, collateral units.
    pub locked_interest: u64,
    /// Interest withheld from SLPs while the slippage fee is active.
    pub fees_aside: u64,
    /// Release cap: collateral units distributed per elapsed second.
    pub max_interest_distributed_per_second: u64,
    /// BASE-scaled haircut applied to SLP withdrawals.
    pub slippage: u64,
    /// BASE-scaled fraction of released interest diverted to `fees_aside`.
    pub slippage_fee: u64,
    pub last_update: u64,
}

impl SlpAccrualState {
    pub fn new(now: u64, max_interest_distributed_per_second: u64) -> Self {
        Self {
            san_rate: BASE,
            locked_interest: 0,
            fees_aside: 0,
            max_interest_distributed_per_second,
            slippage: 0,
            slippage_fee: 0,
            last_update: now,
        }
    }

    /// Pull the slippage pair refreshed by the keeper into the accrual.
    pub fn apply_fee_update(&mut self, update: &FeeUpdate) {
        self.slippage = update.slippage;
        self.slippage_fee = update.slippage_fee;
    }

    /// Fold `pending_interest_gain` into the locked bucket, release the
    /// time-capped portion into the rate, and return the refreshed rate.
    ///
    /// Idempotent within one instant: with no elapsed time only the gain is
    /// recorded and the rate is unchanged. When `slippage_fee` is active
    /// its fraction of the released amount is set aside instead of
    /// distributed; once the fee returns to zero the set-aside balance is
    /// folded back into the next release.
    pub fn accrue(&mut self, now: u64, pending_interest_gain: u64, san_supply: u64) -> Result<u64> {
        invariants::assert_timestamp_monotonic(now, self.last_update)?;

        self.locked_interest = self
            .locked_interest
            .checked_add(pending_interest_gain)
            .ok_or(ProtocolError::ArithmeticOverflow)?;

        let elapsed = now - self.last_update;
        if elapsed == 0 {
            return Ok(self.san_rate);
        }
        self.last_update = now;

        let cap = u64::try_from(
            (self.max_interest_distributed_per_second as u128) * (elapsed as u128),
        )
        .unwrap_or(u64::MAX);
        let released = self.locked_interest.min(cap);
        self.locked_interest -= released;

        let withheld = mul_div_down(released, self.slippage_fee.min(BASE), BASE)
            .ok_or(ProtocolError::ArithmeticOverflow)?;
        let mut to_share = released - withheld;
        self.fees_aside = self
            .fees_aside
            .checked_add(withheld)
            .ok_or(ProtocolError::ArithmeticOverflow)?;

        if self.slippage_fee == 0 && self.fees_aside > 0 {
            to_share = to_share
                .checked_add(self.fees_aside)
                .ok_or(ProtocolError::ArithmeticOverflow)?;
            self.fees_aside = 0;
        }

        if to_share > 0 {
            if san_supply == 0 {
                // Nobody to credit yet; keep the interest locked.
                self.locked_interest = self
                    .locked_interest
                    .checked_add(to_share)
                    .ok_or(ProtocolError::ArithmeticOverflow)?;
            } else {
                let old_rate = self.san_rate;
                let delta = mul_div_down(to_share, BASE, san_supply)
                    .ok_or(ProtocolError::ArithmeticOverflow)?;
                self.san_rate = self
                    .san_rate
                    .checked_add(delta)
                    .ok_or(ProtocolError::ArithmeticOverflow)?;

                events::emit(&SanRateUpdated {
                    old_san_rate: old_rate,
                    new_san_rate: self.san_rate,
                    interest_distributed: to_share,
                    fees_aside: self.fees_aside,
                    locked_interest: self.locked_interest,
                });
            }
        }

        Ok(self.san_rate)
    }

    /// Administrative rate correction, the only non-monotone path.
    pub fn set_san_rate(
        &mut self,
        auth: &AuthorizationContext,
        caller: Address,
        san_rate: u64,
    ) -> Result<()> {
        auth.require_governor(caller)?;
        if san_rate == 0 {
            return Err(ProtocolError::InvalidParameter);
        }
        self.san_rate = san_rate;
        Ok(())
    }
}

/// One SLP pool: the accrual state plus the claim-token supply and the
/// vault address holding the pool's collateral.
pub struct SlpPool {
    pub address: Address,
    pub accrual: SlpAccrualState,
    pub san_supply: u64,
}

impl SlpPool {
    pub fn new(address: Address, now: u64, max_interest_distributed_per_second: u64) -> Self {
        Self {
            address,
            accrual: SlpAccrualState::new(now, max_interest_distributed_per_second),
            san_supply: 0,
        }
    }

    /// Deposit collateral, minting claim tokens at the refreshed rate.
    /// Returns the claim tokens minted. Collateral is pulled before the
    /// mint is recorded.
    pub fn deposit<T: FungibleToken>(
        &mut self,
        now: u64,
        depositor: Address,
        amount: u64,
        pending_interest_gain: u64,
        collateral: &mut T,
    ) -> Result<u64> {
        if amount == 0 {
            return Err(ProtocolError::ZeroAmount);
        }
        let rate = self.accrual.accrue(now, pending_interest_gain, self.san_supply)?;

        collateral.transfer_from(depositor, self.address, amount)?;

        let minted = mul_div_down(amount, BASE, rate).ok_or(ProtocolError::ArithmeticOverflow)?;
        self.san_supply = self
            .san_supply
            .checked_add(minted)
            .ok_or(ProtocolError::ArithmeticOverflow)?;
        Ok(minted)
    }

    /// Burn claim tokens and withdraw collateral at the refreshed rate,
    /// minus the current slippage haircut. The supply is reduced before
    /// the collateral leaves the vault.
    pub fn withdraw<T: FungibleToken>(
        &mut self,
        now: u64,
        dest: Address,
        san_amount: u64,
        pending_interest_gain: u64,
        collateral: &mut T,
    ) -> Result<u64> {
        if san_amount == 0 {
            return Err(ProtocolError::ZeroAmount);
        }
        if san_amount > self.san_supply {
            return Err(ProtocolError::InsufficientBalance);
        }
        let rate = self.accrual.accrue(now, pending_interest_gain, self.san_supply)?;

        let gross = mul_div_down(san_amount, rate, BASE).ok_or(ProtocolError::ArithmeticOverflow)?;
        let (net, _haircut) = apply_fee(gross, self.accrual.slippage.min(BASE))
            .ok_or(ProtocolError::ArithmeticOverflow)?;

        self.san_supply -= san_amount;
        collateral.transfer(self.address, dest, net)?;
        Ok(net)
    }
}
