//! Settlement of a revoked collateral pool.
//!
//! Once governance revokes a collateral type, the remaining collateral is
//! distributed across four claimant classes in strict priority order:
//! stablecoin holders with a governance-token bonus, holders without,
//! LPs (SLPs and hedging agents, economically merged here) with the bonus,
//! and LPs without. Rates are frozen when the lifecycle demands it: the
//! hedger oracle value and sanRate at trigger time, the holder oracle value
//! only when the claim window closes, which removes the timing-arbitrage
//! window between the two.
//!
//! Holder claims are stored in stablecoin value because their conversion
//! rate is not known until the window closes; LP claims are stored in
//! collateral value because their rates are already frozen. The typed
//! wrappers in `types` keep those two denominations from mixing.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::auth::AuthorizationContext;
use crate::error::{ProtocolError, Result};
use crate::events::{
    self, CollateralRedeemed, DistributionComputed, LpClaimRecorded, SettlementTriggered,
    UserClaimRecorded,
};
use crate::invariants;
use crate::ledger::{FungibleToken, PositionLedger};
use crate::math::{mul_div_down, mul_div_up, BASE};
use crate::oracle::CollateralOracle;
use crate::types::{Address, CollateralValue, StablecoinValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementPhase {
    Inactive,
    ClaimOpen,
    RedeemReady,
}

/// A claim backed by escrowed governance tokens. The tokens are returned
/// at redemption regardless of how much of the claim the waterfall covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BonusClaim<V> {
    pub gov_tokens: u64,
    pub claim: V,
}

/// The four tier ratios, each BASE-scaled in `[0, BASE]`, computed exactly
/// once per settlement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionShares {
    pub holder_gov_bonus: u64,
    pub holder: u64,
    pub lp_gov_bonus: u64,
    pub lp: u64,
}

pub struct CollateralSettlement {
    /// Vault account holding the pool's remaining collateral and the
    /// escrowed stablecoins / claim tokens / governance tokens.
    address: Address,
    claim_window: u64,
    /// BASE-scaled governance tokens required per unit of bonus claim.
    proportional_ratio_gov_user: u64,
    proportional_ratio_gov_lp: u64,

    start_timestamp: u64,
    oracle_value_hedgers: u64,
    oracle_value_holders: u64,
    san_rate_at_trigger: u64,
    max_claimable_by_holders: StablecoinValue,
    amount_to_redistribute: u64,

    total_holder_claims: StablecoinValue,
    total_holder_claims_with_bonus: StablecoinValue,
    total_lp_claims: CollateralValue,
    total_lp_claims_with_bonus: CollateralValue,

    shares: DistributionShares,
    /// Exact per-tier rationals backing the shares: how much of each
    /// tier's total claims the waterfall covers, both sides in the tier's
    /// native denomination (stablecoin for the holder tiers, collateral
    /// for the LP tiers). Redemption divides through these directly, so
    /// the BASE truncation in `shares` never leaks into payouts.
    tier_covered: [u64; 4],
    tier_totals: [u64; 4],
    distribution_computed: bool,
    total_redeemed: u64,

    holder_claims: HashMap<Address, StablecoinValue>,
    holder_bonus_claims: HashMap<Address, BonusClaim<StablecoinValue>>,
    lp_claims: HashMap<Address, CollateralValue>,
    lp_bonus_claims: HashMap<Address, BonusClaim<CollateralValue>>,
    ha_claimed: HashSet<u64>,
}

impl CollateralSettlement {
    pub fn new(address: Address, claim_window: u64) -> Self {
        Self {
            address,
            claim_window,
            proportional_ratio_gov_user: 0,
            proportional_ratio_gov_lp: 0,
            start_timestamp: 0,
            oracle_value_hedgers: 0,
            oracle_value_holders: 0,
            san_rate_at_trigger: 0,
            max_claimable_by_holders: StablecoinValue::ZERO,
            amount_to_redistribute: 0,
            total_holder_claims: StablecoinValue::ZERO,
            total_holder_claims_with_bonus: StablecoinValue::ZERO,
            total_lp_claims: CollateralValue::ZERO,
            total_lp_claims_with_bonus: CollateralValue::ZERO,
            shares: DistributionShares::default(),
            tier_covered: [0; 4],
            tier_totals: [0; 4],
            distribution_computed: false,
            total_redeemed: 0,
            holder_claims: HashMap::new(),
            holder_bonus_claims: HashMap::new(),
            lp_claims: HashMap::new(),
            lp_bonus_claims: HashMap::new(),
            ha_claimed: HashSet::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn shares(&self) -> DistributionShares {
        self.shares
    }

    pub fn amount_to_redistribute(&self) -> u64 {
        self.amount_to_redistribute
    }

    pub fn phase(&self) -> SettlementPhase {
        if self.start_timestamp == 0 {
            SettlementPhase::Inactive
        } else if self.distribution_computed {
            SettlementPhase::RedeemReady
        } else {
            SettlementPhase::ClaimOpen
        }
    }

    fn window_end(&self) -> u64 {
        self.start_timestamp.saturating_add(self.claim_window)
    }

    fn require_claim_window_open(&self, now: u64) -> Result<()> {
        if self.start_timestamp == 0 {
            return Err(ProtocolError::SettlementNotActive);
        }
        if self.distribution_computed || now >= self.window_end() {
            return Err(ProtocolError::ClaimPeriodOver);
        }
        Ok(())
    }

    /// Configure the governance-bonus proportionality ratios. Governor
    /// only, and only before the window opens: changing the economics of
    /// claims already accepted is exactly what `trigger` freezing exists
    /// to prevent.
    pub fn set_proportional_ratios(
        &mut self,
        auth: &AuthorizationContext,
        caller: Address,
        ratio_gov_user: u64,
        ratio_gov_lp: u64,
    ) -> Result<()> {
        auth.require_governor(caller)?;
        if self.start_timestamp != 0 {
            return Err(ProtocolError::SettlementAlreadyTriggered);
        }
        if ratio_gov_user == 0 || ratio_gov_lp == 0 {
            return Err(ProtocolError::InvalidParameter);
        }
        self.proportional_ratio_gov_user = ratio_gov_user;
        self.proportional_ratio_gov_lp = ratio_gov_lp;
        Ok(())
    }

    /// Open the claim window. Freezes the hedger oracle value and the
    /// sanRate immediately; the holder oracle value is deliberately left
    /// unfrozen until the window closes.
    pub fn trigger(
        &mut self,
        auth: &AuthorizationContext,
        caller: Address,
        now: u64,
        oracle_value_hedgers: u64,
        san_rate: u64,
        max_claimable_by_holders: u64,
    ) -> Result<()> {
        auth.require_governor(caller)?;
        if self.start_timestamp != 0 {
            return Err(ProtocolError::SettlementAlreadyTriggered);
        }
        if self.proportional_ratio_gov_user == 0 || self.proportional_ratio_gov_lp == 0 {
            return Err(ProtocolError::RatiosNotSet);
        }
        if now == 0 || oracle_value_hedgers == 0 || san_rate == 0 {
            return Err(ProtocolError::InvalidParameter);
        }

        self.start_timestamp = now;
        self.oracle_value_hedgers = oracle_value_hedgers;
        self.san_rate_at_trigger = san_rate;
        self.max_claimable_by_holders = StablecoinValue(max_claimable_by_holders);

        events::emit(&SettlementTriggered {
            oracle_value_hedgers,
            san_rate_at_trigger: san_rate,
            max_claimable_by_holders,
            start_timestamp: now,
        });
        Ok(())
    }

    /// Bonus portion of a claim: `gov_amount / proportional_ratio`, capped
    /// at the whole claim so the plain remainder never goes negative.
    fn split_bonus(amount: u64, gov_amount: u64, ratio: u64) -> Result<(u64, u64)> {
        if gov_amount == 0 {
            return Ok((0, amount));
        }
        let bonus = mul_div_down(gov_amount, BASE, ratio)
            .ok_or(ProtocolError::ArithmeticOverflow)?
            .min(amount);
        Ok((bonus, amount - bonus))
    }

    /// A stablecoin holder surrenders `stable_amount` (and optionally
    /// governance tokens) for a settlement claim. Stored in stablecoin
    /// value: the conversion oracle value is unknown until the window
    /// closes.
    pub fn claim_user<S: FungibleToken, G: FungibleToken>(
        &mut self,
        caller: Address,
        dest: Address,
        stable_amount: u64,
        gov_amount: u64,
        stable_token: &mut S,
        gov_token: &mut G,
        now: u64,
    ) -> Result<()> {
        self.require_claim_window_open(now)?;
        if dest.is_zero() {
            return Err(ProtocolError::ZeroAddress);
        }
        if stable_amount == 0 {
            return Err(ProtocolError::ZeroAmount);
        }

        // Anti-griefing cap across both holder classes.
        let claimed_so_far = self
            .total_holder_claims
            .checked_add(self.total_holder_claims_with_bonus)?;
        if claimed_so_far.checked_add(StablecoinValue(stable_amount))?
            > self.max_claimable_by_holders
        {
            return Err(ProtocolError::CapExceeded);
        }

        // Validate every addition before moving any tokens, so a failure
        // past this point can only come from the transfers themselves.
        let (bonus, plain) =
            Self::split_bonus(stable_amount, gov_amount, self.proportional_ratio_gov_user)?;

        let mut bonus_record = self
            .holder_bonus_claims
            .get(&dest)
            .copied()
            .unwrap_or_default();
        let mut bonus_total = self.total_holder_claims_with_bonus;
        if gov_amount > 0 {
            bonus_record.gov_tokens = bonus_record
                .gov_tokens
                .checked_add(gov_amount)
                .ok_or(ProtocolError::ArithmeticOverflow)?;
            bonus_record.claim = bonus_record.claim.checked_add(StablecoinValue(bonus))?;
            bonus_total = bonus_total.checked_add(StablecoinValue(bonus))?;
        }
        let mut plain_record = self.holder_claims.get(&dest).copied().unwrap_or_default();
        let mut plain_total = self.total_holder_claims;
        if plain > 0 {
            plain_record = plain_record.checked_add(StablecoinValue(plain))?;
            plain_total = plain_total.checked_add(StablecoinValue(plain))?;
        }

        // Pull both legs; if the second cannot follow, the first is
        // returned so the claim never half-happens.
        stable_token.transfer_from(caller, self.address, stable_amount)?;
        if gov_amount > 0 {
            if let Err(err) = gov_token.transfer_from(caller, self.address, gov_amount) {
                stable_token.transfer(self.address, caller, stable_amount)?;
                return Err(err);
            }
        }

        // Commit.
        if gov_amount > 0 {
            self.holder_bonus_claims.insert(dest, bonus_record);
            self.total_holder_claims_with_bonus = bonus_total;
        }
        if plain > 0 {
            self.holder_claims.insert(dest, plain_record);
            self.total_holder_claims = plain_total;
        }

        events::emit(&UserClaimRecorded {
            dest,
            stable_amount,
            bonus_portion: bonus,
            gov_tokens: gov_amount,
        });
        Ok(())
    }

    /// Shared LP accumulation path: SLPs and hedging agents are one
    /// claimant class at settlement, denominated in collateral value.
    fn treat_lp_claim<G: FungibleToken>(
        &mut self,
        caller: Address,
        dest: Address,
        amount: CollateralValue,
        gov_amount: u64,
        gov_token: &mut G,
    ) -> Result<()> {
        let (bonus, plain) =
            Self::split_bonus(amount.raw(), gov_amount, self.proportional_ratio_gov_lp)?;

        // Validate every addition before the governance pull, so nothing
        // is recorded or escrowed unless the whole claim goes through.
        let mut bonus_record = self.lp_bonus_claims.get(&dest).copied().unwrap_or_default();
        let mut bonus_total = self.total_lp_claims_with_bonus;
        if gov_amount > 0 {
            bonus_record.gov_tokens = bonus_record
                .gov_tokens
                .checked_add(gov_amount)
                .ok_or(ProtocolError::ArithmeticOverflow)?;
            bonus_record.claim = bonus_record.claim.checked_add(CollateralValue(bonus))?;
            bonus_total = bonus_total.checked_add(CollateralValue(bonus))?;
        }
        let mut plain_record = self.lp_claims.get(&dest).copied().unwrap_or_default();
        let mut plain_total = self.total_lp_claims;
        if plain > 0 {
            plain_record = plain_record.checked_add(CollateralValue(plain))?;
            plain_total = plain_total.checked_add(CollateralValue(plain))?;
        }

        if gov_amount > 0 {
            gov_token.transfer_from(caller, self.address, gov_amount)?;
        }

        // Commit.
        if gov_amount > 0 {
            self.lp_bonus_claims.insert(dest, bonus_record);
            self.total_lp_claims_with_bonus = bonus_total;
        }
        if plain > 0 {
            self.lp_claims.insert(dest, plain_record);
            self.total_lp_claims = plain_total;
        }

        events::emit(&LpClaimRecorded {
            dest,
            collateral_amount: amount.raw(),
            bonus_portion: bonus,
            gov_tokens: gov_amount,
        });
        Ok(())
    }

    /// An SLP surrenders claim tokens, valued at the sanRate frozen when
    /// the settlement was triggered.
    pub fn claim_slp<S: FungibleToken, G: FungibleToken>(
        &mut self,
        caller: Address,
        dest: Address,
        san_amount: u64,
        gov_amount: u64,
        san_token: &mut S,
        gov_token: &mut G,
        now: u64,
    ) -> Result<()> {
        self.require_claim_window_open(now)?;
        if dest.is_zero() {
            return Err(ProtocolError::ZeroAddress);
        }
        if san_amount == 0 {
            return Err(ProtocolError::ZeroAmount);
        }

        let value = mul_div_down(san_amount, self.san_rate_at_trigger, BASE)
            .ok_or(ProtocolError::ArithmeticOverflow)?;

        san_token.transfer_from(caller, self.address, san_amount)?;
        if let Err(err) =
            self.treat_lp_claim(caller, dest, CollateralValue(value), gov_amount, gov_token)
        {
            // The governance leg did not follow; return the claim tokens
            // so the SLP can try again.
            san_token.transfer(self.address, caller, san_amount)?;
            return Err(err);
        }
        Ok(())
    }

    /// A hedging agent claims for a perpetual position, cashed out at the
    /// hedger oracle value frozen at trigger time. One shot per position.
    /// A position below its maintenance margin is worth nothing here -
    /// that is the liquidation outcome, not an error.
    ///
    /// Returns the collateral value credited to the position owner.
    pub fn claim_ha<P: PositionLedger, G: FungibleToken>(
        &mut self,
        caller: Address,
        perpetual_id: u64,
        gov_amount: u64,
        positions: &P,
        gov_token: &mut G,
        now: u64,
    ) -> Result<u64> {
        self.require_claim_window_open(now)?;

        let owner = positions.owner_of(perpetual_id)?;
        if !positions.is_approved_or_owner(caller, perpetual_id) {
            return Err(ProtocolError::Unauthorized);
        }
        if self.ha_claimed.contains(&perpetual_id) {
            return Err(ProtocolError::PositionAlreadyClaimed);
        }

        let (cash_out, below_maintenance_margin) =
            positions.cash_out_amount(perpetual_id, self.oracle_value_hedgers);
        if below_maintenance_margin || cash_out == 0 {
            self.ha_claimed.insert(perpetual_id);
            return Ok(0);
        }

        // Record the claim and consume the position only once the
        // governance pull has gone through; a failed pull leaves the
        // position claimable.
        self.treat_lp_claim(caller, owner, CollateralValue(cash_out), gov_amount, gov_token)?;
        self.ha_claimed.insert(perpetual_id);
        Ok(cash_out)
    }

    /// Close the window and run the waterfall. Callable once, by anyone,
    /// only after the claim window has elapsed.
    ///
    /// Freezes the holder oracle value now, snapshots the collateral left
    /// to distribute, and then fills the four tiers in strict priority
    /// order, each capped at what remains of the pool valued at the frozen
    /// oracle. A tier with no claims keeps a zero share and consumes
    /// nothing. Whatever survives all four tiers stays in the pool for
    /// governance to recover.
    pub fn compute_distribution<O: CollateralOracle, C: FungibleToken>(
        &mut self,
        now: u64,
        oracle: &O,
        collateral_token: &C,
    ) -> Result<()> {
        if self.start_timestamp == 0 {
            return Err(ProtocolError::SettlementNotActive);
        }
        if self.distribution_computed {
            return Err(ProtocolError::AlreadyComputed);
        }
        if now < self.window_end() {
            return Err(ProtocolError::ClaimPeriodNotElapsed);
        }

        let oracle_value_holders = oracle.read_lower()?;
        if oracle_value_holders == 0 {
            return Err(ProtocolError::StaleOracle);
        }

        let amount_to_redistribute = collateral_token.balance_of(self.address);

        // Each tier is filled in its native denomination: the holder
        // tiers in stablecoin, the LP tiers in collateral. The pool's
        // remaining capacity is converted per tier instead of converting
        // the claim totals, so arbitrarily large claims never push an
        // intermediate past u64 and the fully covered branch assigns
        // BASE without dividing at all.
        let tier_totals = [
            self.total_holder_claims_with_bonus.raw(),
            self.total_holder_claims.raw(),
            self.total_lp_claims_with_bonus.raw(),
            self.total_lp_claims.raw(),
        ];

        let mut remaining = amount_to_redistribute;
        let mut shares = [0u64; 4];
        let mut covered = [0u64; 4];
        for (tier, ((share, fill), total)) in shares
            .iter_mut()
            .zip(covered.iter_mut())
            .zip(tier_totals.iter())
            .enumerate()
        {
            if *total == 0 {
                continue;
            }
            let holder_tier = tier < 2;
            let capacity: u128 = if holder_tier {
                remaining as u128 * oracle_value_holders as u128 / BASE as u128
            } else {
                remaining as u128
            };
            if capacity >= *total as u128 {
                *share = BASE;
                *fill = *total;
            } else {
                // capacity < total <= u64::MAX, so both fit.
                *share = (capacity * BASE as u128 / *total as u128) as u64;
                *fill = capacity as u64;
            }
            // Collateral consumed by the fill, rounded up so junior
            // tiers are never promised collateral this tier still needs.
            let consumed = if holder_tier {
                mul_div_up(*fill, BASE, oracle_value_holders)
                    .ok_or(ProtocolError::ArithmeticOverflow)?
            } else {
                *fill
            };
            remaining = remaining.saturating_sub(consumed);
        }
        for share in shares {
            invariants::assert_share_within_full(share)?;
        }

        self.oracle_value_holders = oracle_value_holders;
        self.amount_to_redistribute = amount_to_redistribute;
        self.shares = DistributionShares {
            holder_gov_bonus: shares[0],
            holder: shares[1],
            lp_gov_bonus: shares[2],
            lp: shares[3],
        };
        self.tier_covered = covered;
        self.tier_totals = tier_totals;
        self.distribution_computed = true;

        events::emit(&DistributionComputed {
            oracle_value_holders,
            amount_to_redistribute,
            share_holder_gov_bonus: shares[0],
            share_holder: shares[1],
            share_lp_gov_bonus: shares[2],
            share_lp: shares[3],
            leftover: remaining,
        });
        Ok(())
    }

    /// Pay out everything `dest` is owed across the four tiers, plus the
    /// governance tokens escrowed with the bonus claims. Callable by
    /// anyone on behalf of any address, so batch redemption tooling works.
    ///
    /// All four per-address records are deleted before any transfer; a
    /// second call for the same address pays exactly zero.
    pub fn redeem<C: FungibleToken, G: FungibleToken>(
        &mut self,
        dest: Address,
        collateral_token: &mut C,
        gov_token: &mut G,
    ) -> Result<u64> {
        if !self.distribution_computed {
            return Err(ProtocolError::DistributionNotComputed);
        }
        if dest.is_zero() {
            return Err(ProtocolError::ZeroAddress);
        }

        // Checks: compute the payout from immutable reads.
        let holder_bonus = self
            .holder_bonus_claims
            .get(&dest)
            .copied()
            .unwrap_or_default();
        let holder_plain = self.holder_claims.get(&dest).copied().unwrap_or_default();
        let lp_bonus = self.lp_bonus_claims.get(&dest).copied().unwrap_or_default();
        let lp_plain = self.lp_claims.get(&dest).copied().unwrap_or_default();

        let tier_amounts = [
            holder_bonus.claim.raw(),
            holder_plain.raw(),
            lp_bonus.claim.raw(),
            lp_plain.raw(),
        ];

        // Each tier pays `amount * covered / total` through the exact
        // rational, not the truncated share, so what the waterfall covers
        // is distributed without a BASE rounding loss. Holder tier parts
        // come out in stablecoin and are converted at the frozen oracle;
        // the conversion is bounded by the tier's collateral consumption,
        // so it cannot exceed the pool.
        let mut payout: u64 = 0;
        for (tier, ((amount, fill), total)) in tier_amounts
            .iter()
            .zip(self.tier_covered.iter())
            .zip(self.tier_totals.iter())
            .enumerate()
        {
            if *amount == 0 || *fill == 0 {
                continue;
            }
            let part_native =
                mul_div_down(*amount, *fill, *total).ok_or(ProtocolError::ArithmeticOverflow)?;
            let part = if tier < 2 {
                StablecoinValue(part_native)
                    .to_collateral(self.oracle_value_holders)?
                    .raw()
            } else {
                part_native
            };
            payout = payout
                .checked_add(part)
                .ok_or(ProtocolError::ArithmeticOverflow)?;
        }
        let gov_owed = holder_bonus
            .gov_tokens
            .checked_add(lp_bonus.gov_tokens)
            .ok_or(ProtocolError::ArithmeticOverflow)?;

        let total_redeemed = self
            .total_redeemed
            .checked_add(payout)
            .ok_or(ProtocolError::ArithmeticOverflow)?;
        invariants::assert_waterfall_conservation(total_redeemed, self.amount_to_redistribute)?;

        // Effects: zero every record before interacting with tokens, so a
        // re-entering token implementation finds nothing left to redeem.
        self.total_redeemed = total_redeemed;
        self.holder_bonus_claims.remove(&dest);
        self.holder_claims.remove(&dest);
        self.lp_bonus_claims.remove(&dest);
        self.lp_claims.remove(&dest);

        // Interactions.
        if payout > 0 {
            collateral_token.transfer(self.address, dest, payout)?;
        }
        if gov_owed > 0 {
            gov_token.transfer(self.address, dest, gov_owed)?;
        }

        events::emit(&CollateralRedeemed {
            dest,
            collateral_paid: payout,
            gov_tokens_returned: gov_owed,
        });
        Ok(payout)
    }

    /// Governance sweep for leftover tokens. The redistribute counter is
    /// decremented as bookkeeping only; redemption math uses the frozen
    /// shares and is unaffected.
    pub fn recover<T: FungibleToken>(
        &mut self,
        auth: &AuthorizationContext,
        caller: Address,
        token: &mut T,
        to: Address,
        amount: u64,
    ) -> Result<()> {
        auth.require_governor(caller)?;
        if to.is_zero() {
            return Err(ProtocolError::ZeroAddress);
        }

        token.transfer(self.address, to, amount)?;
        if self.distribution_computed {
            self.amount_to_redistribute = self.amount_to_redistribute.saturating_sub(amount);
        }
        Ok(())
    }
}
