//! Protocol events.
//!
//! Every state transition emits one of these through `tracing` at debug
//! level; downstream indexers consume the serde form.

use serde::Serialize;

use crate::types::Address;

pub fn emit<E: Serialize + std::fmt::Debug>(event: &E) {
    match serde_json::to_string(event) {
        Ok(json) => {
            tracing::debug!(target: "ballast::events", event = %json, "protocol event");
        }
        Err(_) => {
            tracing::debug!(target: "ballast::events", event = ?event, "protocol event");
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeesRefreshed {
    pub collateral_ratio: u64,
    pub mint_bonus_malus: u64,
    pub burn_bonus_malus: u64,
    pub slippage: u64,
    pub slippage_fee: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct HedgerFeesRefreshed {
    pub deposit_correction: u64,
    pub withdraw_correction: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SanRateUpdated {
    pub old_san_rate: u64,
    pub new_san_rate: u64,
    pub interest_distributed: u64,
    pub fees_aside: u64,
    pub locked_interest: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SettlementTriggered {
    pub oracle_value_hedgers: u64,
    pub san_rate_at_trigger: u64,
    pub max_claimable_by_holders: u64,
    pub start_timestamp: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UserClaimRecorded {
    pub dest: Address,
    pub stable_amount: u64,
    pub bonus_portion: u64,
    pub gov_tokens: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LpClaimRecorded {
    pub dest: Address,
    pub collateral_amount: u64,
    pub bonus_portion: u64,
    pub gov_tokens: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DistributionComputed {
    pub oracle_value_holders: u64,
    pub amount_to_redistribute: u64,
    pub share_holder_gov_bonus: u64,
    pub share_holder: u64,
    pub share_lp_gov_bonus: u64,
    pub share_lp: u64,
    pub leftover: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CollateralRedeemed {
    pub dest: Address,
    pub collateral_paid: u64,
    pub gov_tokens_returned: u64,
}
