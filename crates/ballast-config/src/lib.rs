//! Environment-driven configuration for the keeper daemon.
//!
//! Values come from the process environment, with a `.env` file loaded
//! first if one exists. Every knob has a default so a bare environment
//! still produces a runnable keeper.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// One unit in the protocol's fixed-point scale.
const BASE: u64 = 1_000_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct KeeperConfig {
    /// Seconds between keeper cycles.
    pub interval_secs: u64,
    /// Conservative (lower) oracle value, BASE-scaled stablecoins per
    /// collateral unit.
    pub oracle_value_lower: u64,
    /// Optimistic (upper) oracle value.
    pub oracle_value_upper: u64,
    /// Interest release cap for the SLP accrual, per second.
    pub max_interest_per_second: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            oracle_value_lower: BASE,
            oracle_value_upper: BASE,
            max_interest_per_second: 1_000,
        }
    }
}

impl KeeperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is not an error; the environment may be complete
        // on its own.
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Ok(Self {
            interval_secs: read_u64("BALLAST_KEEPER_INTERVAL_SECS", defaults.interval_secs)?,
            oracle_value_lower: read_u64("BALLAST_ORACLE_VALUE_LOWER", defaults.oracle_value_lower)?,
            oracle_value_upper: read_u64("BALLAST_ORACLE_VALUE_UPPER", defaults.oracle_value_upper)?,
            max_interest_per_second: read_u64(
                "BALLAST_MAX_INTEREST_PER_SECOND",
                defaults.max_interest_per_second,
            )?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidVar {
                name: "BALLAST_KEEPER_INTERVAL_SECS",
                value: "0".to_string(),
                reason: "the keeper interval must be non-zero".to_string(),
            });
        }
        if self.oracle_value_lower == 0 || self.oracle_value_upper < self.oracle_value_lower {
            return Err(ConfigError::InvalidVar {
                name: "BALLAST_ORACLE_VALUE_LOWER",
                value: self.oracle_value_lower.to_string(),
                reason: "oracle values must be non-zero and lower <= upper".to_string(),
            });
        }
        Ok(())
    }
}

fn read_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidVar {
            name,
            value: raw,
            reason: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}
