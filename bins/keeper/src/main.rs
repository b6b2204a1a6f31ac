use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use ballast_config::KeeperConfig;
use ballast_core::oracle::FixedOracle;
use ballast_core::types::Address;
use ballast_keeper::Keeper;

fn unix_now() -> anyhow::Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before the unix epoch")?
        .as_secs())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ballast_telemetry::init()?;

    let config = KeeperConfig::from_env().context("loading keeper configuration")?;
    config.validate()?;
    tracing::info!(?config, "keeper starting");

    let oracle = FixedOracle::new(config.oracle_value_lower, config.oracle_value_upper);
    let pool_address = Address::from(1u64);
    let mut keeper = Keeper::new(
        oracle,
        pool_address,
        unix_now()?,
        config.max_interest_per_second,
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match keeper.run_cycle(unix_now()?, 0) {
                    Ok(report) => {
                        tracing::debug!(?report, "cycle report");
                    }
                    Err(err) => {
                        tracing::error!(%err, "keeper cycle failed");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
