//! CLI commands and handlers
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use tracing::{error, info};

use crate::infrastructure::storage::{YieldDatabase, YieldPoolStore};
use crate::math::{annualized_yield, SECONDS_PER_DAY};
use crate::shared::config::YieldConfig;
use crate::shared::errors::AppError;
use crate::shared::utils::format_amount;

#[derive(Parser)]
#[command(name = "yieldpools")]
#[command(about = "Yield pool poller, cron orchestrator and staking step pipeline")]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "Config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the cron services and pool subscriptions, run until ctrl-c
    Run {
        /// Override the pool stats refresh interval in milliseconds
        #[arg(long)]
        stat_interval_ms: Option<u64>,
    },

    /// List configured pools with their last stored stats
    Pools {
        /// Only pools on this chain
        #[arg(short, long)]
        chain: Option<String>,
    },

    /// Annualized yield implied by two exchange-rate samples
    Apy {
        #[arg(long)]
        r0: f64,

        #[arg(long)]
        r1: f64,

        /// Days between the two samples
        #[arg(long, default_value_t = 14)]
        days: u64,
    },
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(command: Commands, config: YieldConfig) -> Result<(), AppError> {
        match command {
            Commands::Run { stat_interval_ms } => Self::execute_run_command(stat_interval_ms, config).await,
            Commands::Pools { chain } => Self::execute_pools_command(chain, config),
            Commands::Apy { r0, r1, days } => Self::execute_apy_command(r0, r1, days),
        }
    }

    async fn execute_run_command(stat_interval_ms: Option<u64>, mut config: YieldConfig) -> Result<(), AppError> {
        if let Some(ms) = stat_interval_ms {
            config.earning.stat_refresh_interval_ms = ms;
        }

        crate::app::run(config)
            .await
            .map_err(|e| AppError::Unknown(e.to_string()))
    }

    fn execute_pools_command(chain: Option<String>, config: YieldConfig) -> Result<(), AppError> {
        let store = YieldPoolStore::new(YieldDatabase::open(&config.storage.path)?);
        let chains: Vec<String> = chain.into_iter().collect();
        let stored: HashMap<String, _> = store
            .get_by_chains(&chains)?
            .into_iter()
            .map(|info| (info.slug().to_string(), info))
            .collect();

        let pools: Vec<_> = config
            .pools
            .iter()
            .filter(|p| chains.is_empty() || chains.iter().any(|c| c.eq_ignore_ascii_case(&p.chain)))
            .collect();

        let assets = config.asset_map();
        info!("📊 {} pools", pools.len());
        for pool in pools {
            let decimals = pool
                .input_assets
                .first()
                .and_then(|slug| assets.get(slug))
                .map(|a| a.decimals)
                .unwrap_or(0);

            match stored.get(&pool.slug).and_then(|info| info.stats.as_ref()) {
                Some(stats) => info!(
                    "   {} [{} on {}] {} {:.2}%, tvl {}, min join {}{}",
                    pool.slug,
                    pool.pool_type,
                    pool.chain,
                    if stats.yield_rate.is_apr() { "APR" } else { "APY" },
                    stats.yield_rate.value(),
                    format_amount(stats.tvl, decimals),
                    format_amount(stats.min_join_pool, decimals),
                    if stats.is_available { "" } else { " (unavailable)" }
                ),
                None => info!("   {} [{} on {}] no stats yet", pool.slug, pool.pool_type, pool.chain),
            }
        }

        Ok(())
    }

    fn execute_apy_command(r0: f64, r1: f64, days: u64) -> Result<(), AppError> {
        match annualized_yield(r0, r1, (days * SECONDS_PER_DAY) as f64) {
            Ok(apy) => {
                info!("📈 APY over {} days: {:.4} ({:.2}%)", days, apy, apy * 100.0);
                Ok(())
            }
            Err(e) => {
                error!("❌ {}", e);
                Err(AppError::ConfigError(e.to_string()))
            }
        }
    }
}
