//! Configuration loading
//!
//! `config.toml` is optional; every section has defaults. Environment
//! variables prefixed `POLYBOT__` override file values, e.g.
//! `POLYBOT__EXECUTION__ROUND_BUDGET=25`.

use crate::error::{BotError, Result};
use crate::types::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub polymarket: PolymarketConfig,
    #[serde(default)]
    pub spike: SpikeConfig,
    #[serde(default)]
    pub whale: WhaleConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load from a TOML file (if present) plus environment overrides
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(Path::new(path)).required(false))
            .add_source(
                config::Environment::with_prefix("POLYBOT")
                    .prefix_separator("__")
                    .separator("__"),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.polymarket.private_key = expand(&cfg.polymarket.private_key)?;
        if let Some(funder) = &cfg.polymarket.funder_address {
            cfg.polymarket.funder_address = Some(expand(funder)?);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.spike.threshold <= Decimal::ZERO {
            return Err(BotError::Config("spike.threshold must be positive".into()));
        }
        if self.whale.min_price >= self.whale.max_price {
            return Err(BotError::Config(
                "whale.min_price must be below whale.max_price".into(),
            ));
        }
        if self.volume.min_price >= self.volume.max_price {
            return Err(BotError::Config(
                "volume.min_price must be below volume.max_price".into(),
            ));
        }
        if self.execution.min_price >= self.execution.max_price {
            return Err(BotError::Config(
                "execution.min_price must be below execution.max_price".into(),
            ));
        }
        if self.execution.bet_usd <= Decimal::ZERO {
            return Err(BotError::Config("execution.bet_usd must be positive".into()));
        }
        if self.scheduler.interval_minutes == 0 {
            return Err(BotError::Config(
                "scheduler.interval_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn expand(value: &str) -> Result<String> {
    shellexpand::env(value)
        .map(|s| s.into_owned())
        .map_err(|e| BotError::Config(format!("Failed to expand {}: {}", value, e)))
}

/// Venue endpoints and signing identity
#[derive(Debug, Clone, Deserialize)]
pub struct PolymarketConfig {
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    #[serde(default = "default_data_url")]
    pub data_url: String,
    /// Hex private key; `${VAR}` references are expanded from the environment
    #[serde(default)]
    pub private_key: String,
    /// Proxy wallet holding funds, if different from the signer
    pub funder_address: Option<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default)]
    pub signature_type: u8,
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_data_url() -> String {
    "https://data-api.polymarket.com".to_string()
}

fn default_chain_id() -> u64 {
    137
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            clob_url: default_clob_url(),
            gamma_url: default_gamma_url(),
            data_url: default_data_url(),
            private_key: String::new(),
            funder_address: None,
            chain_id: default_chain_id(),
            signature_type: 0,
        }
    }
}

/// Price spike detection
#[derive(Debug, Clone, Deserialize)]
pub struct SpikeConfig {
    /// Minimum relative change that counts as a spike (0.05 = 5%)
    #[serde(default = "default_spike_threshold")]
    pub threshold: Decimal,
    /// Compare against the price this many seconds ago
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    /// Minimum seconds between two alerts on the same market
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Seconds between book polls when monitoring
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_spike_threshold() -> Decimal {
    dec!(0.05)
}

fn default_lookback_secs() -> u64 {
    60
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            threshold: default_spike_threshold(),
            lookback_secs: default_lookback_secs(),
            cooldown_secs: default_cooldown_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Whale trade selection
#[derive(Debug, Clone, Deserialize)]
pub struct WhaleConfig {
    /// Only trades on this side are copied
    #[serde(default = "default_entry_side")]
    pub entry_side: Side,
    /// Minimum notional (price x size) in USD
    #[serde(default = "default_min_usd")]
    pub min_usd: Decimal,
    /// Exclusive lower bound of the tradeable price band
    #[serde(default = "default_min_price")]
    pub min_price: Decimal,
    /// Exclusive upper bound of the tradeable price band
    #[serde(default = "default_max_price")]
    pub max_price: Decimal,
    /// Require the trader's profile to clear `min_profit`
    #[serde(default = "default_true")]
    pub only_profitable: bool,
    #[serde(default)]
    pub min_profit: Decimal,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Ignore trades older than this
    pub max_age_secs: Option<u64>,
    /// When non-empty, the trade title must contain one of these
    #[serde(default)]
    pub title_keywords: Vec<String>,
    /// Trades requested from the feed per pass
    #[serde(default = "default_trade_fetch_limit")]
    pub trade_fetch_limit: usize,
}

fn default_entry_side() -> Side {
    Side::Buy
}

fn default_min_usd() -> Decimal {
    dec!(5000)
}

fn default_min_price() -> Decimal {
    dec!(0.05)
}

fn default_max_price() -> Decimal {
    dec!(0.95)
}

fn default_true() -> bool {
    true
}

fn default_max_candidates() -> usize {
    5
}

fn default_trade_fetch_limit() -> usize {
    500
}

impl Default for WhaleConfig {
    fn default() -> Self {
        Self {
            entry_side: default_entry_side(),
            min_usd: default_min_usd(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            only_profitable: true,
            min_profit: Decimal::ZERO,
            max_candidates: default_max_candidates(),
            max_age_secs: None,
            title_keywords: Vec::new(),
            trade_fetch_limit: default_trade_fetch_limit(),
        }
    }
}

/// Top-volume market selection
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    /// Markets bought per round
    #[serde(default = "default_volume_count")]
    pub count: usize,
    /// Markets requested from the listing per round
    #[serde(default = "default_listing_limit")]
    pub listing_limit: usize,
    #[serde(default = "default_min_price")]
    pub min_price: Decimal,
    #[serde(default = "default_max_price")]
    pub max_price: Decimal,
    /// When non-empty, the market question must contain one of these
    #[serde(default)]
    pub title_keywords: Vec<String>,
}

fn default_volume_count() -> usize {
    3
}

fn default_listing_limit() -> usize {
    100
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            count: default_volume_count(),
            listing_limit: default_listing_limit(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            title_keywords: Vec::new(),
        }
    }
}

/// Order execution limits
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Budget available to one round, in USD
    #[serde(default = "default_round_budget")]
    pub round_budget: Decimal,
    /// Notional per single-order instruction, in USD
    #[serde(default = "default_bet_usd")]
    pub bet_usd: Decimal,
    /// Delay between consecutive orders
    #[serde(default = "default_order_delay_ms")]
    pub order_delay_ms: u64,
    /// Orders priced at or below this are rejected before submission
    #[serde(default = "default_min_price")]
    pub min_price: Decimal,
    /// Orders priced at or above this are rejected before submission
    #[serde(default = "default_max_price")]
    pub max_price: Decimal,
}

fn default_round_budget() -> Decimal {
    dec!(50)
}

fn default_bet_usd() -> Decimal {
    dec!(5)
}

fn default_order_delay_ms() -> u64 {
    500
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            round_budget: default_round_budget(),
            bet_usd: default_bet_usd(),
            order_delay_ms: default_order_delay_ms(),
            min_price: default_min_price(),
            max_price: default_max_price(),
        }
    }
}

/// Round scheduling
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Stop after this many rounds; run forever when unset
    pub max_runs: Option<u32>,
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

fn default_strategy() -> String {
    "whale".to_string()
}

fn default_interval_minutes() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            interval_minutes: default_interval_minutes(),
            max_runs: None,
            dry_run: true,
        }
    }
}
