//! Trading strategies
//!
//! Signal sources (spike detection, whale and top-volume selection), the
//! ladder planner, and the glue that turns their output into executable
//! instructions.

pub mod ladder;
pub mod spike;
pub mod volume;
pub mod whale;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod volume_tests;

pub use ladder::{LadderInstruction, LadderPlan, LadderPlanner};
pub use spike::{PriceObservation, PriceWindow, SpikeCheck, SpikeDetector, SpikeDirection, SpikeEvent, SpikeMonitor};
pub use volume::{VolumeRejections, VolumeReport, VolumeSelector};
pub use whale::{ProfileCache, ProfileLookup, RejectionCounts, SelectionReport, WhaleCandidate, WhaleSelector};

use crate::client::{resolve_market, MarketResolver};
use crate::config::{VolumeConfig, WhaleConfig};
use crate::error::BotError;
use crate::executor::TradeInstruction;
use crate::types::{fmt_cents, fmt_usd, MarketSummary};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Title fragments that mark a sports market
pub const SPORTS_KEYWORDS: &[&str] = &[
    "win on", "spread", "o/u", "over/under", "total", "fc ", "vs", "match", "game", "nba", "nfl",
    "mlb", "nhl", "premier league", "la liga", "champions league", "ucl", "cavaliers", "celtics",
    "lakers", "warriors", "bulls", "red wings", "maple leafs", "rangers", "bruins", "penguins",
    "flames", "oilers", "canucks", "jets", "wild", "avalanche", "australian open", "ufc",
    "boxing", "mma", "tennis",
];

/// Question fragments that mark an Elon Musk market
pub const ELON_KEYWORDS: &[&str] = &["elon", "musk", "tweet"];

/// Longest title kept in instruction labels
const LABEL_LEN: usize = 45;

/// Strategy run once per scheduler round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Copy the largest recent entries
    Whale,
    /// Buy the highest-volume open markets
    Volume,
    /// Buy the highest-volume sports market
    Sport,
    /// Buy the highest-volume Elon Musk markets
    Elon,
    /// Buy the top sports market, then follow sports whales in the same round
    SportWhale,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Whale => "whale",
            StrategyKind::Volume => "volume",
            StrategyKind::Sport => "sport",
            StrategyKind::Elon => "elon",
            StrategyKind::SportWhale => "sport-whale",
        }
    }

    /// Whether rounds start with a top-volume pass
    pub fn uses_volume(&self) -> bool {
        !matches!(self, StrategyKind::Whale)
    }

    /// Whether rounds run whale selection
    pub fn uses_whales(&self) -> bool {
        matches!(self, StrategyKind::Whale | StrategyKind::SportWhale)
    }

    /// Selector settings for this strategy. Sport whale falls back to the
    /// built-in sports keywords when none are configured.
    pub fn whale_config(&self, base: &WhaleConfig) -> WhaleConfig {
        let mut config = base.clone();
        if *self == StrategyKind::SportWhale && config.title_keywords.is_empty() {
            config.title_keywords = keywords(SPORTS_KEYWORDS);
        }
        config
    }

    /// Volume settings for this strategy. Sport and elon fall back to their
    /// built-in keywords; sport whale buys a single sports market.
    pub fn volume_config(&self, base: &VolumeConfig) -> VolumeConfig {
        let mut config = base.clone();
        if config.title_keywords.is_empty() {
            match self {
                StrategyKind::Sport | StrategyKind::SportWhale => {
                    config.title_keywords = keywords(SPORTS_KEYWORDS)
                }
                StrategyKind::Elon => config.title_keywords = keywords(ELON_KEYWORDS),
                StrategyKind::Whale | StrategyKind::Volume => {}
            }
        }
        if *self == StrategyKind::SportWhale {
            config.count = 1;
        }
        config
    }
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|k| k.to_string()).collect()
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whale" => Ok(StrategyKind::Whale),
            "volume" | "top-volume" => Ok(StrategyKind::Volume),
            "sport" => Ok(StrategyKind::Sport),
            "elon" => Ok(StrategyKind::Elon),
            "sport-whale" | "sport_whale" | "sportwhale" => Ok(StrategyKind::SportWhale),
            other => Err(BotError::UnknownStrategy(other.to_string())),
        }
    }
}

/// What to do when a monitored market spikes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeResponse {
    /// Log only
    Alert,
    /// Buy into upward spikes
    Momentum,
    /// Buy after downward spikes
    MeanReversion,
}

impl SpikeResponse {
    /// Instruction to execute for `event`, if any
    pub fn instruction(&self, event: &SpikeEvent, bet: Decimal) -> Option<TradeInstruction> {
        let act = match self {
            SpikeResponse::Alert => false,
            SpikeResponse::Momentum => event.direction == SpikeDirection::Up,
            SpikeResponse::MeanReversion => event.direction == SpikeDirection::Down,
        };
        act.then(|| {
            TradeInstruction::buy_notional(event.market_id.clone(), bet)
                .with_label(format!("spike {} {}", event.direction, event.market_id))
        })
    }
}

impl FromStr for SpikeResponse {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alert" => Ok(SpikeResponse::Alert),
            "momentum" => Ok(SpikeResponse::Momentum),
            "mean-reversion" | "reversion" => Ok(SpikeResponse::MeanReversion),
            other => Err(BotError::Config(format!(
                "Unknown spike response: {} (available: alert, momentum, mean-reversion)",
                other
            ))),
        }
    }
}

/// Instructions for one whale round
#[derive(Debug, Clone, Default)]
pub struct WhalePlan {
    pub instructions: Vec<TradeInstruction>,
    /// Candidates whose market could not be resolved
    pub unresolved: Vec<WhaleCandidate>,
}

/// Resolve each candidate to a tradeable market and size it at `bet` USD.
/// The candidate's condition id travels as the instruction origin so the
/// round's dedup set covers both identifiers.
pub async fn plan_whale_round(
    candidates: &[WhaleCandidate],
    resolver: &dyn MarketResolver,
    bet: Decimal,
) -> WhalePlan {
    let mut plan = WhalePlan::default();

    for candidate in candidates {
        info!("🐋 {}", candidate);
        match resolve_market(resolver, candidate.slug.as_deref(), &candidate.market_id).await {
            Some(market_id) => plan.instructions.push(
                TradeInstruction::buy_notional(market_id, bet)
                    .with_origin(candidate.market_id.clone())
                    .with_label(candidate.title.chars().take(LABEL_LEN).collect::<String>()),
            ),
            None => {
                warn!("✗ Could not find market for {}", candidate.title);
                plan.unresolved.push(candidate.clone());
            }
        }
    }

    plan
}

/// Buy each picked market for `bet` USD. The condition id travels as the
/// instruction origin, so a whale pass later in the round skips it.
pub fn plan_volume_round(picks: &[MarketSummary], bet: Decimal) -> Vec<TradeInstruction> {
    picks
        .iter()
        .map(|market| {
            let label: String = market.question.chars().take(LABEL_LEN).collect();
            info!(
                "📊 {} | {} | {}",
                fmt_usd(market.volume_24h),
                fmt_cents(market.yes_price),
                label
            );
            let instruction =
                TradeInstruction::buy_notional(market.market_id.clone(), bet).with_label(label);
            match &market.condition_id {
                Some(condition) => instruction.with_origin(condition.clone()),
                None => instruction,
            }
        })
        .collect()
}
