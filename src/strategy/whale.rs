//! Whale trade selection
//!
//! Turns a batch of recent trades into a ranked list of copy candidates:
//! large entries inside the tradeable band, one per market, optionally
//! restricted to traders whose profile shows enough profit.

use crate::client::TraderProfileSource;
use crate::config::WhaleConfig;
use crate::executor::RoundState;
use crate::types::{fmt_cents, fmt_usd, TradeRecord, TraderProfile};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Result of resolving a trader's profile
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(TraderProfile),
    NotFound,
    Failed(String),
}

/// Per-pass profile cache: at most one lookup per trader address
#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: HashMap<String, ProfileLookup>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct traders looked up
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn lookup(
        &mut self,
        address: &str,
        source: &dyn TraderProfileSource,
    ) -> ProfileLookup {
        if let Some(cached) = self.entries.get(address) {
            return cached.clone();
        }

        let lookup = match source.fetch_trader_profile(address).await {
            Ok(Some(profile)) => ProfileLookup::Found(profile),
            Ok(None) => ProfileLookup::NotFound,
            Err(e) => {
                warn!("Profile lookup for {} failed: {}", address, e);
                ProfileLookup::Failed(e.to_string())
            }
        };
        self.entries.insert(address.to_string(), lookup.clone());
        lookup
    }
}

/// A trade worth copying
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhaleCandidate {
    /// Condition id of the traded market
    pub market_id: String,
    pub slug: Option<String>,
    pub title: String,
    pub usd_value: Decimal,
    pub price: Decimal,
    pub size: Decimal,
    pub trader_address: String,
    pub trader_name: String,
    /// Known only when the profitability gate looked the trader up
    pub trader_profit: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for WhaleCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} by {}",
            fmt_usd(self.usd_value),
            fmt_cents(self.price),
            self.title,
            self.trader_name
        )?;
        if let Some(profit) = self.trader_profit {
            write!(f, " [+{}]", fmt_usd(profit))?;
        }
        Ok(())
    }
}

/// Why trades were dropped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub wrong_side: usize,
    pub too_small: usize,
    pub outside_band: usize,
    pub stale: usize,
    pub keyword_mismatch: usize,
    pub already_used: usize,
    pub duplicate_market: usize,
    /// Profile missing or lookup failed
    pub profile_unavailable: usize,
    pub unprofitable: usize,
}

impl RejectionCounts {
    pub fn total(&self) -> usize {
        self.wrong_side
            + self.too_small
            + self.outside_band
            + self.stale
            + self.keyword_mismatch
            + self.already_used
            + self.duplicate_market
            + self.profile_unavailable
            + self.unprofitable
    }
}

/// Output of one selection pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionReport {
    pub scanned: usize,
    /// Ranked by USD value, largest first
    pub candidates: Vec<WhaleCandidate>,
    /// Accepted but cut by `max_candidates`
    pub truncated: usize,
    pub rejections: RejectionCounts,
    pub profile_lookups: usize,
}

impl fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.rejections;
        write!(
            f,
            "{} trades scanned, {} candidates ({} cut), rejected: side {}, size {}, band {}, stale {}, keyword {}, used {}, dup {}, no profile {}, unprofitable {}",
            self.scanned,
            self.candidates.len(),
            self.truncated,
            r.wrong_side,
            r.too_small,
            r.outside_band,
            r.stale,
            r.keyword_mismatch,
            r.already_used,
            r.duplicate_market,
            r.profile_unavailable,
            r.unprofitable
        )
    }
}

pub struct WhaleSelector {
    config: WhaleConfig,
}

impl WhaleSelector {
    pub fn new(config: WhaleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WhaleConfig {
        &self.config
    }

    pub async fn select(
        &self,
        trades: &[TradeRecord],
        round: &RoundState,
        profiles: &dyn TraderProfileSource,
    ) -> SelectionReport {
        self.select_at(Utc::now(), trades, round, profiles).await
    }

    /// Run one selection pass. Trades are considered in input order;
    /// markets already used this round are skipped.
    pub async fn select_at(
        &self,
        now: DateTime<Utc>,
        trades: &[TradeRecord],
        round: &RoundState,
        profiles: &dyn TraderProfileSource,
    ) -> SelectionReport {
        let cfg = &self.config;
        let keywords: Vec<String> = cfg
            .title_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let oldest = cfg
            .max_age_secs
            .map(|secs| now - Duration::seconds(secs as i64));

        let mut report = SelectionReport {
            scanned: trades.len(),
            ..Default::default()
        };
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cache = ProfileCache::new();
        let mut accepted = Vec::new();

        for trade in trades {
            let rej = &mut report.rejections;

            if trade.side != cfg.entry_side {
                rej.wrong_side += 1;
                continue;
            }

            let usd_value = trade.usd_value();
            if usd_value < cfg.min_usd {
                rej.too_small += 1;
                continue;
            }

            // Near 0 or 1 the market is all but resolved
            if trade.price <= cfg.min_price || trade.price >= cfg.max_price {
                rej.outside_band += 1;
                continue;
            }

            if oldest.is_some_and(|oldest| trade.timestamp < oldest) {
                rej.stale += 1;
                continue;
            }

            if !keywords.is_empty() {
                let title = trade.title.to_lowercase();
                if !keywords.iter().any(|k| title.contains(k.as_str())) {
                    rej.keyword_mismatch += 1;
                    continue;
                }
            }

            if round.is_used(&trade.market_id) {
                rej.already_used += 1;
                continue;
            }

            if seen.contains(trade.market_id.as_str()) {
                rej.duplicate_market += 1;
                continue;
            }

            let mut profile = None;
            if cfg.only_profitable {
                if trade.trader_address.is_empty() {
                    debug!("Trade on {} has no trader address", trade.market_id);
                    rej.profile_unavailable += 1;
                    continue;
                }

                match cache.lookup(&trade.trader_address, profiles).await {
                    ProfileLookup::Found(p) if p.profit >= cfg.min_profit => profile = Some(p),
                    ProfileLookup::Found(p) => {
                        debug!(
                            "Skipping {}: profit {} below {}",
                            trade.trader_address, p.profit, cfg.min_profit
                        );
                        rej.unprofitable += 1;
                        continue;
                    }
                    ProfileLookup::NotFound | ProfileLookup::Failed(_) => {
                        rej.profile_unavailable += 1;
                        continue;
                    }
                }
            }

            seen.insert(trade.market_id.as_str());
            accepted.push(WhaleCandidate {
                market_id: trade.market_id.clone(),
                slug: trade.slug.clone(),
                title: trade.title.clone(),
                usd_value,
                price: trade.price,
                size: trade.size,
                trader_address: trade.trader_address.clone(),
                trader_name: display_name(trade, profile.as_ref()),
                trader_profit: profile.map(|p| p.profit),
                timestamp: trade.timestamp,
            });
        }

        accepted.sort_by(|a, b| b.usd_value.cmp(&a.usd_value));
        report.truncated = accepted.len().saturating_sub(cfg.max_candidates);
        accepted.truncate(cfg.max_candidates);
        report.candidates = accepted;
        report.profile_lookups = cache.len();

        info!("🐋 {}", report);
        report
    }
}

/// Profile name, then the feed's name, then a shortened address
fn display_name(trade: &TradeRecord, profile: Option<&TraderProfile>) -> String {
    profile
        .and_then(|p| p.name.clone())
        .filter(|n| !n.is_empty())
        .or_else(|| trade.trader_name.clone().filter(|n| !n.is_empty()))
        .unwrap_or_else(|| {
            if trade.trader_address.is_empty() {
                "anon".to_string()
            } else {
                trade.trader_address.chars().take(10).collect()
            }
        })
}
