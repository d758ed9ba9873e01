//! Top-volume market selection

use crate::config::VolumeConfig;
use crate::executor::RoundState;
use crate::types::MarketSummary;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Why listed markets were passed over
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeRejections {
    pub keyword_mismatch: usize,
    pub already_used: usize,
    pub outside_band: usize,
}

/// Output of one volume pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct VolumeReport {
    /// Listing entries looked at before `count` picks were found
    pub scanned: usize,
    /// In listing order, highest volume first
    pub picks: Vec<MarketSummary>,
    pub rejections: VolumeRejections,
}

impl fmt::Display for VolumeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.rejections;
        write!(
            f,
            "{} markets scanned, {} picked, rejected: keyword {}, used {}, band {}",
            self.scanned,
            self.picks.len(),
            r.keyword_mismatch,
            r.already_used,
            r.outside_band
        )
    }
}

pub struct VolumeSelector {
    config: VolumeConfig,
}

impl VolumeSelector {
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    pub fn listing_limit(&self) -> usize {
        self.config.listing_limit
    }

    /// Walk the listing in order and keep the first `count` markets that
    /// match the keywords, were not traded this round and sit inside the
    /// price band.
    pub fn select(&self, markets: &[MarketSummary], round: &RoundState) -> VolumeReport {
        let cfg = &self.config;
        let keywords: Vec<String> = cfg
            .title_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();

        let mut report = VolumeReport::default();

        for market in markets {
            if report.picks.len() >= cfg.count {
                break;
            }
            report.scanned += 1;
            let rej = &mut report.rejections;

            if !keywords.is_empty() {
                let question = market.question.to_lowercase();
                if !keywords.iter().any(|k| question.contains(k.as_str())) {
                    rej.keyword_mismatch += 1;
                    continue;
                }
            }

            let used = round.is_used(&market.market_id)
                || market.condition_id.as_deref().is_some_and(|c| round.is_used(c))
                || report.picks.iter().any(|p| p.market_id == market.market_id);
            if used {
                debug!("Skipping {}: already traded this round", market.market_id);
                rej.already_used += 1;
                continue;
            }

            if market.yes_price <= cfg.min_price || market.yes_price >= cfg.max_price {
                rej.outside_band += 1;
                continue;
            }

            report.picks.push(market.clone());
        }

        report
    }
}
