//! Price spike detection
//!
//! Each market keeps a short window of observations. A new observation is
//! compared with the price `lookback` seconds earlier and flagged when the
//! relative move reaches the threshold. Alerts on the same market are
//! suppressed for `cooldown` seconds after firing.
//!
//! Right after start-up no observation predates the lookback window, so the
//! oldest retained observation is used as the reference instead. The move is
//! then measured over a shorter span than configured.

use crate::client::PriceSource;
use crate::config::SpikeConfig;
use crate::types::fmt_cents;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

/// One sampled price for a market
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

/// Bounded history of observations plus the last alert time
#[derive(Debug, Clone, Default)]
pub struct PriceWindow {
    observations: VecDeque<PriceObservation>,
    last_alert: Option<DateTime<Utc>>,
}

impl PriceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> impl Iterator<Item = &PriceObservation> {
        self.observations.iter()
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.last_alert
    }

    fn push(&mut self, observation: PriceObservation) {
        self.observations.push_back(observation);
    }

    /// Keep only observations strictly newer than `cutoff`
    fn trim(&mut self, cutoff: DateTime<Utc>) {
        while self
            .observations
            .front()
            .is_some_and(|o| o.timestamp <= cutoff)
        {
            self.observations.pop_front();
        }
    }

    /// Latest observation at or before `cutoff`, else the oldest one
    fn reference(&self, cutoff: DateTime<Utc>) -> Option<&PriceObservation> {
        self.observations
            .iter()
            .rev()
            .find(|o| o.timestamp <= cutoff)
            .or_else(|| self.observations.front())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpikeDirection {
    Up,
    Down,
}

impl fmt::Display for SpikeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpikeDirection::Up => write!(f, "UP"),
            SpikeDirection::Down => write!(f, "DOWN"),
        }
    }
}

/// A detected spike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub market_id: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// |new - old| / old
    pub change_fraction: Decimal,
    pub direction: SpikeDirection,
    pub timestamp: DateTime<Utc>,
}

impl SpikeEvent {
    /// One-line alert, e.g. `🚨 SPIKE UP 📈 512: 50¢ → 56¢ (+12.0%)`
    pub fn alert(&self) -> String {
        let (arrow, sign) = match self.direction {
            SpikeDirection::Up => ("📈", "+"),
            SpikeDirection::Down => ("📉", "-"),
        };
        format!(
            "🚨 SPIKE {} {} {}: {} → {} ({}{}%)",
            self.direction,
            arrow,
            self.market_id,
            fmt_cents(self.old_price),
            fmt_cents(self.new_price),
            sign,
            (self.change_fraction * Decimal::ONE_HUNDRED).round_dp(1)
        )
    }
}

/// Outcome of one evaluation. Only `Spike` carries an event; the other
/// variants say why nothing fired.
#[derive(Debug, Clone, PartialEq)]
pub enum SpikeCheck {
    Spike(SpikeEvent),
    /// Fewer than two observations in the window
    InsufficientHistory,
    CoolingDown,
    /// Move below threshold; carries the measured change fraction
    BelowThreshold(Decimal),
    /// Reference price was zero, ratio undefined
    ZeroReference,
    /// The price source returned its failure sentinel
    PriceUnavailable,
}

impl SpikeCheck {
    pub fn into_event(self) -> Option<SpikeEvent> {
        match self {
            SpikeCheck::Spike(event) => Some(event),
            _ => None,
        }
    }
}

/// Spike detector for a single market
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    market_id: String,
    config: SpikeConfig,
    window: PriceWindow,
}

impl SpikeDetector {
    pub fn new(market_id: impl Into<String>, config: SpikeConfig) -> Self {
        Self {
            market_id: market_id.into(),
            config,
            window: PriceWindow::new(),
        }
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    /// Record a price sampled now
    pub fn add_price(
        &mut self,
        price: Decimal,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
    ) -> Option<SpikeEvent> {
        self.add_price_at(Utc::now(), price, bid, ask)
    }

    pub fn add_price_at(
        &mut self,
        now: DateTime<Utc>,
        price: Decimal,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
    ) -> Option<SpikeEvent> {
        self.evaluate_at(now, price, bid, ask).into_event()
    }

    /// Record an observation taken at `now` and evaluate it
    pub fn evaluate_at(
        &mut self,
        now: DateTime<Utc>,
        price: Decimal,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
    ) -> SpikeCheck {
        let lookback = Duration::seconds(self.config.lookback_secs as i64);

        self.window.push(PriceObservation {
            timestamp: now,
            price,
            bid,
            ask,
        });
        self.window.trim(now - lookback * 2);

        if self.window.len() < 2 {
            return SpikeCheck::InsufficientHistory;
        }

        if let Some(last) = self.window.last_alert {
            if now - last < Duration::seconds(self.config.cooldown_secs as i64) {
                return SpikeCheck::CoolingDown;
            }
        }

        let old_price = match self.window.reference(now - lookback) {
            Some(obs) => obs.price,
            None => return SpikeCheck::InsufficientHistory,
        };
        if old_price.is_zero() {
            return SpikeCheck::ZeroReference;
        }

        let change_fraction = (price - old_price).abs() / old_price;
        if change_fraction < self.config.threshold {
            return SpikeCheck::BelowThreshold(change_fraction);
        }

        self.window.last_alert = Some(now);
        SpikeCheck::Spike(SpikeEvent {
            market_id: self.market_id.clone(),
            old_price,
            new_price: price,
            change_fraction,
            direction: if price > old_price {
                SpikeDirection::Up
            } else {
                SpikeDirection::Down
            },
            timestamp: now,
        })
    }
}

/// Watches several markets, polling each in turn
pub struct SpikeMonitor {
    detectors: Vec<SpikeDetector>,
}

impl SpikeMonitor {
    pub fn new<I, S>(market_ids: I, config: SpikeConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let detectors = market_ids
            .into_iter()
            .map(|id| SpikeDetector::new(id, config.clone()))
            .collect();
        Self { detectors }
    }

    pub fn market_ids(&self) -> impl Iterator<Item = &str> {
        self.detectors.iter().map(|d| d.market_id())
    }

    pub fn detector(&self, market_id: &str) -> Option<&SpikeDetector> {
        self.detectors.iter().find(|d| d.market_id() == market_id)
    }

    /// Sample every market once
    pub async fn poll(&mut self, prices: &dyn PriceSource) -> Vec<SpikeEvent> {
        self.poll_at(Utc::now(), prices)
            .await
            .into_iter()
            .filter_map(SpikeCheck::into_event)
            .collect()
    }

    /// Sample every market once, returning the check for each in order
    pub async fn poll_at(&mut self, now: DateTime<Utc>, prices: &dyn PriceSource) -> Vec<SpikeCheck> {
        let mut checks = Vec::with_capacity(self.detectors.len());

        for detector in &mut self.detectors {
            let book = prices.get_best_prices(detector.market_id()).await;
            if book.is_unavailable() {
                debug!("No usable book for {}, skipping sample", detector.market_id());
                checks.push(SpikeCheck::PriceUnavailable);
                continue;
            }

            let check = detector.evaluate_at(
                now,
                book.midpoint(),
                Some(book.best_bid),
                Some(book.best_ask),
            );
            if let SpikeCheck::Spike(event) = &check {
                info!("{}", event.alert());
            }
            checks.push(check);
        }

        checks
    }
}
