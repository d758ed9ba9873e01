//! Core types shared across the engine

use crate::error::BotError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(BotError::InvalidInstruction(format!("unknown side: {}", other))),
        }
    }
}

/// Order time-in-force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Good till cancelled
    GTC,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::GTC => write!(f, "GTC"),
        }
    }
}

/// Top of book for one market outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPrices {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl BestPrices {
    pub fn new(best_bid: Decimal, best_ask: Decimal) -> Self {
        Self { best_bid, best_ask }
    }

    /// Sentinel returned when the book cannot be fetched: the widest possible
    /// spread, so nothing downstream treats it as a tradeable quote.
    pub fn unavailable() -> Self {
        Self {
            best_bid: Decimal::ZERO,
            best_ask: Decimal::ONE,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.best_bid <= Decimal::ZERO && self.best_ask >= Decimal::ONE
    }

    pub fn midpoint(&self) -> Decimal {
        (self.best_bid + self.best_ask) / Decimal::TWO
    }

    /// Price a taker would pay (BUY) or receive (SELL)
    pub fn touch(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.best_ask,
            Side::Sell => self.best_bid,
        }
    }
}

/// Outcome prices from the market listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub yes: Decimal,
    pub no: Decimal,
}

impl MarketPrice {
    /// Fallback used when the listing has no usable prices
    pub fn even() -> Self {
        Self {
            yes: Decimal::new(5, 1),
            no: Decimal::new(5, 1),
        }
    }
}

/// One entry of the market listing ranked by 24h volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_id: String,
    pub condition_id: Option<String>,
    pub question: String,
    /// YES outcome price from the listing
    pub yes_price: Decimal,
    pub volume_24h: Decimal,
}

/// A trade seen on the public trade feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Condition id of the market traded
    pub market_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub trader_address: String,
    /// Display name or pseudonym reported by the feed
    pub trader_name: Option<String>,
    pub title: String,
    /// Market slug, used to resolve a tradeable market id
    pub slug: Option<String>,
    pub outcome: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    /// Notional value in USD
    pub fn usd_value(&self) -> Decimal {
        self.price * self.size
    }
}

/// Trader statistics from the profile endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderProfile {
    pub address: String,
    pub name: Option<String>,
    pub profit: Decimal,
    pub volume: Decimal,
    pub position_count: u32,
    pub rank: u32,
}

/// Venue status of a submitted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusKind {
    Matched,
    Live,
    Rejected,
    Error,
}

impl OrderStatusKind {
    /// Map the venue's status string
    pub fn from_venue(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "matched" | "filled" => OrderStatusKind::Matched,
            "live" | "delayed" | "unmatched" => OrderStatusKind::Live,
            "rejected" | "cancelled" | "canceled" => OrderStatusKind::Rejected,
            _ => OrderStatusKind::Error,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, OrderStatusKind::Matched | OrderStatusKind::Live)
    }
}

/// Acknowledgement from order submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub status: OrderStatusKind,
    pub order_id: Option<String>,
    /// Venue-supplied reason when not accepted
    pub message: Option<String>,
}

impl OrderAck {
    pub fn accepted(status: OrderStatusKind, order_id: impl Into<String>) -> Self {
        Self {
            status,
            order_id: Some(order_id.into()),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: OrderStatusKind::Rejected,
            order_id: None,
            message: Some(message.into()),
        }
    }
}

/// Format a price as cents, e.g. `48¢`
pub fn fmt_cents(price: Decimal) -> String {
    format!("{}¢", (price * Decimal::ONE_HUNDRED).round_dp(1).normalize())
}

/// Format a USD amount compactly, e.g. `$12.5K`
pub fn fmt_usd(value: Decimal) -> String {
    let million = Decimal::new(1_000_000, 0);
    let thousand = Decimal::new(1_000, 0);
    if value >= million {
        format!("${:.1}M", value / million)
    } else if value >= thousand {
        format!("${:.1}K", value / thousand)
    } else {
        format!("${:.0}", value)
    }
}
