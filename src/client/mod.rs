//! Venue boundary
//!
//! The engine only talks to the venue through the traits below. The
//! Polymarket implementation combines the Gamma (market metadata), CLOB
//! (order book and orders) and data (trade feed, profiles) APIs.

pub mod auth;
pub mod clob;
pub mod data;
pub mod gamma;


pub use auth::{ApiCredentials, PolySigner};
pub use clob::{ClobClient, OrderBook, OrderBookLevel};
pub use data::DataApiClient;
pub use gamma::{GammaClient, MarketTokens};

use crate::config::PolymarketConfig;
use crate::error::Result;
use crate::types::{
    BestPrices, MarketPrice, MarketSummary, OrderAck, Side, TradeRecord, TraderProfile,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

/// Live prices for a market's YES outcome.
///
/// Implementations must not fail: an unreachable book is reported as
/// [`BestPrices::unavailable`].
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_best_prices(&self, market_id: &str) -> BestPrices;

    async fn get_price(&self, market_id: &str) -> MarketPrice;

    /// Price decimals the book accepts, when known. Limit prices are rounded
    /// to this before any budget check.
    async fn tick_decimals(&self, _market_id: &str) -> Option<u32> {
        None
    }
}

/// Markets ranked by recent volume
#[async_trait]
pub trait MarketListing: Send + Sync {
    async fn fetch_top_volume(&self, limit: usize) -> Result<Vec<MarketSummary>>;
}

/// Recent public trades
#[async_trait]
pub trait TradeFeed: Send + Sync {
    async fn fetch_recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>>;
}

/// Trader statistics lookup. Unknown traders are `Ok(None)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TraderProfileSource: Send + Sync {
    async fn fetch_trader_profile(&self, address: &str) -> Result<Option<TraderProfile>>;
}

/// Order submission and cleanup
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_order(
        &self,
        market_id: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<OrderAck>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    async fn cancel_all_orders(&self) -> Result<()>;
}

/// Translate a trade's descriptive identifiers into a tradeable market id
#[async_trait]
pub trait MarketResolver: Send + Sync {
    async fn fetch_market_by_slug(&self, slug: &str) -> Result<Option<String>>;

    async fn fetch_market_by_condition(&self, condition_id: &str) -> Result<Option<String>>;
}

/// Resolve by slug first, then by condition id
pub async fn resolve_market(
    resolver: &dyn MarketResolver,
    slug: Option<&str>,
    condition_id: &str,
) -> Option<String> {
    if let Some(slug) = slug.filter(|s| !s.is_empty()) {
        match resolver.fetch_market_by_slug(slug).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => debug!("No market for slug {}", slug),
            Err(e) => warn!("Market lookup by slug {} failed: {}", slug, e),
        }
    }

    if condition_id.is_empty() {
        return None;
    }

    match resolver.fetch_market_by_condition(condition_id).await {
        Ok(found) => found,
        Err(e) => {
            warn!("Market lookup by condition {} failed: {}", condition_id, e);
            None
        }
    }
}

/// Full Polymarket client
pub struct PolymarketClient {
    pub gamma: GammaClient,
    pub clob: ClobClient,
    pub data: DataApiClient,
}

impl PolymarketClient {
    /// Build the client. Without a private key the CLOB client is read-only.
    pub fn new(config: &PolymarketConfig) -> Result<Self> {
        let signer = if config.private_key.is_empty() {
            None
        } else {
            Some(PolySigner::from_private_key(
                &config.private_key,
                config.chain_id,
            )?)
        };

        Ok(Self {
            gamma: GammaClient::new(&config.gamma_url)?,
            clob: ClobClient::new(
                &config.clob_url,
                signer,
                config.funder_address.clone(),
                config.signature_type,
            )?,
            data: DataApiClient::new(&config.data_url)?,
        })
    }
}

#[async_trait]
impl PriceSource for PolymarketClient {
    async fn get_best_prices(&self, market_id: &str) -> BestPrices {
        let tokens = match self.gamma.market_tokens(market_id).await {
            Ok(t) => t,
            Err(e) => {
                warn!("No token ids for market {}: {}", market_id, e);
                return BestPrices::unavailable();
            }
        };

        match self.clob.get_order_book(&tokens.yes).await {
            Ok(book) => book.best_prices(),
            Err(e) => {
                warn!("Order book fetch failed for {}: {}", market_id, e);
                BestPrices::unavailable()
            }
        }
    }

    async fn get_price(&self, market_id: &str) -> MarketPrice {
        match self.gamma.get_price(market_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Price fetch failed for {}: {}", market_id, e);
                MarketPrice::even()
            }
        }
    }

    async fn tick_decimals(&self, market_id: &str) -> Option<u32> {
        match self.gamma.market_tokens(market_id).await {
            Ok(tokens) => Some(tokens.tick_decimals()),
            Err(e) => {
                warn!("No tick size for market {}: {}", market_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl OrderGateway for PolymarketClient {
    async fn place_order(
        &self,
        market_id: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<OrderAck> {
        let tokens = self.gamma.market_tokens(market_id).await?;
        self.clob
            .place_order(&tokens.yes, side, price, size, tokens.neg_risk)
            .await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.clob.cancel_order(order_id).await
    }

    async fn cancel_all_orders(&self) -> Result<()> {
        self.clob.cancel_all().await
    }
}

#[async_trait]
impl MarketResolver for PolymarketClient {
    async fn fetch_market_by_slug(&self, slug: &str) -> Result<Option<String>> {
        self.gamma.fetch_market_by_slug(slug).await
    }

    async fn fetch_market_by_condition(&self, condition_id: &str) -> Result<Option<String>> {
        self.gamma.fetch_market_by_condition(condition_id).await
    }
}

#[async_trait]
impl MarketListing for PolymarketClient {
    async fn fetch_top_volume(&self, limit: usize) -> Result<Vec<MarketSummary>> {
        self.gamma.fetch_top_volume(limit).await
    }
}

#[async_trait]
impl TradeFeed for PolymarketClient {
    async fn fetch_recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        self.data.fetch_recent_trades(limit).await
    }
}

#[async_trait]
impl TraderProfileSource for PolymarketClient {
    async fn fetch_trader_profile(&self, address: &str) -> Result<Option<TraderProfile>> {
        self.data.fetch_trader_profile(address).await
    }
}

/// Read a decimal that the APIs send either as a JSON number or a string
pub(crate) fn json_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Read an id that may be a JSON string or number
pub(crate) fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
