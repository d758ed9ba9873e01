//! Deterministic fakes for the venue traits

use crate::client::{
    MarketListing, MarketResolver, OrderGateway, PriceSource, TradeFeed, TraderProfileSource,
};
use crate::error::{BotError, Result};
use crate::types::{
    BestPrices, MarketPrice, MarketSummary, OrderAck, OrderStatusKind, Side, TradeRecord,
    TraderProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tokio::time::Instant;

/// Order book with prices set by the test. Unknown markets are unavailable.
#[derive(Default)]
pub struct FixedBook {
    prices: Mutex<HashMap<String, BestPrices>>,
    tick_decimals: Option<u32>,
}

impl FixedBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this tick precision for every market
    pub fn with_tick(mut self, decimals: u32) -> Self {
        self.tick_decimals = Some(decimals);
        self
    }

    pub fn with(self, market_id: &str, bid: Decimal, ask: Decimal) -> Self {
        self.set(market_id, bid, ask);
        self
    }

    pub fn set(&self, market_id: &str, bid: Decimal, ask: Decimal) {
        self.prices
            .lock()
            .insert(market_id.to_string(), BestPrices::new(bid, ask));
    }
}

#[async_trait]
impl PriceSource for FixedBook {
    async fn get_best_prices(&self, market_id: &str) -> BestPrices {
        self.prices
            .lock()
            .get(market_id)
            .copied()
            .unwrap_or_else(BestPrices::unavailable)
    }

    async fn get_price(&self, market_id: &str) -> MarketPrice {
        let book = self.get_best_prices(market_id).await;
        let yes = book.midpoint();
        MarketPrice {
            yes,
            no: Decimal::ONE - yes,
        }
    }

    async fn tick_decimals(&self, _market_id: &str) -> Option<u32> {
        self.tick_decimals
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub market_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub at: Instant,
}

/// Gateway replaying queued responses, then matching everything
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<OrderAck>>>,
    placed: Mutex<Vec<PlacedOrder>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, response: Result<OrderAck>) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    pub fn then_error(self, message: &str) -> Self {
        self.then(Err(BotError::Api(message.to_string())))
    }

    pub fn placed(&self) -> Vec<PlacedOrder> {
        self.placed.lock().clone()
    }
}

#[async_trait]
impl OrderGateway for ScriptedGateway {
    async fn place_order(
        &self,
        market_id: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<OrderAck> {
        let mut placed = self.placed.lock();
        placed.push(PlacedOrder {
            market_id: market_id.to_string(),
            side,
            price,
            size,
            at: Instant::now(),
        });
        let n = placed.len();
        drop(placed);

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(OrderAck::accepted(OrderStatusKind::Matched, format!("order-{}", n))))
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<()> {
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<()> {
        Ok(())
    }
}

/// Trade feed returning a fixed batch, or failing
pub struct FixedFeed {
    trades: Option<Vec<TradeRecord>>,
}

impl FixedFeed {
    pub fn new(trades: Vec<TradeRecord>) -> Self {
        Self {
            trades: Some(trades),
        }
    }

    pub fn failing() -> Self {
        Self { trades: None }
    }
}

#[async_trait]
impl TradeFeed for FixedFeed {
    async fn fetch_recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        match &self.trades {
            Some(trades) => Ok(trades.iter().take(limit).cloned().collect()),
            None => Err(BotError::Api("feed unavailable".into())),
        }
    }
}

/// Volume listing returning a fixed batch in the given order
#[derive(Default)]
pub struct FixedListing {
    markets: Vec<MarketSummary>,
}

impl FixedListing {
    pub fn new(markets: Vec<MarketSummary>) -> Self {
        Self { markets }
    }
}

#[async_trait]
impl MarketListing for FixedListing {
    async fn fetch_top_volume(&self, limit: usize) -> Result<Vec<MarketSummary>> {
        Ok(self.markets.iter().take(limit).cloned().collect())
    }
}

/// Profiles keyed by address; unknown traders are not found
#[derive(Default)]
pub struct FixedProfiles {
    profiles: HashMap<String, TraderProfile>,
}

impl FixedProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, profit: Decimal) -> Self {
        self.profiles.insert(address.to_string(), profile(address, profit));
        self
    }
}

#[async_trait]
impl TraderProfileSource for FixedProfiles {
    async fn fetch_trader_profile(&self, address: &str) -> Result<Option<TraderProfile>> {
        Ok(self.profiles.get(address).cloned())
    }
}

/// Resolves every condition id to `m-<condition id>`
pub struct EchoResolver;

#[async_trait]
impl MarketResolver for EchoResolver {
    async fn fetch_market_by_slug(&self, _slug: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn fetch_market_by_condition(&self, condition_id: &str) -> Result<Option<String>> {
        Ok(Some(format!("m-{}", condition_id)))
    }
}

pub fn profile(address: &str, profit: Decimal) -> TraderProfile {
    TraderProfile {
        address: address.to_string(),
        name: Some(format!("{}-name", address)),
        profit,
        volume: Decimal::ZERO,
        position_count: 0,
        rank: 0,
    }
}

pub fn trade(market_id: &str, side: Side, price: Decimal, size: Decimal, trader: &str) -> TradeRecord {
    trade_at(market_id, side, price, size, trader, Utc::now())
}

pub fn trade_at(
    market_id: &str,
    side: Side,
    price: Decimal,
    size: Decimal,
    trader: &str,
    timestamp: DateTime<Utc>,
) -> TradeRecord {
    TradeRecord {
        market_id: market_id.to_string(),
        side,
        price,
        size,
        trader_address: trader.to_string(),
        trader_name: None,
        title: format!("Market {}", market_id),
        slug: None,
        outcome: Some("Yes".to_string()),
        timestamp,
    }
}

pub fn listed(market_id: &str, condition_id: &str, question: &str, yes_price: Decimal) -> MarketSummary {
    MarketSummary {
        market_id: market_id.to_string(),
        condition_id: Some(condition_id.to_string()),
        question: question.to_string(),
        yes_price,
        volume_24h: Decimal::new(250_000, 0),
    }
}
