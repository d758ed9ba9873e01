//! Gamma API client for market data
//!
//! Market metadata: outcome prices, CLOB token ids, and lookups by slug or
//! condition id.

use super::{json_decimal, json_id};
use crate::error::{BotError, Result};
use crate::types::{MarketPrice, MarketSummary};
use parking_lot::RwLock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// CLOB token ids for a binary market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTokens {
    pub yes: String,
    pub no: String,
    pub neg_risk: bool,
}

impl MarketTokens {
    /// Price decimals accepted by the book: neg-risk markets tick at 0.01
    pub fn tick_decimals(&self) -> u32 {
        if self.neg_risk {
            2
        } else {
            3
        }
    }
}

/// Gamma API client for market data
#[derive(Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
    /// market id -> tokens; token ids never change for a market
    tokens: Arc<RwLock<HashMap<String, MarketTokens>>>,
}

impl GammaClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Raw market object by numeric id
    pub async fn get_market(&self, market_id: &str) -> Result<Value> {
        let url = format!("{}/markets/{}", self.base_url, market_id);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(BotError::MarketNotFound(market_id.to_string()));
        }
        Ok(resp.json().await?)
    }

    /// Token ids for a market, cached after the first lookup
    pub async fn market_tokens(&self, market_id: &str) -> Result<MarketTokens> {
        if let Some(tokens) = self.tokens.read().get(market_id) {
            return Ok(tokens.clone());
        }

        let market = self.get_market(market_id).await?;
        let tokens = parse_market_tokens(&market)
            .ok_or_else(|| BotError::Api(format!("No token ids for market {}", market_id)))?;

        self.tokens
            .write()
            .insert(market_id.to_string(), tokens.clone());
        Ok(tokens)
    }

    /// Outcome prices from the listing
    pub async fn get_price(&self, market_id: &str) -> Result<MarketPrice> {
        let market = self.get_market(market_id).await?;
        Ok(parse_outcome_prices(&market).unwrap_or_else(MarketPrice::even))
    }

    /// Open markets ranked by 24h volume, highest first
    pub async fn fetch_top_volume(&self, limit: usize) -> Result<Vec<MarketSummary>> {
        let url = format!("{}/markets", self.base_url);
        let limit = limit.to_string();
        let resp: Vec<Value> = self
            .http
            .get(&url)
            .query(&[
                ("limit", limit.as_str()),
                ("order", "volume24hr"),
                ("ascending", "false"),
                ("active", "true"),
                ("closed", "false"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let markets: Vec<MarketSummary> = resp.iter().filter_map(parse_market_summary).collect();
        debug!("Listing returned {} of {} markets", markets.len(), resp.len());
        Ok(markets)
    }

    pub async fn fetch_market_by_slug(&self, slug: &str) -> Result<Option<String>> {
        self.find_market(&[("slug", slug)]).await
    }

    pub async fn fetch_market_by_condition(&self, condition_id: &str) -> Result<Option<String>> {
        self.find_market(&[("condition_ids", condition_id)]).await
    }

    async fn find_market(&self, query: &[(&str, &str)]) -> Result<Option<String>> {
        let url = format!("{}/markets", self.base_url);
        let resp: Value = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .json()
            .await?;

        let id = first_market_id(&resp);
        debug!("Market lookup {:?} -> {:?}", query, id);
        Ok(id)
    }
}

/// `outcomePrices` arrives as a JSON-encoded string: `"[\"0.55\", \"0.45\"]"`
pub(crate) fn parse_outcome_prices(market: &Value) -> Option<MarketPrice> {
    let prices = decode_string_array(market.get("outcomePrices")?)?;
    let yes = prices.first().and_then(|p| Decimal::from_str(p).ok())?;
    let no = prices
        .get(1)
        .and_then(|p| Decimal::from_str(p).ok())
        .unwrap_or(Decimal::ONE - yes);
    Some(MarketPrice { yes, no })
}

pub(crate) fn parse_market_tokens(market: &Value) -> Option<MarketTokens> {
    let ids = decode_string_array(market.get("clobTokenIds")?)?;
    let yes = ids.first()?.clone();
    let no = ids.get(1).cloned().unwrap_or_else(|| yes.clone());
    let neg_risk = market
        .get("negRisk")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some(MarketTokens { yes, no, neg_risk })
}

/// Listing entry; markets without usable prices are priced at even odds
pub(crate) fn parse_market_summary(market: &Value) -> Option<MarketSummary> {
    let market_id = json_id(market.get("id")?)?;
    let yes_price = parse_outcome_prices(market)
        .unwrap_or_else(MarketPrice::even)
        .yes;

    Some(MarketSummary {
        market_id,
        condition_id: market.get("conditionId").and_then(json_id),
        question: market
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        yes_price,
        volume_24h: market
            .get("volume24hr")
            .and_then(json_decimal)
            .unwrap_or_default(),
    })
}

pub(crate) fn first_market_id(resp: &Value) -> Option<String> {
    resp.as_array()?.first().and_then(|m| json_id(m.get("id")?))
}

/// Accepts either a real JSON array or a string holding one
fn decode_string_array(value: &Value) -> Option<Vec<String>> {
    let array = match value {
        Value::String(s) if !s.is_empty() => serde_json::from_str::<Vec<Value>>(s).ok()?,
        Value::Array(a) => a.clone(),
        _ => return None,
    };
    let items: Vec<String> = array
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
