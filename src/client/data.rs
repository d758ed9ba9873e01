//! Data API client: public trade feed and trader profiles

use super::{json_decimal, json_id};
use crate::error::Result;
use crate::types::{Side, TradeRecord, TraderProfile};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Share of sell notional counted as realised profit when estimating a
/// profile from raw activity
const ACTIVITY_PROFIT_FACTOR: Decimal = dec!(0.1);

#[derive(Clone)]
pub struct DataApiClient {
    http: Client,
    base_url: String,
}

impl DataApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Most recent trades across all markets, newest first
    pub async fn fetch_recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        let url = format!("{}/trades", self.base_url);
        let resp: Vec<Value> = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let total = resp.len();
        let trades: Vec<TradeRecord> = resp.iter().filter_map(parse_trade).collect();
        if trades.len() < total {
            debug!("Dropped {} malformed trades", total - trades.len());
        }
        Ok(trades)
    }

    /// Trader profile, falling back to an estimate from recent activity.
    /// Returns `Ok(None)` when the trader is unknown to both endpoints.
    pub async fn fetch_trader_profile(&self, address: &str) -> Result<Option<TraderProfile>> {
        let url = format!("{}/profile/{}", self.base_url, address);
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body: Value = resp.json().await?;
                if let Some(profile) = parse_profile(address, &body) {
                    return Ok(Some(profile));
                }
            }
            Ok(resp) => debug!("Profile {} returned {}", address, resp.status()),
            Err(e) => debug!("Profile {} request failed: {}", address, e),
        }

        let url = format!("{}/activity", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("user", address), ("limit", "50")])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let activity: Vec<Value> = resp.error_for_status()?.json().await?;
        Ok(profile_from_activity(address, &activity))
    }
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn decimal_field(value: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|k| value.get(*k).and_then(json_decimal))
}

pub(crate) fn parse_trade(value: &Value) -> Option<TradeRecord> {
    let side: Side = value.get("side")?.as_str()?.parse().ok()?;
    let price = decimal_field(value, &["price"])?;
    let size = decimal_field(value, &["size"])?;
    let market_id = value.get("conditionId").and_then(json_id).unwrap_or_default();

    // Undated trades sort as the oldest possible, so any age limit drops them
    let timestamp = value
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Some(TradeRecord {
        market_id,
        side,
        price,
        size,
        trader_address: str_field(value, &["proxyWallet", "user"]).unwrap_or_default(),
        trader_name: str_field(value, &["name", "pseudonym"]),
        title: str_field(value, &["title"]).unwrap_or_default(),
        slug: str_field(value, &["slug"]),
        outcome: str_field(value, &["outcome"]),
        timestamp,
    })
}

pub(crate) fn parse_profile(address: &str, value: &Value) -> Option<TraderProfile> {
    if !value.is_object() {
        return None;
    }
    Some(TraderProfile {
        address: address.to_string(),
        name: str_field(value, &["name", "pseudonym"]),
        profit: decimal_field(value, &["profit", "pnl"]).unwrap_or_default(),
        volume: decimal_field(value, &["volume"]).unwrap_or_default(),
        position_count: value
            .get("positions")
            .or_else(|| value.get("positionCount"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        rank: value.get("rank").and_then(Value::as_u64).unwrap_or(0) as u32,
    })
}

/// Rough profile from recent activity: volume is the summed USDC size of
/// every row and a tenth of trade sell notional is treated as profit.
pub(crate) fn profile_from_activity(address: &str, activity: &[Value]) -> Option<TraderProfile> {
    if activity.is_empty() {
        return None;
    }

    let mut profit = Decimal::ZERO;
    let mut volume = Decimal::ZERO;
    let mut markets = HashSet::new();

    for item in activity {
        volume += decimal_field(item, &["usdcSize"]).unwrap_or_default();
        if let Some(condition) = item.get("conditionId").and_then(json_id) {
            markets.insert(condition);
        }

        let is_trade = item
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case("trade"));
        let is_sell = item
            .get("side")
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("sell"));
        if is_trade && is_sell {
            let price = decimal_field(item, &["price"]).unwrap_or_default();
            let size = decimal_field(item, &["size"]).unwrap_or_default();
            profit += price * size * ACTIVITY_PROFIT_FACTOR;
        }
    }

    Some(TraderProfile {
        address: address.to_string(),
        name: None,
        profit,
        volume,
        position_count: markets.len() as u32,
        rank: 0,
    })
}
