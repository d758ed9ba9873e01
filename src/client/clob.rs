//! CLOB (Central Limit Order Book) API client
//!
//! Handles the order book, signed order placement and cancellation.

use crate::client::auth::{l2_signature, ApiCredentials, OrderSignData, PolySigner};
use crate::client::json_decimal;
use crate::error::{BotError, Result};
use crate::types::{BestPrices, OrderAck, OrderStatusKind, OrderType, Side};
use ethers::types::{Address, U256};
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Token amounts on the exchange carry six decimals
const AMOUNT_SCALE: Decimal = dec!(1000000);

/// CLOB API client for trading operations
#[derive(Clone)]
pub struct ClobClient {
    pub http: Client,
    base_url: String,
    signer: Option<PolySigner>,
    funder: Option<String>,
    signature_type: u8,
    credentials: Arc<RwLock<Option<ApiCredentials>>>,
}

#[derive(Debug, Deserialize)]
struct ApiKeyResponse {
    #[serde(rename = "apiKey")]
    api_key: String,
    secret: String,
    passphrase: String,
}

impl ClobClient {
    /// Create a new CLOB client. Without a signer only public endpoints work.
    pub fn new(
        base_url: &str,
        signer: Option<PolySigner>,
        funder: Option<String>,
        signature_type: u8,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            funder,
            signature_type,
            credentials: Arc::new(RwLock::new(None)),
        })
    }

    fn signer(&self) -> Result<&PolySigner> {
        self.signer
            .as_ref()
            .ok_or_else(|| BotError::Auth("No private key configured".into()))
    }

    /// Derive (or create) API credentials. Call once before trading.
    pub async fn initialize(&self) -> Result<()> {
        let creds = match self.l1_request(Method::GET, "/auth/derive-api-key").await {
            Ok(creds) => creds,
            Err(e) => {
                debug!("Deriving API key failed ({}), creating a new one", e);
                self.l1_request(Method::POST, "/auth/api-key").await?
            }
        };

        *self.credentials.write().await = Some(creds);
        info!("🔑 CLOB API credentials ready");
        Ok(())
    }

    async fn l1_request(&self, method: Method, path: &str) -> Result<ApiCredentials> {
        let signer = self.signer()?;
        let timestamp = chrono::Utc::now().timestamp();
        let nonce = 0u64;
        let signature = signer.sign_clob_auth(timestamp, nonce)?;

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .request(method, &url)
            .header("POLY_ADDRESS", signer.address_hex())
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", timestamp.to_string())
            .header("POLY_NONCE", nonce.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::Auth(format!(
                "{} returned {}",
                path,
                resp.status()
            )));
        }

        let key: ApiKeyResponse = resp.json().await?;
        Ok(ApiCredentials {
            api_key: key.api_key,
            api_secret: key.secret,
            api_passphrase: key.passphrase,
        })
    }

    /// Attach Level 2 headers to a request
    async fn authed(&self, method: Method, path: &str, body: &str) -> Result<RequestBuilder> {
        let signer = self.signer()?;
        let creds = self.credentials.read().await;
        let creds = creds
            .as_ref()
            .ok_or_else(|| BotError::Auth("Not authenticated".into()))?;

        let timestamp = chrono::Utc::now().timestamp();
        let signature = l2_signature(
            &creds.api_secret,
            timestamp,
            method.as_str(),
            path,
            body,
        )?;

        let url = format!("{}{}", self.base_url, path);
        Ok(self
            .http
            .request(method, &url)
            .header("POLY_ADDRESS", signer.address_hex())
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", timestamp.to_string())
            .header("POLY_API_KEY", &creds.api_key)
            .header("POLY_PASSPHRASE", &creds.api_passphrase))
    }

    /// Get order book for a token
    pub async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
        let url = format!("{}/book", self.base_url);
        let resp: Value = self
            .http
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?
            .json()
            .await?;

        Ok(OrderBook::from_json(&resp))
    }

    /// Sign and submit a GTC limit order
    pub async fn place_order(
        &self,
        token_id: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
        neg_risk: bool,
    ) -> Result<OrderAck> {
        let signer = self.signer()?;
        let owner = {
            let creds = self.credentials.read().await;
            creds
                .as_ref()
                .map(|c| c.api_key.clone())
                .ok_or_else(|| BotError::Auth("Not authenticated".into()))?
        };

        let maker = match &self.funder {
            Some(funder) => funder
                .parse::<Address>()
                .map_err(|e| BotError::Config(format!("Invalid funder address: {}", e)))?,
            None => signer.address(),
        };

        let (maker_amount, taker_amount) = order_amounts(side, price, size);
        let order = OrderSignData {
            salt: U256::from(rand::random::<u64>()),
            maker,
            signer: signer.address(),
            taker: Address::zero(),
            token_id: U256::from_dec_str(token_id)
                .map_err(|e| BotError::InvalidInstruction(format!("Bad token id: {}", e)))?,
            maker_amount: to_u256(maker_amount)?,
            taker_amount: to_u256(taker_amount)?,
            expiration: U256::zero(),
            nonce: U256::zero(),
            fee_rate_bps: U256::zero(),
            side: match side {
                Side::Buy => 0,
                Side::Sell => 1,
            },
            signature_type: self.signature_type,
        };
        let signature = signer.sign_order(&order, neg_risk)?;

        let body = json!({
            "order": {
                "salt": order.salt.as_u64(),
                "maker": format!("{:?}", order.maker),
                "signer": format!("{:?}", order.signer),
                "taker": format!("{:?}", order.taker),
                "tokenId": token_id,
                "makerAmount": order.maker_amount.to_string(),
                "takerAmount": order.taker_amount.to_string(),
                "expiration": "0",
                "nonce": "0",
                "feeRateBps": "0",
                "side": side.to_string(),
                "signatureType": self.signature_type,
                "signature": signature,
            },
            "owner": owner,
            "orderType": OrderType::GTC.to_string(),
        })
        .to_string();

        let resp = self
            .authed(Method::POST, "/order", &body)
            .await?
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let payload: Value = resp.json().await.unwrap_or(Value::Null);
        let ack = parse_order_response(&payload);

        if !status.is_success() && ack.status.is_accepted() {
            warn!("Order endpoint returned {} with accepted body", status);
        }
        Ok(ack)
    }

    /// Cancel an order
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let body = json!({ "orderID": order_id }).to_string();
        let resp = self
            .authed(Method::DELETE, "/order", &body)
            .await?
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::Api(format!(
                "Cancel {} failed: {}",
                order_id,
                resp.status()
            )));
        }
        Ok(())
    }

    /// Cancel every open order for this account
    pub async fn cancel_all(&self) -> Result<()> {
        let resp = self
            .authed(Method::DELETE, "/cancel-all", "")
            .await?
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::Api(format!("Cancel all failed: {}", resp.status())));
        }
        Ok(())
    }
}

/// Raw maker/taker amounts: a buy gives USDC for shares, a sell the reverse
pub(crate) fn order_amounts(side: Side, price: Decimal, size: Decimal) -> (Decimal, Decimal) {
    let shares = (size * AMOUNT_SCALE).trunc();
    let usdc = (price * size * AMOUNT_SCALE).trunc();
    match side {
        Side::Buy => (usdc, shares),
        Side::Sell => (shares, usdc),
    }
}

fn to_u256(value: Decimal) -> Result<U256> {
    U256::from_dec_str(&value.trunc().to_string())
        .map_err(|e| BotError::Internal(format!("Amount {} out of range: {}", value, e)))
}

/// Interpret the `/order` response body
pub(crate) fn parse_order_response(payload: &Value) -> OrderAck {
    let error_msg = payload
        .get("errorMsg")
        .or_else(|| payload.get("error"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let success = payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(error_msg.is_none());

    if !success {
        return OrderAck::rejected(error_msg.unwrap_or("order not accepted"));
    }

    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .map(OrderStatusKind::from_venue)
        .unwrap_or(OrderStatusKind::Error);
    let order_id = payload
        .get("orderID")
        .or_else(|| payload.get("orderId"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    match status {
        OrderStatusKind::Matched | OrderStatusKind::Live => OrderAck::accepted(status, order_id),
        _ => OrderAck {
            status,
            order_id: Some(order_id.to_string()).filter(|s| !s.is_empty()),
            message: error_msg.map(str::to_string),
        },
    }
}

/// Order book data
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

/// Single level in order book
#[derive(Debug, Clone)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl OrderBook {
    pub(crate) fn from_json(resp: &Value) -> Self {
        let parse_levels = |arr: &Value| -> Vec<OrderBookLevel> {
            arr.as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|l| {
                            Some(OrderBookLevel {
                                price: json_decimal(l.get("price")?)?,
                                size: json_decimal(l.get("size")?)?,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            bids: parse_levels(&resp["bids"]),
            asks: parse_levels(&resp["asks"]),
        }
    }

    /// Highest bid. Levels are not assumed to be sorted.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    /// Lowest ask
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }

    /// Get spread
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    /// Top of book; an empty side reads as 0 (bids) or 1 (asks)
    pub fn best_prices(&self) -> BestPrices {
        BestPrices::new(
            self.best_bid().unwrap_or(Decimal::ZERO),
            self.best_ask().unwrap_or(Decimal::ONE),
        )
    }
}
