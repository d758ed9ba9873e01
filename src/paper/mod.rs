//! Dry-run order gateway
//!
//! Accepts every order as matched without touching the venue, so a round
//! runs end to end against live prices with no money at stake. Orders can
//! optionally be appended to a JSONL audit file.

use crate::client::OrderGateway;
use crate::error::Result;
use crate::types::{OrderAck, OrderStatusKind, Side};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// An order accepted by the dry-run gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperOrder {
    pub order_id: String,
    pub market_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct PaperGateway {
    orders: Mutex<Vec<PaperOrder>>,
    audit_file: Option<PathBuf>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_file = Some(path.into());
        self
    }

    async fn audit(&self, order: &PaperOrder) {
        let Some(path) = &self.audit_file else {
            return;
        };

        let line = match serde_json::to_string(order) {
            Ok(json) => json + "\n",
            Err(e) => {
                warn!("Failed to serialize paper order: {}", e);
                return;
            }
        };

        let written = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;

        if let Err(e) = written {
            warn!("Failed to write audit log {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn place_order(
        &self,
        market_id: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<OrderAck> {
        let order = PaperOrder {
            order_id: format!("paper-{}", uuid::Uuid::new_v4()),
            market_id: market_id.to_string(),
            side,
            price,
            size,
            timestamp: Utc::now(),
        };

        info!(
            "📝 [DRY RUN] {} {} {} @ {}",
            side, size, market_id, price
        );
        self.audit(&order).await;

        let ack = OrderAck::accepted(OrderStatusKind::Matched, order.order_id.clone());
        self.orders.lock().push(order);
        Ok(ack)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.orders.lock().retain(|o| o.order_id != order_id);
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<()> {
        let cancelled = {
            let mut orders = self.orders.lock();
            let n = orders.len();
            orders.clear();
            n
        };
        info!("📝 [DRY RUN] Cancelled {} order(s)", cancelled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_orders_always_match() {
        let gateway = PaperGateway::new();
        let ack = gateway
            .place_order("512", Side::Buy, dec!(0.5), dec!(10))
            .await
            .unwrap();

        assert_eq!(ack.status, OrderStatusKind::Matched);
        assert!(ack.order_id.unwrap().starts_with("paper-"));
        let orders = gateway.orders.lock();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].price * orders[0].size, dec!(5));
    }

    #[tokio::test]
    async fn test_cancel() {
        let gateway = PaperGateway::new();
        let first = gateway
            .place_order("a", Side::Buy, dec!(0.5), dec!(10))
            .await
            .unwrap();
        gateway
            .place_order("b", Side::Sell, dec!(0.6), dec!(10))
            .await
            .unwrap();

        gateway
            .cancel_order(first.order_id.as_deref().unwrap())
            .await
            .unwrap();
        {
            let orders = gateway.orders.lock();
            assert_eq!(orders.len(), 1);
            assert_eq!(orders[0].market_id, "b");
        }

        gateway.cancel_all_orders().await.unwrap();
        assert!(gateway.orders.lock().is_empty());
    }

    #[tokio::test]
    async fn test_audit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.jsonl");
        let gateway = PaperGateway::new().with_audit_file(&path);

        gateway
            .place_order("a", Side::Buy, dec!(0.5), dec!(10))
            .await
            .unwrap();
        gateway
            .place_order("b", Side::Buy, dec!(0.4), dec!(5))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let order: PaperOrder = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(order.market_id, "b");
        assert_eq!(order.size, dec!(5));
    }
}
