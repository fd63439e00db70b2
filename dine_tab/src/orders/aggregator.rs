//! Order aggregators backed by Postgres or process memory.
#![allow(clippy::needless_raw_string_hashes)]

use super::models::{OrderState, OrderTotals};
use crate::db::timeouts::{DEFAULT_QUERY_TIMEOUT, with_timeout};
use crate::tab::{TabId, TabResult};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;

/// Read contract over orders recorded for a tab
#[async_trait]
pub trait OrderAggregator: Send + Sync {
    /// Totals of all non-cancelled orders on the tab
    async fn orders_for(&self, tab_id: TabId) -> TabResult<OrderTotals>;
}

/// Aggregates the `orders` table owned by the order-management service
pub struct PgOrderAggregator {
    pool: Arc<PgPool>,
    query_timeout: Duration,
}

impl PgOrderAggregator {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

#[async_trait]
impl OrderAggregator for PgOrderAggregator {
    async fn orders_for(&self, tab_id: TabId) -> TabResult<OrderTotals> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                SELECT COUNT(*) AS order_count,
                       COALESCE(SUM(amount), 0) AS total_amount,
                       COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0) AS pending_amount
                FROM orders
                WHERE tab_id = $1 AND status <> 'cancelled'
                "#,
            )
            .bind(tab_id)
            .fetch_one(self.pool.as_ref()),
        )
        .await?;

        let count: i64 = row.try_get("order_count")?;
        Ok(OrderTotals {
            count: u32::try_from(count).unwrap_or(u32::MAX),
            total_amount: row.try_get("total_amount")?,
            pending_amount: row.try_get("pending_amount")?,
        })
    }
}

/// In-memory order ledger for development and tests
#[derive(Default)]
pub struct MemoryOrderLedger {
    totals: RwLock<HashMap<TabId, OrderTotals>>,
}

impl MemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an order against a tab
    pub async fn record(&self, tab_id: TabId, amount: Decimal, state: OrderState) {
        let mut totals = self.totals.write().await;
        totals.entry(tab_id).or_default().add(amount, state);
    }
}

#[async_trait]
impl OrderAggregator for MemoryOrderLedger {
    async fn orders_for(&self, tab_id: TabId) -> TabResult<OrderTotals> {
        let totals = self.totals.read().await;
        Ok(totals.get(&tab_id).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_memory_ledger_sums_orders() {
        let ledger = MemoryOrderLedger::new();
        let tab_id = Uuid::new_v4();

        ledger
            .record(tab_id, Decimal::new(1250, 2), OrderState::Served)
            .await;
        ledger
            .record(tab_id, Decimal::new(800, 2), OrderState::Pending)
            .await;

        let totals = ledger.orders_for(tab_id).await.unwrap();
        assert_eq!(totals.count, 2);
        assert_eq!(totals.total_amount, Decimal::new(2050, 2));
        assert_eq!(totals.pending_amount, Decimal::new(800, 2));
    }

    #[tokio::test]
    async fn test_unknown_tab_has_no_orders() {
        let ledger = MemoryOrderLedger::new();
        let totals = ledger.orders_for(Uuid::new_v4()).await.unwrap();
        assert_eq!(totals, OrderTotals::default());
    }
}
