//! Read-only view of the orders placed against a tab.
//!
//! Orders are written by the order-management service; this crate only needs
//! their count and amounts for table status and to freeze the amount due when
//! a payment starts.

pub mod aggregator;
pub mod models;

pub use aggregator::{MemoryOrderLedger, OrderAggregator, PgOrderAggregator};
pub use models::{OrderState, OrderTotals};
