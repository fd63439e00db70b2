//! Order aggregate models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Count and amounts of the orders on one tab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub count: u32,
    pub total_amount: Decimal,
    /// Amount of orders not yet served or confirmed
    pub pending_amount: Decimal,
}

/// Order state as far as the totals are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Pending,
    Served,
}

impl OrderTotals {
    /// Fold one order into the totals
    pub fn add(&mut self, amount: Decimal, state: OrderState) {
        self.count += 1;
        self.total_amount += amount;
        if state == OrderState::Pending {
            self.pending_amount += amount;
        }
    }
}
