//! Table models.

use crate::tab::TabId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coarse table state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableState {
    Available,
    Occupied,
}

impl std::fmt::Display for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableState::Available => write!(f, "available"),
            TableState::Occupied => write!(f, "occupied"),
        }
    }
}

impl FromStr for TableState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TableState::Available),
            "occupied" => Ok(TableState::Occupied),
            other => Err(format!("unknown table state: {other}")),
        }
    }
}

/// Table model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub restaurant_id: String,
    pub table_id: String,
    pub max_capacity: u32,
    pub state: TableState,
}

impl Table {
    pub fn new(
        restaurant_id: impl Into<String>,
        table_id: impl Into<String>,
        max_capacity: u32,
    ) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            table_id: table_id.into(),
            max_capacity,
            state: TableState::Available,
        }
    }
}

/// One row of the dashboard occupancy listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOccupancy {
    pub table_id: String,
    pub max_capacity: u32,
    pub state: TableState,
    pub open_tab_id: Option<TabId>,
    pub occupied_seats: u32,
}
