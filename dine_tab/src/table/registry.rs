//! Read-through registry over restaurant tables.

use super::models::{Table, TableOccupancy, TableState};
use crate::db::TabRepository;
use crate::tab::{TabError, TabResult};
use std::sync::Arc;

/// Table registry
#[derive(Clone)]
pub struct TableRegistry {
    repo: Arc<dyn TabRepository>,
}

impl TableRegistry {
    pub fn new(repo: Arc<dyn TabRepository>) -> Self {
        Self { repo }
    }

    /// Look up a table, `None` if the restaurant never registered it
    pub async fn get_table(
        &self,
        restaurant_id: &str,
        table_id: &str,
    ) -> TabResult<Option<Table>> {
        self.repo.find_table(restaurant_id, table_id).await
    }

    /// Capacity to open a tab with
    ///
    /// A registered table's own capacity wins over the requested one; the
    /// request only decides for tables the registry doesn't know.
    pub async fn resolve_capacity(
        &self,
        restaurant_id: &str,
        table_id: &str,
        requested: Option<u32>,
    ) -> TabResult<u32> {
        match self.get_table(restaurant_id, table_id).await? {
            Some(table) => {
                if let Some(requested) = requested.filter(|r| *r != table.max_capacity) {
                    log::debug!(
                        "Ignoring requested capacity {} for {}/{}; registered capacity is {}",
                        requested,
                        restaurant_id,
                        table_id,
                        table.max_capacity
                    );
                }
                Ok(table.max_capacity)
            }
            None => requested.ok_or_else(|| TabError::TableNotFound {
                restaurant_id: restaurant_id.to_string(),
                table_id: table_id.to_string(),
            }),
        }
    }

    /// Occupancy of every table in a restaurant
    pub async fn occupancy(&self, restaurant_id: &str) -> TabResult<Vec<TableOccupancy>> {
        let tables = self.repo.list_tables(restaurant_id).await?;
        let mut rows = Vec::with_capacity(tables.len());

        for table in tables {
            let open_tab = self.repo.find_open_tab(restaurant_id, &table.table_id).await?;
            rows.push(TableOccupancy {
                state: if open_tab.is_some() {
                    TableState::Occupied
                } else {
                    table.state
                },
                open_tab_id: open_tab.as_ref().map(|t| t.id),
                occupied_seats: open_tab.map(|t| t.occupied_seats).unwrap_or(0),
                table_id: table.table_id,
                max_capacity: table.max_capacity,
            });
        }

        Ok(rows)
    }
}
