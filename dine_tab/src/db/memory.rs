//! Process-local tab store.
//!
//! Mirrors the Postgres semantics: reads return snapshots, and a commit only
//! lands if the tab's version is unchanged since it was loaded. Useful for
//! local development and tests; data is lost on restart.

use super::repository::{CommitOutcome, TabRepository};
use crate::tab::{Participant, Tab, TabError, TabId, TabResult};
use crate::table::{Table, TableState};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type TableKey = (String, String);

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<TableKey, Table>,
    tabs: HashMap<TabId, Tab>,
    participants: HashMap<TabId, Vec<Participant>>,
    /// Open tab per table
    open_tabs: HashMap<TableKey, TabId>,
}

/// In-memory implementation of [`TabRepository`]
#[derive(Default)]
pub struct MemoryTabRepository {
    state: RwLock<MemoryState>,
}

impl MemoryTabRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with pre-registered tables
    pub fn with_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        let state = MemoryState {
            tables: tables
                .into_iter()
                .map(|t| ((t.restaurant_id.clone(), t.table_id.clone()), t))
                .collect(),
            ..MemoryState::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Register or replace a table
    pub async fn upsert_table(&self, table: Table) {
        let mut state = self.state.write().await;
        state
            .tables
            .insert((table.restaurant_id.clone(), table.table_id.clone()), table);
    }

    /// Number of tabs ever stored, open or closed
    pub async fn tab_count(&self) -> usize {
        self.state.read().await.tabs.len()
    }
}

fn key(restaurant_id: &str, table_id: &str) -> TableKey {
    (restaurant_id.to_string(), table_id.to_string())
}

#[async_trait]
impl TabRepository for MemoryTabRepository {
    async fn find_table(&self, restaurant_id: &str, table_id: &str) -> TabResult<Option<Table>> {
        let state = self.state.read().await;
        Ok(state.tables.get(&key(restaurant_id, table_id)).cloned())
    }

    async fn list_tables(&self, restaurant_id: &str) -> TabResult<Vec<Table>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .values()
            .filter(|t| t.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }

    async fn find_open_tab(&self, restaurant_id: &str, table_id: &str) -> TabResult<Option<Tab>> {
        let state = self.state.read().await;
        Ok(state
            .open_tabs
            .get(&key(restaurant_id, table_id))
            .and_then(|id| state.tabs.get(id))
            .cloned())
    }

    async fn load_tab(&self, tab_id: TabId) -> TabResult<Option<Tab>> {
        let state = self.state.read().await;
        Ok(state.tabs.get(&tab_id).cloned())
    }

    async fn participants(&self, tab_id: TabId) -> TabResult<Vec<Participant>> {
        let state = self.state.read().await;
        Ok(state.participants.get(&tab_id).cloned().unwrap_or_default())
    }

    async fn insert_tab(&self, tab: &Tab, founder: &Participant) -> TabResult<()> {
        let mut state = self.state.write().await;
        let table_key = key(&tab.restaurant_id, &tab.table_id);

        if state.open_tabs.contains_key(&table_key) {
            return Err(TabError::TableAlreadyOccupied {
                restaurant_id: tab.restaurant_id.clone(),
                table_id: tab.table_id.clone(),
            });
        }

        state.open_tabs.insert(table_key.clone(), tab.id);
        state.tabs.insert(tab.id, tab.clone());
        state.participants.insert(tab.id, vec![founder.clone()]);
        if let Some(table) = state.tables.get_mut(&table_key) {
            table.state = TableState::Occupied;
        }
        Ok(())
    }

    async fn commit_tab(&self, tab: &Tab, joined: &[Participant]) -> TabResult<CommitOutcome> {
        let mut state = self.state.write().await;

        let stored_version = match state.tabs.get(&tab.id) {
            Some(stored) => stored.version,
            None => return Err(TabError::TabNotFound(tab.id)),
        };
        if stored_version != tab.version {
            return Ok(CommitOutcome::Conflict);
        }

        let mut committed = tab.clone();
        committed.version += 1;
        state.tabs.insert(tab.id, committed);
        state
            .participants
            .entry(tab.id)
            .or_default()
            .extend_from_slice(joined);

        if tab.status.is_terminal() {
            let table_key = key(&tab.restaurant_id, &tab.table_id);
            if state.open_tabs.get(&table_key) == Some(&tab.id) {
                state.open_tabs.remove(&table_key);
            }
            if let Some(table) = state.tables.get_mut(&table_key) {
                table.state = TableState::Available;
            }
        }

        Ok(CommitOutcome::Committed)
    }

    async fn ping(&self) -> TabResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::CreateTab;
    use chrono::Utc;

    fn new_tab(table_id: &str) -> (Tab, Participant) {
        Tab::open(&CreateTab::new("bistro", table_id, 4, "Ana"), 4, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_second_open_tab_is_rejected() {
        let repo = MemoryTabRepository::with_tables(vec![Table::new("bistro", "T1", 4)]);
        let (first, founder) = new_tab("T1");
        repo.insert_tab(&first, &founder).await.unwrap();

        let table = repo.find_table("bistro", "T1").await.unwrap().unwrap();
        assert_eq!(table.state, TableState::Occupied);

        let (second, founder) = new_tab("T1");
        assert!(matches!(
            repo.insert_tab(&second, &founder).await,
            Err(TabError::TableAlreadyOccupied { .. })
        ));
        assert_eq!(repo.tab_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let repo = MemoryTabRepository::new();
        let (tab, founder) = new_tab("T2");
        repo.insert_tab(&tab, &founder).await.unwrap();

        let mut a = repo.load_tab(tab.id).await.unwrap().unwrap();
        let mut b = a.clone();

        let guest = a.admit(Some("Ben"), Utc::now()).unwrap();
        assert_eq!(
            repo.commit_tab(&a, &[guest]).await.unwrap(),
            CommitOutcome::Committed
        );

        let guest = b.admit(Some("Cy"), Utc::now()).unwrap();
        assert_eq!(
            repo.commit_tab(&b, &[guest]).await.unwrap(),
            CommitOutcome::Conflict
        );

        let stored = repo.load_tab(tab.id).await.unwrap().unwrap();
        assert_eq!(stored.occupied_seats, 2);
        assert_eq!(stored.version, 1);
        assert_eq!(repo.participants(tab.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_commit_frees_table() {
        let repo = MemoryTabRepository::with_tables(vec![Table::new("bistro", "T3", 4)]);
        let (tab, founder) = new_tab("T3");
        repo.insert_tab(&tab, &founder).await.unwrap();

        let mut closing = repo.load_tab(tab.id).await.unwrap().unwrap();
        closing.cancel(Utc::now()).unwrap();
        repo.commit_tab(&closing, &[]).await.unwrap();

        assert!(repo.find_open_tab("bistro", "T3").await.unwrap().is_none());
        let table = repo.find_table("bistro", "T3").await.unwrap().unwrap();
        assert_eq!(table.state, TableState::Available);

        let (next, founder) = new_tab("T3");
        repo.insert_tab(&next, &founder).await.unwrap();
    }
}
