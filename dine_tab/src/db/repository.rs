//! Store trait shared by the Postgres and in-memory backends.

use async_trait::async_trait;

use crate::tab::{Participant, Tab, TabId, TabResult};
use crate::table::Table;

/// Result of an optimistic commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Written; the tab's version advanced by one
    Committed,
    /// Someone else committed first (or the store could not serialize); reload and retry
    Conflict,
}

/// Trait for tab store operations
///
/// Every write is a single atomic transaction. Implementations must give
/// `commit_tab` compare-and-swap semantics on [`Tab::version`], so a capacity
/// check made on a loaded snapshot is only committed if that snapshot is
/// still current.
#[async_trait]
pub trait TabRepository: Send + Sync {
    /// Find a registered table
    async fn find_table(&self, restaurant_id: &str, table_id: &str) -> TabResult<Option<Table>>;

    /// All registered tables of a restaurant, ordered by table id
    async fn list_tables(&self, restaurant_id: &str) -> TabResult<Vec<Table>>;

    /// The active or payment-locked tab on a table, if any
    async fn find_open_tab(&self, restaurant_id: &str, table_id: &str) -> TabResult<Option<Tab>>;

    /// Load a tab snapshot including its version
    async fn load_tab(&self, tab_id: TabId) -> TabResult<Option<Tab>>;

    /// Participants of a tab in join order
    async fn participants(&self, tab_id: TabId) -> TabResult<Vec<Participant>>;

    /// Insert a new tab with its founding participant
    ///
    /// Fails with `TabError::TableAlreadyOccupied` if the table already has an
    /// open tab. Marks a registered table occupied in the same transaction.
    async fn insert_tab(&self, tab: &Tab, founder: &Participant) -> TabResult<()>;

    /// Write `tab` if the stored version still equals `tab.version`
    ///
    /// `joined` participants are appended in the same transaction. A terminal
    /// status frees the table.
    async fn commit_tab(&self, tab: &Tab, joined: &[Participant]) -> TabResult<CommitOutcome>;

    /// Cheap liveness check
    async fn ping(&self) -> TabResult<()>;
}
