//! PostgreSQL implementation of the tab store.
#![allow(clippy::needless_raw_string_hashes)]

use super::repository::{CommitOutcome, TabRepository};
use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout};
use crate::security::TabToken;
use crate::tab::{Participant, Tab, TabError, TabId, TabResult, TabStatus};
use crate::table::{Table, TableState};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::sync::Arc;
use std::time::Duration;

const TAB_COLUMNS: &str = "id, restaurant_id, table_id, capacity, occupied_seats, available_seats, \
     status, token, total_amount, pending_amount, payment_method, payment_initiated_at, \
     payment_failed_reason, payment_failed_at, created_at, last_modified_at, closed_at, version";

const OPEN_TAB_INDEX: &str = "tabs_one_open_per_table";

/// Postgres-backed [`TabRepository`]
///
/// Write transactions are bounded on the server (`statement_timeout` and
/// `idle_in_transaction_session_timeout`), never by dropping the future on the
/// client. A bound that expires makes Postgres roll back, so
/// [`TabError::Timeout`] always means nothing was written.
#[derive(Clone)]
pub struct PgTabRepository {
    pool: Arc<PgPool>,
    transaction_timeout: Duration,
}

impl PgTabRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    /// Override the server-side bound on write transactions
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Begin a write transaction that Postgres aborts once the bound expires
    async fn begin_bounded(&self) -> TabResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        let setting = timeout_setting(self.transaction_timeout);
        sqlx::query(
            "SELECT set_config('statement_timeout', $1, true), \
                    set_config('idle_in_transaction_session_timeout', $1, true)",
        )
        .bind(&setting)
        .execute(&mut *tx)
        .await?;
        Ok(tx)
    }

    /// Register or update a restaurant table
    pub async fn upsert_table(&self, table: &Table) -> TabResult<()> {
        sqlx::query(
            r#"
            INSERT INTO restaurant_tables (restaurant_id, table_id, max_capacity, state)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (restaurant_id, table_id)
            DO UPDATE SET max_capacity = EXCLUDED.max_capacity
            "#,
        )
        .bind(&table.restaurant_id)
        .bind(&table.table_id)
        .bind(seats_to_db(table.max_capacity)?)
        .bind(table.state.to_string())
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn insert_tab_tx(&self, tab: &Tab, founder: &Participant) -> TabResult<()> {
        let mut tx = self.begin_bounded().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tabs (id, restaurant_id, table_id, capacity, occupied_seats,
                              available_seats, status, token, total_amount, pending_amount,
                              created_at, last_modified_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tab.id)
        .bind(&tab.restaurant_id)
        .bind(&tab.table_id)
        .bind(seats_to_db(tab.capacity)?)
        .bind(seats_to_db(tab.occupied_seats)?)
        .bind(seats_to_db(tab.available_seats)?)
        .bind(tab.status.as_str())
        .bind(tab.token.as_str())
        .bind(tab.total_amount)
        .bind(tab.pending_amount)
        .bind(tab.created_at)
        .bind(tab.last_modified_at)
        .bind(tab.version)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_violation_of(&e, OPEN_TAB_INDEX) {
                return Err(TabError::TableAlreadyOccupied {
                    restaurant_id: tab.restaurant_id.clone(),
                    table_id: tab.table_id.clone(),
                });
            }
            return Err(e.into());
        }

        insert_participants(&mut tx, tab.id, std::slice::from_ref(founder)).await?;
        set_table_state(&mut tx, tab, TableState::Occupied).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn commit_tab_tx(&self, tab: &Tab, joined: &[Participant]) -> TabResult<CommitOutcome> {
        let mut tx = self.begin_bounded().await?;

        // Compare-and-swap on version. A concurrent writer holding the row
        // makes this wait, then re-check the predicate against its result.
        let updated = sqlx::query(
            r#"
            UPDATE tabs
            SET occupied_seats = $1,
                available_seats = $2,
                status = $3,
                total_amount = $4,
                pending_amount = $5,
                payment_method = $6,
                payment_initiated_at = $7,
                payment_failed_reason = $8,
                payment_failed_at = $9,
                last_modified_at = $10,
                closed_at = $11,
                version = version + 1
            WHERE id = $12 AND version = $13
            "#,
        )
        .bind(seats_to_db(tab.occupied_seats)?)
        .bind(seats_to_db(tab.available_seats)?)
        .bind(tab.status.as_str())
        .bind(tab.total_amount)
        .bind(tab.pending_amount)
        .bind(&tab.payment_method)
        .bind(tab.payment_initiated_at)
        .bind(&tab.payment_failed_reason)
        .bind(tab.payment_failed_at)
        .bind(tab.last_modified_at)
        .bind(tab.closed_at)
        .bind(tab.id)
        .bind(tab.version)
        .execute(&mut *tx)
        .await;

        let rows = match updated {
            Ok(result) => result.rows_affected(),
            Err(e) if is_serialization_failure(&e) => return Ok(CommitOutcome::Conflict),
            Err(e) => return Err(e.into()),
        };

        if rows == 0 {
            let exists = sqlx::query("SELECT 1 FROM tabs WHERE id = $1")
                .bind(tab.id)
                .fetch_optional(&mut *tx)
                .await?;
            return match exists {
                Some(_) => Ok(CommitOutcome::Conflict),
                None => Err(TabError::TabNotFound(tab.id)),
            };
        }

        insert_participants(&mut tx, tab.id, joined).await?;
        if tab.status.is_terminal() {
            set_table_state(&mut tx, tab, TableState::Available).await?;
        }

        match tx.commit().await {
            Ok(()) => Ok(CommitOutcome::Committed),
            Err(e) if is_serialization_failure(&e) => Ok(CommitOutcome::Conflict),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TabRepository for PgTabRepository {
    async fn find_table(&self, restaurant_id: &str, table_id: &str) -> TabResult<Option<Table>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT restaurant_id, table_id, max_capacity, state
                FROM restaurant_tables
                WHERE restaurant_id = $1 AND table_id = $2
                "#,
            )
            .bind(restaurant_id)
            .bind(table_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(table_from_row).transpose()
    }

    async fn list_tables(&self, restaurant_id: &str) -> TabResult<Vec<Table>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT restaurant_id, table_id, max_capacity, state
                FROM restaurant_tables
                WHERE restaurant_id = $1
                ORDER BY table_id ASC
                "#,
            )
            .bind(restaurant_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(table_from_row).collect()
    }

    async fn find_open_tab(&self, restaurant_id: &str, table_id: &str) -> TabResult<Option<Tab>> {
        let sql = format!(
            "SELECT {TAB_COLUMNS} FROM tabs \
             WHERE restaurant_id = $1 AND table_id = $2 AND status IN ('active', 'payment_locked')"
        );
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(restaurant_id)
                .bind(table_id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(tab_from_row).transpose()
    }

    async fn load_tab(&self, tab_id: TabId) -> TabResult<Option<Tab>> {
        let sql = format!("SELECT {TAB_COLUMNS} FROM tabs WHERE id = $1");
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(tab_id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(tab_from_row).transpose()
    }

    async fn participants(&self, tab_id: TabId) -> TabResult<Vec<Participant>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT name, seats, joined_at
                FROM tab_participants
                WHERE tab_id = $1
                ORDER BY id ASC
                "#,
            )
            .bind(tab_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter()
            .map(|r| -> TabResult<Participant> {
                Ok(Participant {
                    name: r.try_get("name")?,
                    seats: seats_from_db(r, "seats")?,
                    joined_at: r.try_get("joined_at")?,
                })
            })
            .collect()
    }

    async fn insert_tab(&self, tab: &Tab, founder: &Participant) -> TabResult<()> {
        self.insert_tab_tx(tab, founder).await
    }

    async fn commit_tab(&self, tab: &Tab, joined: &[Participant]) -> TabResult<CommitOutcome> {
        self.commit_tab_tx(tab, joined).await
    }

    async fn ping(&self) -> TabResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(self.pool.as_ref())).await?;
        Ok(())
    }
}

async fn insert_participants(
    tx: &mut Transaction<'_, Postgres>,
    tab_id: TabId,
    participants: &[Participant],
) -> TabResult<()> {
    for participant in participants {
        sqlx::query(
            "INSERT INTO tab_participants (tab_id, name, seats, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(tab_id)
        .bind(&participant.name)
        .bind(seats_to_db(participant.seats)?)
        .bind(participant.joined_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn set_table_state(
    tx: &mut Transaction<'_, Postgres>,
    tab: &Tab,
    state: TableState,
) -> TabResult<()> {
    sqlx::query(
        "UPDATE restaurant_tables SET state = $1 WHERE restaurant_id = $2 AND table_id = $3",
    )
    .bind(state.to_string())
    .bind(&tab.restaurant_id)
    .bind(&tab.table_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn tab_from_row(row: &PgRow) -> TabResult<Tab> {
    let status: String = row.try_get("status")?;
    Ok(Tab {
        id: row.try_get("id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        table_id: row.try_get("table_id")?,
        capacity: seats_from_db(row, "capacity")?,
        occupied_seats: seats_from_db(row, "occupied_seats")?,
        available_seats: seats_from_db(row, "available_seats")?,
        status: status
            .parse::<TabStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        token: TabToken::from_stored(row.try_get("token")?),
        total_amount: row.try_get("total_amount")?,
        pending_amount: row.try_get("pending_amount")?,
        payment_method: row.try_get("payment_method")?,
        payment_initiated_at: row.try_get("payment_initiated_at")?,
        payment_failed_reason: row.try_get("payment_failed_reason")?,
        payment_failed_at: row.try_get("payment_failed_at")?,
        created_at: row.try_get("created_at")?,
        last_modified_at: row.try_get("last_modified_at")?,
        closed_at: row.try_get("closed_at")?,
        version: row.try_get("version")?,
    })
}

fn table_from_row(row: &PgRow) -> TabResult<Table> {
    let state: String = row.try_get("state")?;
    Ok(Table {
        restaurant_id: row.try_get("restaurant_id")?,
        table_id: row.try_get("table_id")?,
        max_capacity: seats_from_db(row, "max_capacity")?,
        state: state
            .parse::<TableState>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
    })
}

fn seats_from_db(row: &PgRow, column: &str) -> TabResult<u32> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| TabError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn seats_to_db(value: u32) -> TabResult<i32> {
    i32::try_from(value)
        .map_err(|_| TabError::InvalidRequest(format!("seat count {value} too large")))
}

/// Postgres setting value for a timeout, in whole milliseconds (at least 1)
fn timeout_setting(timeout: Duration) -> String {
    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
    format!("{millis}ms")
}

/// `40001` serialization_failure or `40P01` deadlock_detected
fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001" | "40P01")),
        _ => false,
    }
}

fn is_violation_of(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}
