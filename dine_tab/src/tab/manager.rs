//! Tab manager: opening tabs, admitting guests and reporting table status.

use super::{
    errors::{TabError, TabResult},
    models::{CreateTab, OpenedTab, Tab, TabDetails, TabId, TabSummary, TableStatus},
    retry::RetryPolicy,
    transaction::{Mutation, run_tab_transaction},
};
use crate::db::TabRepository;
use crate::orders::OrderAggregator;
use crate::security::token::{RepositoryTokenValidator, TokenValidator, require_token};
use crate::table::TableRegistry;
use chrono::Utc;
use std::sync::Arc;

/// Tab manager
///
/// Cheap to clone; holds only shared handles. Keeps no state of its own, so
/// any number of instances across processes can serve the same tabs.
#[derive(Clone)]
pub struct TabManager {
    repo: Arc<dyn TabRepository>,
    tokens: Arc<dyn TokenValidator>,
    orders: Arc<dyn OrderAggregator>,
    registry: TableRegistry,
    retry: RetryPolicy,
}

impl TabManager {
    /// Create a new tab manager
    ///
    /// # Arguments
    ///
    /// * `repo` - Tab store
    /// * `tokens` - Capability token validator
    /// * `orders` - Order totals for status reporting
    /// * `retry` - Budget for optimistic transaction retries
    pub fn new(
        repo: Arc<dyn TabRepository>,
        tokens: Arc<dyn TokenValidator>,
        orders: Arc<dyn OrderAggregator>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry: TableRegistry::new(repo.clone()),
            repo,
            tokens,
            orders,
            retry,
        }
    }

    /// Tab manager validating tokens against the store, with the default retry budget
    pub fn with_defaults(repo: Arc<dyn TabRepository>, orders: Arc<dyn OrderAggregator>) -> Self {
        let tokens = Arc::new(RepositoryTokenValidator::new(repo.clone()));
        Self::new(repo, tokens, orders, RetryPolicy::default())
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn repository(&self) -> Arc<dyn TabRepository> {
        self.repo.clone()
    }

    pub(crate) fn token_validator(&self) -> Arc<dyn TokenValidator> {
        self.tokens.clone()
    }

    pub(crate) fn order_aggregator(&self) -> Arc<dyn OrderAggregator> {
        self.orders.clone()
    }

    /// Open a tab on a table
    ///
    /// # Returns
    ///
    /// * `TabResult<OpenedTab>` - The new tab's id and capability token
    ///
    /// # Errors
    ///
    /// * `TabError::TableAlreadyOccupied` - Table already has an active or payment-locked tab
    /// * `TabError::CapacityExceeded` - Founding group larger than the table
    /// * `TabError::TableNotFound` - Table unknown and no capacity supplied
    pub async fn create_tab(&self, request: CreateTab) -> TabResult<OpenedTab> {
        let capacity = self
            .registry
            .resolve_capacity(&request.restaurant_id, &request.table_id, request.capacity)
            .await?;

        let (tab, founder) = Tab::open(&request, capacity, Utc::now())?;
        self.repo.insert_tab(&tab, &founder).await?;

        log::info!(
            "Opened tab {} on {}/{} ({}/{} seats)",
            tab.id,
            tab.restaurant_id,
            tab.table_id,
            tab.occupied_seats,
            tab.capacity
        );

        Ok(OpenedTab {
            tab_id: tab.id,
            token: tab.token,
            capacity: tab.capacity,
            occupied_seats: tab.occupied_seats,
        })
    }

    /// Take one seat on an existing tab
    ///
    /// The seat check and the seat increment commit together against the same
    /// snapshot; a full tab at commit time is rejected, never overbooked.
    ///
    /// # Errors
    ///
    /// * `TabError::TabNotFound` - Unknown tab
    /// * `TabError::InvalidToken` - Token does not open this tab
    /// * `TabError::NotAcceptingGuests` - Tab is payment-locked or closed
    /// * `TabError::CapacityExceeded` - No seat left
    /// * `TabError::TransactionConflict` - Retry budget exhausted
    pub async fn join_tab(
        &self,
        tab_id: TabId,
        token: &str,
        guest_name: Option<&str>,
    ) -> TabResult<Tab> {
        require_token(self.tokens.as_ref(), tab_id, token).await?;

        let result = run_tab_transaction(
            self.repo.as_ref(),
            &self.retry,
            tab_id,
            "join",
            |tab, now| {
                let participant = tab.admit(guest_name, now)?;
                Ok(Mutation::Commit {
                    joined: vec![participant.clone()],
                    value: participant,
                })
            },
        )
        .await;

        match result {
            Ok((tab, participant)) => {
                log::info!(
                    "{} joined tab {} ({}/{} seats)",
                    participant.name,
                    tab.id,
                    tab.occupied_seats,
                    tab.capacity
                );
                Ok(tab)
            }
            Err(e @ TabError::CapacityExceeded { .. }) => {
                log::info!("Join rejected for tab {tab_id}: {e}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a table has an open tab, with its seat and amount summary
    ///
    /// Read-only. Never exposes the tab token.
    pub async fn get_table_status(
        &self,
        restaurant_id: &str,
        table_id: &str,
    ) -> TabResult<TableStatus> {
        let Some(tab) = self.repo.find_open_tab(restaurant_id, table_id).await? else {
            return Ok(TableStatus {
                has_active_tab: false,
                tab_summary: None,
            });
        };

        let totals = self.orders.orders_for(tab.id).await?;
        Ok(TableStatus {
            has_active_tab: true,
            tab_summary: Some(TabSummary {
                tab_id: tab.id,
                status: tab.status,
                capacity: tab.capacity,
                occupied_seats: tab.occupied_seats,
                available_seats: tab.available_seats,
                order_count: totals.count,
                total_amount: totals.total_amount,
                pending_amount: totals.pending_amount,
                created_at: tab.created_at,
            }),
        })
    }

    /// Check that the store answers
    pub async fn health_check(&self) -> TabResult<()> {
        self.repo.ping().await
    }

    /// Full tab detail including participants, for token holders
    pub async fn get_tab(&self, tab_id: TabId, token: &str) -> TabResult<TabDetails> {
        require_token(self.tokens.as_ref(), tab_id, token).await?;

        let tab = self
            .repo
            .load_tab(tab_id)
            .await?
            .ok_or(TabError::TabNotFound(tab_id))?;
        let participants = self.repo.participants(tab_id).await?;
        let totals = self.orders.orders_for(tab_id).await?;

        Ok(TabDetails {
            tab,
            participants,
            order_count: totals.count,
        })
    }
}
