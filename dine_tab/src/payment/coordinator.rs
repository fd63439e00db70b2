//! Payment lock coordinator implementation.

use crate::db::TabRepository;
use crate::orders::OrderAggregator;
use crate::security::token::{TokenValidator, require_token};
use crate::tab::transaction::{Mutation, run_tab_transaction, run_tab_transaction_with};
use crate::tab::{RetryPolicy, Tab, TabId, TabManager, TabResult, Transition};
use std::sync::Arc;

/// Payment lock coordinator
///
/// Drives the payment half of the tab lifecycle. Each transition is one
/// optimistic transaction on the tab, so a lock taken on one server is
/// immediately visible to every other.
#[derive(Clone)]
pub struct PaymentLockCoordinator {
    repo: Arc<dyn TabRepository>,
    tokens: Arc<dyn TokenValidator>,
    orders: Arc<dyn OrderAggregator>,
    retry: RetryPolicy,
}

impl PaymentLockCoordinator {
    /// Create a new payment lock coordinator
    pub fn new(
        repo: Arc<dyn TabRepository>,
        tokens: Arc<dyn TokenValidator>,
        orders: Arc<dyn OrderAggregator>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            tokens,
            orders,
            retry,
        }
    }

    /// Share a tab manager's store, validator and retry budget
    pub fn from_manager(manager: &TabManager) -> Self {
        Self::new(
            manager.repository(),
            manager.token_validator(),
            manager.order_aggregator(),
            manager.retry_policy().clone(),
        )
    }

    /// Lock an active tab for payment
    ///
    /// Freezes the current order totals into the tab. Totals are re-read on
    /// every attempt, so a retry after a conflict freezes the orders as they
    /// stand at that attempt. No guest can join and no second payment can
    /// start until the lock is released or settled.
    ///
    /// # Errors
    ///
    /// * `TabError::InvalidToken` - Token does not open this tab
    /// * `TabError::AlreadyLocked` - Only while another payment is underway
    /// * `TabError::InvalidStateTransition` - Tab is completed or cancelled.
    ///   A closed tab is never reported as locked.
    pub async fn lock_for_payment(
        &self,
        tab_id: TabId,
        token: &str,
        payment_method: &str,
    ) -> TabResult<Tab> {
        require_token(self.tokens.as_ref(), tab_id, token).await?;

        let (tab, ()) = run_tab_transaction_with(
            self.repo.as_ref(),
            &self.retry,
            tab_id,
            "lock_for_payment",
            || self.orders.orders_for(tab_id),
            |tab, totals, now| {
                tab.begin_payment(payment_method, totals, now)?;
                Ok(Mutation::commit(()))
            },
        )
        .await?;

        log::info!(
            "Tab {} locked for {} payment of {}",
            tab.id,
            tab.payment_method.as_deref().unwrap_or_default(),
            tab.total_amount
        );
        Ok(tab)
    }

    /// Release a payment lock after a failed or abandoned payment
    ///
    /// The tab returns to `active` with its orders and amounts intact. Calling
    /// this on a tab that is already active changes nothing and reports
    /// [`Transition::Unchanged`].
    pub async fn unlock_for_retry(
        &self,
        tab_id: TabId,
        token: &str,
        reason: &str,
    ) -> TabResult<(Tab, Transition)> {
        require_token(self.tokens.as_ref(), tab_id, token).await?;

        let (tab, transition) = run_tab_transaction(
            self.repo.as_ref(),
            &self.retry,
            tab_id,
            "unlock_for_retry",
            |tab, now| match tab.release_payment(reason, now)? {
                Transition::Applied => Ok(Mutation::commit(Transition::Applied)),
                Transition::Unchanged => Ok(Mutation::Unchanged(Transition::Unchanged)),
            },
        )
        .await?;

        match transition {
            Transition::Applied => log::info!(
                "Tab {} unlocked for retry: {}",
                tab.id,
                tab.payment_failed_reason.as_deref().unwrap_or_default()
            ),
            Transition::Unchanged => {
                log::debug!("Tab {} already active, nothing to unlock", tab.id);
            }
        }
        Ok((tab, transition))
    }

    /// Settle a locked tab once the payment provider confirms it
    ///
    /// Repeated confirmations for an already-completed tab are no-ops and
    /// return the tab with [`Transition::Unchanged`].
    pub async fn finalize(&self, tab_id: TabId) -> TabResult<(Tab, Transition)> {
        let (tab, transition) = run_tab_transaction(
            self.repo.as_ref(),
            &self.retry,
            tab_id,
            "finalize",
            |tab, now| match tab.settle(now)? {
                Transition::Applied => Ok(Mutation::commit(Transition::Applied)),
                Transition::Unchanged => Ok(Mutation::Unchanged(Transition::Unchanged)),
            },
        )
        .await?;

        if transition == Transition::Applied {
            log::info!(
                "Tab {} completed on {}/{} ({} paid)",
                tab.id,
                tab.restaurant_id,
                tab.table_id,
                tab.total_amount
            );
        } else {
            log::debug!("Duplicate payment confirmation for completed tab {}", tab.id);
        }
        Ok((tab, transition))
    }

    /// Administratively cancel an active tab and free its table
    pub async fn cancel_tab(&self, tab_id: TabId) -> TabResult<(Tab, Transition)> {
        let (tab, transition) = run_tab_transaction(
            self.repo.as_ref(),
            &self.retry,
            tab_id,
            "cancel",
            |tab, now| match tab.cancel(now)? {
                Transition::Applied => Ok(Mutation::commit(Transition::Applied)),
                Transition::Unchanged => Ok(Mutation::Unchanged(Transition::Unchanged)),
            },
        )
        .await?;

        if transition == Transition::Applied {
            log::warn!(
                "Tab {} on {}/{} cancelled",
                tab.id,
                tab.restaurant_id,
                tab.table_id
            );
        }
        Ok((tab, transition))
    }
}
