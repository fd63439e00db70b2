//! Optimistic read-modify-write runner for a single tab.
//!
//! Each attempt loads a fresh snapshot, applies the mutation to it, and
//! commits against the snapshot's version. The check that decided the mutation
//! (free seats, current status) is therefore always made on exactly the state
//! being replaced. A stale snapshot conflicts and the whole attempt reruns.

use super::errors::{TabError, TabResult};
use super::models::{Participant, Tab, TabId};
use super::retry::RetryPolicy;
use crate::db::{CommitOutcome, TabRepository};
use chrono::{DateTime, Utc};
use std::future::Future;

/// What a mutation wants written
pub(crate) enum Mutation<T> {
    /// Commit the changed tab and append these participants
    Commit { value: T, joined: Vec<Participant> },
    /// Nothing changed; skip the write
    Unchanged(T),
}

impl<T> Mutation<T> {
    pub(crate) fn commit(value: T) -> Self {
        Mutation::Commit {
            value,
            joined: Vec::new(),
        }
    }
}

/// Run `mutate` against `tab_id` until it commits, fails, or the budget runs out
///
/// Errors returned by `mutate` abort immediately without retry. Returns the
/// tab as committed (or as loaded, for unchanged mutations).
pub(crate) async fn run_tab_transaction<T, F>(
    repo: &dyn TabRepository,
    policy: &RetryPolicy,
    tab_id: TabId,
    operation: &'static str,
    mut mutate: F,
) -> TabResult<(Tab, T)>
where
    F: FnMut(&mut Tab, DateTime<Utc>) -> TabResult<Mutation<T>> + Send,
    T: Send,
{
    run_tab_transaction_with(
        repo,
        policy,
        tab_id,
        operation,
        || async { Ok::<(), TabError>(()) },
        |tab, _, now| mutate(tab, now),
    )
    .await
}

/// Like [`run_tab_transaction`], with inputs re-read on every attempt
///
/// `prepare` runs before each snapshot is loaded, so a retry after a conflict
/// never decides on inputs fetched for an earlier attempt.
pub(crate) async fn run_tab_transaction_with<C, P, Fut, T, F>(
    repo: &dyn TabRepository,
    policy: &RetryPolicy,
    tab_id: TabId,
    operation: &'static str,
    mut prepare: P,
    mut mutate: F,
) -> TabResult<(Tab, T)>
where
    P: FnMut() -> Fut + Send,
    Fut: Future<Output = TabResult<C>> + Send,
    C: Send,
    F: FnMut(&mut Tab, &C, DateTime<Utc>) -> TabResult<Mutation<T>> + Send,
    T: Send,
{
    for attempt in 1..=policy.max_attempts {
        let inputs = prepare().await?;
        let mut tab = repo
            .load_tab(tab_id)
            .await?
            .ok_or(TabError::TabNotFound(tab_id))?;

        let (value, joined) = match mutate(&mut tab, &inputs, Utc::now())? {
            Mutation::Unchanged(value) => return Ok((tab, value)),
            Mutation::Commit { value, joined } => (value, joined),
        };

        if !tab.holds_seat_invariants() {
            log::error!("Refusing to commit tab {tab_id} for {operation}: seat invariant broken");
            return Err(TabError::InvalidRequest(
                "seat counts do not add up".to_string(),
            ));
        }

        match repo.commit_tab(&tab, &joined).await? {
            CommitOutcome::Committed => {
                tab.version += 1;
                return Ok((tab, value));
            }
            CommitOutcome::Conflict => {
                log::debug!(
                    "Conflict on tab {} during {} (attempt {}/{})",
                    tab_id,
                    operation,
                    attempt,
                    policy.max_attempts
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }

    log::warn!(
        "Giving up on {} for tab {} after {} conflicting attempts",
        operation,
        tab_id,
        policy.max_attempts
    );
    Err(TabError::TransactionConflict {
        attempts: policy.max_attempts,
    })
}
