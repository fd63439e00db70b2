//! Integration tests for the payment lock lifecycle.

use dine_tab::PaymentLockCoordinator;
use dine_tab::db::{MemoryTabRepository, TabRepository};
use dine_tab::orders::{MemoryOrderLedger, OrderState};
use dine_tab::tab::{CreateTab, OpenedTab, TabError, TabManager, TabStatus, Transition};
use dine_tab::table::{Table, TableState};
use rust_decimal::Decimal;
use std::sync::Arc;

struct Fixture {
    manager: TabManager,
    payments: PaymentLockCoordinator,
    repo: Arc<MemoryTabRepository>,
    orders: Arc<MemoryOrderLedger>,
    opened: OpenedTab,
}

/// Helper to open a tab with one guest and two orders
async fn setup() -> Fixture {
    let repo = Arc::new(MemoryTabRepository::with_tables(vec![Table::new(
        "bistro", "T10", 4,
    )]));
    let orders = Arc::new(MemoryOrderLedger::new());
    let manager = TabManager::with_defaults(repo.clone(), orders.clone());
    let payments = PaymentLockCoordinator::from_manager(&manager);

    let opened = manager
        .create_tab(CreateTab::new("bistro", "T10", 4, "Ana"))
        .await
        .unwrap();
    orders
        .record(opened.tab_id, Decimal::new(3200, 2), OrderState::Served)
        .await;
    orders
        .record(opened.tab_id, Decimal::new(450, 2), OrderState::Pending)
        .await;

    Fixture {
        manager,
        payments,
        repo,
        orders,
        opened,
    }
}

#[tokio::test]
async fn test_second_lock_is_rejected() {
    let f = setup().await;
    let token = f.opened.token.as_str();

    let tab = f
        .payments
        .lock_for_payment(f.opened.tab_id, token, "upi")
        .await
        .unwrap();
    assert_eq!(tab.status, TabStatus::PaymentLocked);
    assert_eq!(tab.payment_method.as_deref(), Some("upi"));
    assert!(tab.payment_initiated_at.is_some());
    assert_eq!(tab.total_amount, Decimal::new(3650, 2));
    assert_eq!(tab.pending_amount, Decimal::new(450, 2));

    let err = f
        .payments
        .lock_for_payment(f.opened.tab_id, token, "card")
        .await
        .unwrap_err();
    assert!(matches!(err, TabError::AlreadyLocked { tab_id } if tab_id == f.opened.tab_id));

    let stored = f.repo.load_tab(f.opened.tab_id).await.unwrap().unwrap();
    assert_eq!(stored.payment_method.as_deref(), Some("upi"));
}

#[tokio::test]
async fn test_locked_tab_refuses_guests() {
    let f = setup().await;
    let token = f.opened.token.as_str();

    f.payments
        .lock_for_payment(f.opened.tab_id, token, "upi")
        .await
        .unwrap();

    assert!(matches!(
        f.manager.join_tab(f.opened.tab_id, token, Some("Late")).await,
        Err(TabError::NotAcceptingGuests(TabStatus::PaymentLocked))
    ));
}

#[tokio::test]
async fn test_unlock_restores_active_and_allows_relock() {
    let f = setup().await;
    let token = f.opened.token.as_str();

    f.payments
        .lock_for_payment(f.opened.tab_id, token, "upi")
        .await
        .unwrap();

    let (tab, transition) = f
        .payments
        .unlock_for_retry(f.opened.tab_id, token, "bank app timed out")
        .await
        .unwrap();
    assert_eq!(transition, Transition::Applied);
    assert_eq!(tab.status, TabStatus::Active);
    assert_eq!(tab.payment_method, None);
    assert_eq!(tab.payment_initiated_at, None);
    assert_eq!(
        tab.payment_failed_reason.as_deref(),
        Some("bank app timed out")
    );
    assert!(tab.payment_failed_at.is_some());
    assert_eq!(tab.total_amount, Decimal::new(3650, 2));
    assert_eq!(tab.occupied_seats + tab.available_seats, tab.capacity);

    // A guest may still join, and more orders may come in, before the retry
    f.manager
        .join_tab(f.opened.tab_id, token, Some("Ben"))
        .await
        .unwrap();
    f.orders
        .record(f.opened.tab_id, Decimal::new(500, 2), OrderState::Pending)
        .await;

    let tab = f
        .payments
        .lock_for_payment(f.opened.tab_id, token, "card")
        .await
        .unwrap();
    assert_eq!(tab.status, TabStatus::PaymentLocked);
    assert_eq!(tab.payment_method.as_deref(), Some("card"));
    assert_eq!(tab.total_amount, Decimal::new(4150, 2));
}

#[tokio::test]
async fn test_unlock_on_active_tab_is_noop() {
    let f = setup().await;
    let before = f.repo.load_tab(f.opened.tab_id).await.unwrap().unwrap();

    let (tab, transition) = f
        .payments
        .unlock_for_retry(f.opened.tab_id, f.opened.token.as_str(), "stray retry")
        .await
        .unwrap();
    assert_eq!(transition, Transition::Unchanged);
    assert_eq!(tab, before);

    let after = f.repo.load_tab(f.opened.tab_id).await.unwrap().unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(after.payment_failed_reason, None);
}

#[tokio::test]
async fn test_unlock_requires_token() {
    let f = setup().await;

    assert!(matches!(
        f.payments
            .unlock_for_retry(f.opened.tab_id, "forged", "x")
            .await,
        Err(TabError::InvalidToken)
    ));
    assert!(matches!(
        f.payments
            .lock_for_payment(f.opened.tab_id, "forged", "upi")
            .await,
        Err(TabError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_finalize_is_idempotent_and_frees_table() {
    let f = setup().await;
    let token = f.opened.token.as_str();

    f.payments
        .lock_for_payment(f.opened.tab_id, token, "upi")
        .await
        .unwrap();

    let (first, transition) = f.payments.finalize(f.opened.tab_id).await.unwrap();
    assert_eq!(transition, Transition::Applied);
    assert_eq!(first.status, TabStatus::Completed);
    assert_eq!(first.pending_amount, Decimal::ZERO);
    assert!(first.closed_at.is_some());

    // A duplicate confirmation reports that nothing changed
    let (second, transition) = f.payments.finalize(f.opened.tab_id).await.unwrap();
    assert_eq!(transition, Transition::Unchanged);
    assert_eq!(first, second);

    // A settled tab is closed, not locked
    assert!(matches!(
        f.payments.lock_for_payment(f.opened.tab_id, token, "upi").await,
        Err(TabError::InvalidStateTransition {
            from: TabStatus::Completed,
            to: TabStatus::PaymentLocked
        })
    ));

    let stored = f.repo.load_tab(f.opened.tab_id).await.unwrap().unwrap();
    assert_eq!(stored, first);

    let status = f.manager.get_table_status("bistro", "T10").await.unwrap();
    assert!(!status.has_active_tab);
    let table = f.repo.find_table("bistro", "T10").await.unwrap().unwrap();
    assert_eq!(table.state, TableState::Available);

    // The table can seat a new party
    f.manager
        .create_tab(CreateTab::new("bistro", "T10", 4, "Next"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_finalize_requires_lock() {
    let f = setup().await;

    assert!(matches!(
        f.payments.finalize(f.opened.tab_id).await,
        Err(TabError::InvalidStateTransition {
            from: TabStatus::Active,
            to: TabStatus::Completed
        })
    ));
}

#[tokio::test]
async fn test_cancel_closes_active_tab() {
    let f = setup().await;
    let token = f.opened.token.as_str();

    let (tab, transition) = f.payments.cancel_tab(f.opened.tab_id).await.unwrap();
    assert_eq!(transition, Transition::Applied);
    assert_eq!(tab.status, TabStatus::Cancelled);
    assert!(tab.closed_at.is_some());

    // Cancelling again changes nothing
    let (again, transition) = f.payments.cancel_tab(f.opened.tab_id).await.unwrap();
    assert_eq!(transition, Transition::Unchanged);
    assert_eq!(again, tab);

    assert!(matches!(
        f.manager.join_tab(f.opened.tab_id, token, None).await,
        Err(TabError::NotAcceptingGuests(TabStatus::Cancelled))
    ));
    assert!(matches!(
        f.payments
            .lock_for_payment(f.opened.tab_id, token, "upi")
            .await,
        Err(TabError::InvalidStateTransition {
            from: TabStatus::Cancelled,
            to: TabStatus::PaymentLocked
        })
    ));
    assert!(
        !f.manager
            .get_table_status("bistro", "T10")
            .await
            .unwrap()
            .has_active_tab
    );
}

#[tokio::test]
async fn test_locked_tab_cannot_be_cancelled() {
    let f = setup().await;

    f.payments
        .lock_for_payment(f.opened.tab_id, f.opened.token.as_str(), "upi")
        .await
        .unwrap();

    assert!(matches!(
        f.payments.cancel_tab(f.opened.tab_id).await,
        Err(TabError::InvalidStateTransition {
            from: TabStatus::PaymentLocked,
            to: TabStatus::Cancelled
        })
    ));
}
