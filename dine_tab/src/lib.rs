//! # Dine Tab
//!
//! Shared dine-in bills ("tabs") for physical restaurant tables.
//!
//! Several guest devices can join the same tab. Seat admission enforces a hard
//! capacity limit under concurrent requests, and a payment lock keeps a tab
//! from being charged twice or left half-paid after a failed checkout.
//!
//! ## Architecture
//!
//! Handlers are stateless and may run on different machines, so nothing here
//! relies on in-process locks. Every mutation is an optimistic read-modify-write
//! against the store: the tab is loaded with its version, changed in memory, and
//! committed only if the version is still current. Conflicts are retried under
//! a bounded [`RetryPolicy`](tab::RetryPolicy).
//!
//! Tab lifecycle:
//!
//! - **active**: ordering and joins allowed
//! - **payment_locked**: a payment attempt is underway
//! - **completed**: payment settled (terminal)
//! - **cancelled**: abandoned without payment (terminal)
//!
//! ## Core Modules
//!
//! - [`tab`]: tab models, [`TabManager`](tab::TabManager) and the transaction runner
//! - [`payment`]: [`PaymentLockCoordinator`](payment::PaymentLockCoordinator)
//! - [`table`]: [`TableRegistry`](table::TableRegistry) over restaurant tables
//! - [`orders`]: read-only order totals per tab
//! - [`security`]: capability tokens and their validation
//! - [`db`]: Postgres pool, store trait and store implementations
//!
//! ## Example
//!
//! ```
//! use dine_tab::db::MemoryTabRepository;
//! use dine_tab::orders::MemoryOrderLedger;
//! use dine_tab::tab::{CreateTab, TabManager};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Arc::new(MemoryTabRepository::new());
//! let orders = Arc::new(MemoryOrderLedger::new());
//! let manager = TabManager::with_defaults(repo, orders);
//!
//! let opened = manager
//!     .create_tab(CreateTab::new("bistro", "T10", 4, "Ana"))
//!     .await?;
//! manager.join_tab(opened.tab_id, opened.token.as_str(), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod orders;
pub mod payment;
pub mod security;
pub mod tab;
pub mod table;

pub use payment::PaymentLockCoordinator;
pub use tab::{
    CreateTab, OpenedTab, Participant, Tab, TabError, TabId, TabManager, TabResult, TabStatus,
};
pub use table::{Table, TableRegistry, TableState};
