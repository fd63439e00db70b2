//! Tab module: shared dine-in bills and their seat accounting.
//!
//! This module implements:
//! - Tab lifecycle state machine (`active`, `payment_locked`, `completed`, `cancelled`)
//! - Capacity-checked seat admission under concurrent joins
//! - Optimistic read-modify-write transactions with bounded retry
//! - Table status summaries backed by order totals

pub mod errors;
pub mod manager;
pub mod models;
pub mod retry;
pub(crate) mod transaction;

pub use errors::{TabError, TabResult};
pub use manager::TabManager;
pub use models::{
    CreateTab, DEFAULT_GUEST_NAME, MAX_GUEST_NAME_CHARS, MAX_TAB_CAPACITY, OpenedTab, Participant,
    Tab, TabDetails, TabId, TabStatus, TabSummary, TableStatus, Transition,
};
pub use retry::RetryPolicy;
