//! Tab data models and the per-tab state machine.

use super::errors::{TabError, TabResult};
use crate::orders::OrderTotals;
use crate::security::TabToken;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Tab ID type
pub type TabId = Uuid;

/// Name recorded for guests who don't give one
pub const DEFAULT_GUEST_NAME: &str = "Guest";

/// Longest guest name kept, in characters
pub const MAX_GUEST_NAME_CHARS: usize = 64;

/// Largest seating capacity a tab can be opened with
pub const MAX_TAB_CAPACITY: u32 = 100;

/// Tab lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabStatus {
    Active,
    PaymentLocked,
    Completed,
    Cancelled,
}

impl TabStatus {
    /// Terminal tabs are frozen and free their table
    pub fn is_terminal(self) -> bool {
        matches!(self, TabStatus::Completed | TabStatus::Cancelled)
    }

    /// Open tabs count against the one-open-tab-per-table rule
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_transition_to(self, next: TabStatus) -> bool {
        matches!(
            (self, next),
            (TabStatus::Active, TabStatus::PaymentLocked)
                | (TabStatus::PaymentLocked, TabStatus::Active)
                | (TabStatus::PaymentLocked, TabStatus::Completed)
                | (TabStatus::Active, TabStatus::Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TabStatus::Active => "active",
            TabStatus::PaymentLocked => "payment_locked",
            TabStatus::Completed => "completed",
            TabStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TabStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TabStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TabStatus::Active),
            "payment_locked" => Ok(TabStatus::PaymentLocked),
            "completed" => Ok(TabStatus::Completed),
            "cancelled" => Ok(TabStatus::Cancelled),
            other => Err(format!("unknown tab status: {other}")),
        }
    }
}

/// Outcome of a lifecycle operation that may be a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Tab changed and must be committed
    Applied,
    /// Tab already in the requested state; nothing to write
    Unchanged,
}

/// Guest seated on a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: String,
    /// Seats taken by this participant's party
    pub seats: u32,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(name: Option<&str>, seats: u32, joined_at: DateTime<Utc>) -> Self {
        Self {
            name: normalize_guest_name(name),
            seats,
            joined_at,
        }
    }
}

/// Trim a guest name, fall back to [`DEFAULT_GUEST_NAME`] and cap its length
pub fn normalize_guest_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.chars().take(MAX_GUEST_NAME_CHARS).collect(),
        _ => DEFAULT_GUEST_NAME.to_string(),
    }
}

/// Tab model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub restaurant_id: String,
    pub table_id: String,
    pub capacity: u32,
    pub occupied_seats: u32,
    pub available_seats: u32,
    pub status: TabStatus,
    #[serde(skip_serializing)]
    pub token: TabToken,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    pub payment_method: Option<String>,
    pub payment_initiated_at: Option<DateTime<Utc>>,
    pub payment_failed_reason: Option<String>,
    pub payment_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, bumped on every commit
    #[serde(skip_serializing)]
    pub version: i64,
}

impl Tab {
    /// Build a fresh active tab and its founding participant
    ///
    /// # Errors
    ///
    /// * `TabError::InvalidRequest` - Zero capacity or group size
    /// * `TabError::CapacityExceeded` - Group larger than the table
    pub fn open(
        request: &CreateTab,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> TabResult<(Tab, Participant)> {
        request.validate_ids()?;

        if capacity == 0 || capacity > MAX_TAB_CAPACITY {
            return Err(TabError::InvalidRequest(format!(
                "capacity must be between 1 and {MAX_TAB_CAPACITY}"
            )));
        }
        if request.group_size == 0 {
            return Err(TabError::InvalidRequest(
                "group size must be at least 1".to_string(),
            ));
        }
        if request.group_size > capacity {
            return Err(TabError::CapacityExceeded {
                capacity,
                occupied: 0,
                requested: request.group_size,
            });
        }

        let participant = Participant::new(request.guest_name.as_deref(), request.group_size, now);
        let tab = Tab {
            id: Uuid::new_v4(),
            restaurant_id: request.restaurant_id.clone(),
            table_id: request.table_id.clone(),
            capacity,
            occupied_seats: request.group_size,
            available_seats: capacity - request.group_size,
            status: TabStatus::Active,
            token: TabToken::generate(),
            total_amount: Decimal::ZERO,
            pending_amount: Decimal::ZERO,
            payment_method: None,
            payment_initiated_at: None,
            payment_failed_reason: None,
            payment_failed_at: None,
            created_at: now,
            last_modified_at: now,
            closed_at: None,
            version: 0,
        };

        debug_assert!(tab.holds_seat_invariants());
        Ok((tab, participant))
    }

    /// `occupied + available == capacity` and `occupied <= capacity`
    pub fn holds_seat_invariants(&self) -> bool {
        self.occupied_seats <= self.capacity
            && self.occupied_seats.checked_add(self.available_seats) == Some(self.capacity)
    }

    /// Take one seat for a new guest
    ///
    /// # Errors
    ///
    /// * `TabError::NotAcceptingGuests` - Tab is not active
    /// * `TabError::CapacityExceeded` - No free seat left
    pub fn admit(
        &mut self,
        guest_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> TabResult<Participant> {
        if self.status != TabStatus::Active {
            return Err(TabError::NotAcceptingGuests(self.status));
        }
        if self.occupied_seats >= self.capacity {
            return Err(TabError::CapacityExceeded {
                capacity: self.capacity,
                occupied: self.occupied_seats,
                requested: 1,
            });
        }

        self.occupied_seats += 1;
        self.available_seats = self.capacity - self.occupied_seats;
        self.last_modified_at = now;

        debug_assert!(self.holds_seat_invariants());
        Ok(Participant::new(guest_name, 1, now))
    }

    /// `active -> payment_locked`, freezing the amount due
    ///
    /// # Errors
    ///
    /// * `TabError::AlreadyLocked` - A payment is already underway
    /// * `TabError::InvalidStateTransition` - Tab is closed
    pub fn begin_payment(
        &mut self,
        method: &str,
        totals: &OrderTotals,
        now: DateTime<Utc>,
    ) -> TabResult<()> {
        match self.status {
            TabStatus::Active => {}
            TabStatus::PaymentLocked => return Err(TabError::AlreadyLocked { tab_id: self.id }),
            from => {
                return Err(TabError::InvalidStateTransition {
                    from,
                    to: TabStatus::PaymentLocked,
                });
            }
        }

        let method = method.trim();
        if method.is_empty() {
            return Err(TabError::InvalidRequest(
                "payment method is required".to_string(),
            ));
        }

        self.status = TabStatus::PaymentLocked;
        self.payment_method = Some(method.to_string());
        self.payment_initiated_at = Some(now);
        self.total_amount = totals.total_amount;
        self.pending_amount = totals.pending_amount;
        self.last_modified_at = now;
        Ok(())
    }

    /// `payment_locked -> active` after a failed or abandoned payment
    ///
    /// Order amounts are left untouched. Already-active tabs are a no-op.
    pub fn release_payment(&mut self, reason: &str, now: DateTime<Utc>) -> TabResult<Transition> {
        match self.status {
            TabStatus::PaymentLocked => {}
            TabStatus::Active => return Ok(Transition::Unchanged),
            from => {
                return Err(TabError::InvalidStateTransition {
                    from,
                    to: TabStatus::Active,
                });
            }
        }

        let reason = reason.trim();
        self.status = TabStatus::Active;
        self.payment_method = None;
        self.payment_initiated_at = None;
        self.payment_failed_reason = Some(if reason.is_empty() {
            "unspecified".to_string()
        } else {
            reason.to_string()
        });
        self.payment_failed_at = Some(now);
        self.last_modified_at = now;

        debug_assert!(self.holds_seat_invariants());
        Ok(Transition::Applied)
    }

    /// `payment_locked -> completed`; already-completed tabs are a no-op
    pub fn settle(&mut self, now: DateTime<Utc>) -> TabResult<Transition> {
        match self.status {
            TabStatus::PaymentLocked => {}
            TabStatus::Completed => return Ok(Transition::Unchanged),
            from => {
                return Err(TabError::InvalidStateTransition {
                    from,
                    to: TabStatus::Completed,
                });
            }
        }

        self.status = TabStatus::Completed;
        self.pending_amount = Decimal::ZERO;
        self.closed_at = Some(now);
        self.last_modified_at = now;
        Ok(Transition::Applied)
    }

    /// `active -> cancelled`; already-cancelled tabs are a no-op
    pub fn cancel(&mut self, now: DateTime<Utc>) -> TabResult<Transition> {
        match self.status {
            TabStatus::Active => {}
            TabStatus::Cancelled => return Ok(Transition::Unchanged),
            from => {
                return Err(TabError::InvalidStateTransition {
                    from,
                    to: TabStatus::Cancelled,
                });
            }
        }

        self.status = TabStatus::Cancelled;
        self.closed_at = Some(now);
        self.last_modified_at = now;
        Ok(Transition::Applied)
    }
}

/// Request to open a tab on a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTab {
    pub restaurant_id: String,
    pub table_id: String,
    /// Capacity from the client; a registered table's own capacity wins
    pub capacity: Option<u32>,
    /// Seats taken by the founding party
    pub group_size: u32,
    pub guest_name: Option<String>,
}

impl CreateTab {
    pub fn new(
        restaurant_id: impl Into<String>,
        table_id: impl Into<String>,
        capacity: u32,
        guest_name: impl Into<String>,
    ) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            table_id: table_id.into(),
            capacity: Some(capacity),
            group_size: 1,
            guest_name: Some(guest_name.into()),
        }
    }

    pub fn with_group_size(mut self, group_size: u32) -> Self {
        self.group_size = group_size;
        self
    }

    fn validate_ids(&self) -> TabResult<()> {
        if self.restaurant_id.trim().is_empty() {
            return Err(TabError::InvalidRequest(
                "restaurant id is required".to_string(),
            ));
        }
        if self.table_id.trim().is_empty() {
            return Err(TabError::InvalidRequest("table id is required".to_string()));
        }
        Ok(())
    }
}

/// Handle returned to the tab's creator
///
/// The token is the only way to later join, pay or read tab detail.
#[derive(Debug, Clone)]
pub struct OpenedTab {
    pub tab_id: TabId,
    pub token: TabToken,
    pub capacity: u32,
    pub occupied_seats: u32,
}

/// Seat and amount summary shown for a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub tab_id: TabId,
    pub status: TabStatus,
    pub capacity: u32,
    pub occupied_seats: u32,
    pub available_seats: u32,
    pub order_count: u32,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Answer to "is anyone sitting at this table?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatus {
    pub has_active_tab: bool,
    #[serde(rename = "tabData", skip_serializing_if = "Option::is_none")]
    pub tab_summary: Option<TabSummary>,
}

/// Full tab detail, only handed out to token holders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDetails {
    #[serde(flatten)]
    pub tab: Tab,
    pub participants: Vec<Participant>,
    pub order_count: u32,
}
