//! Command structs for engine operations.
//!
//! These types group parameters for write operations
//! (donate/increase allocation/withdraw), keeping call sites readable and
//! avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Amount;

/// Donate `amount` to the pool on behalf of `donor`.
#[derive(Clone, Debug)]
pub struct DonateCmd {
    pub donor: String,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

impl DonateCmd {
    #[must_use]
    pub fn new(donor: impl Into<String>, amount: Amount, occurred_at: DateTime<Utc>) -> Self {
        Self {
            donor: donor.into(),
            amount,
            occurred_at,
        }
    }
}

/// Grant `amount` more to `recipient`.
///
/// `request_id` links the grant to a funding request; a second command with
/// the same `request_id` is answered with the first grant instead of being
/// applied again.
#[derive(Clone, Debug)]
pub struct IncreaseAllocationCmd {
    pub caller: String,
    pub recipient: String,
    pub amount: Amount,
    pub request_id: Option<Uuid>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl IncreaseAllocationCmd {
    #[must_use]
    pub fn new(
        caller: impl Into<String>,
        recipient: impl Into<String>,
        amount: Amount,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            caller: caller.into(),
            recipient: recipient.into(),
            amount,
            request_id: None,
            note: None,
            occurred_at,
        }
    }

    #[must_use]
    pub fn request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Withdraw `amount` against the caller's own allocation.
#[derive(Clone, Debug)]
pub struct WithdrawCmd {
    pub recipient: String,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

impl WithdrawCmd {
    #[must_use]
    pub fn new(recipient: impl Into<String>, amount: Amount, occurred_at: DateTime<Utc>) -> Self {
        Self {
            recipient: recipient.into(),
            amount,
            occurred_at,
        }
    }
}
