//! Request and response bodies of the HTTP API.
//!
//! Amounts travel as decimal strings (`"0.029"`, `"10"`), never as floats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    pub id: Uuid,
}

pub mod pool {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PoolView {
        pub admin: String,
        pub total_balance: String,
        pub total_donated: String,
        pub total_withdrawn: String,
        pub min_donation: String,
        pub withdrawal_limit: String,
        pub auto_ceiling: String,
        /// Minimum seconds between two auto withdrawals of one recipient, if
        /// enforced.
        pub auto_cooldown_secs: Option<i64>,
        pub created_at: DateTime<Utc>,
    }
}

pub mod donation {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonateNew {
        pub amount: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonorView {
        pub donor: String,
        pub total_donated: String,
    }
}

pub mod allocation {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AllocationNew {
        pub recipient: String,
        pub amount: String,
        pub note: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AllocationView {
        pub recipient: String,
        pub allocated: String,
        pub withdrawn: String,
        pub available: String,
    }
}

pub mod withdrawal {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum WithdrawalKind {
        Auto,
        Approved,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WithdrawNew {
        pub amount: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WithdrawalCreated {
        pub id: Uuid,
        pub kind: WithdrawalKind,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WithdrawalList {
        pub recipient: Option<String>,
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WithdrawalView {
        pub id: Uuid,
        pub recipient: String,
        pub amount: String,
        pub kind: WithdrawalKind,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WithdrawalPage {
        pub withdrawals: Vec<WithdrawalView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }
}

pub mod request {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum RequestStatus {
        Pending,
        Approved,
        Rejected,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RequestNew {
        pub amount: String,
        pub note: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct RequestList {
        pub status: Option<RequestStatus>,
        pub requester: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RequestView {
        pub id: Uuid,
        pub requester: String,
        pub amount: String,
        pub note: Option<String>,
        pub status: RequestStatus,
        pub created_at: DateTime<Utc>,
        pub decided_at: Option<DateTime<Utc>>,
        pub decided_by: Option<String>,
        pub grant_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RequestListResponse {
        pub requests: Vec<RequestView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReconcileView {
        pub checked: usize,
        pub approved: Vec<Uuid>,
        pub regranted: Vec<Uuid>,
    }
}

pub mod audit {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuditView {
        pub consistent: bool,
        pub total_balance: String,
        pub replayed_balance: String,
        pub donors: usize,
        pub recipients: usize,
        pub mismatches: Vec<String>,
    }
}
