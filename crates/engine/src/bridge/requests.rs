//! Funding requests: the off-ledger queue a recipient fills before the
//! admin decides.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError};

/// Lifecycle of a funding request.
///
/// `Pending` is the only non-terminal state; a decided request is never
/// revisited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl TryFrom<&str> for RequestStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::InvalidInput(format!(
                "invalid request status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRequest {
    pub id: Uuid,
    pub requester: String,
    pub amount: Amount,
    pub note: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    /// The allocation grant that approved this request.
    pub grant_id: Option<Uuid>,
}

impl FundingRequest {
    pub(crate) fn new(
        requester: String,
        amount: Amount,
        note: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester,
            amount,
            note,
            status: RequestStatus::Pending,
            created_at,
            decided_at: None,
            decided_by: None,
            grant_id: None,
        }
    }
}

/// Filters for listing funding requests.
#[derive(Clone, Debug, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub requester: Option<String>,
}

impl RequestFilter {
    #[must_use]
    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "funding_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub requester: String,
    pub amount: i64,
    pub note: Option<String>,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub decided_at: Option<DateTimeUtc>,
    pub decided_by: Option<String>,
    pub grant_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&FundingRequest> for ActiveModel {
    fn from(value: &FundingRequest) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            requester: ActiveValue::Set(value.requester.clone()),
            amount: ActiveValue::Set(value.amount.micros()),
            note: ActiveValue::Set(value.note.clone()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
            decided_at: ActiveValue::Set(value.decided_at),
            decided_by: ActiveValue::Set(value.decided_by.clone()),
            grant_id: ActiveValue::Set(value.grant_id.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<Model> for FundingRequest {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("request not exists".to_string()))?,
            requester: model.requester,
            amount: Amount::new(model.amount),
            note: model.note,
            status: RequestStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            decided_at: model.decided_at,
            decided_by: model.decided_by,
            grant_id: model.grant_id.and_then(|s| Uuid::parse_str(&s).ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_names() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ] {
            assert_eq!(RequestStatus::try_from(status.as_str()), Ok(status));
        }
        assert!(matches!(
            RequestStatus::try_from("cancelled"),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn only_pending_is_open() {
        assert!(!RequestStatus::Pending.is_final());
        assert!(RequestStatus::Approved.is_final());
        assert!(RequestStatus::Rejected.is_final());
    }
}
