//! Allocation grants.
//!
//! A grant is the immutable record of one accepted allocation increase. When
//! the grant comes from an approved funding request, `request_id` carries the
//! request identity; the column is unique, which makes the grant the
//! idempotency key between the request queue and the ledger.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{Amount, EngineError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationGrant {
    pub id: Uuid,
    pub recipient: String,
    pub amount: Amount,
    pub granted_by: String,
    pub request_id: Option<Uuid>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "allocation_grants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub recipient: String,
    pub amount: i64,
    pub granted_by: String,
    #[sea_orm(unique)]
    pub request_id: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::allocations::Entity",
        from = "Column::Recipient",
        to = "super::allocations::Column::Recipient",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Allocations,
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&AllocationGrant> for ActiveModel {
    fn from(value: &AllocationGrant) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            recipient: ActiveValue::Set(value.recipient.clone()),
            amount: ActiveValue::Set(value.amount.micros()),
            granted_by: ActiveValue::Set(value.granted_by.clone()),
            request_id: ActiveValue::Set(value.request_id.map(|id| id.to_string())),
            note: ActiveValue::Set(value.note.clone()),
            occurred_at: ActiveValue::Set(value.occurred_at),
        }
    }
}

impl TryFrom<Model> for AllocationGrant {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("grant not exists".to_string()))?,
            recipient: model.recipient,
            amount: Amount::new(model.amount),
            granted_by: model.granted_by,
            request_id: model
                .request_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            note: model.note,
            occurred_at: model.occurred_at,
        })
    }
}
