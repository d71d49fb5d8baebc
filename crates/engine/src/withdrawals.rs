//! Withdrawal events: the append-only log of successful withdrawals.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError};

/// Audit classification of a withdrawal.
///
/// `Auto` marks a self-service amount at or below the pool's auto ceiling,
/// `Approved` anything above it. The label does not gate the withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalKind {
    Auto,
    Approved,
}

impl WithdrawalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Approved => "approved",
        }
    }
}

impl TryFrom<&str> for WithdrawalKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "auto" => Ok(Self::Auto),
            "approved" => Ok(Self::Approved),
            other => Err(EngineError::InvalidInput(format!(
                "invalid withdrawal kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub id: Uuid,
    pub recipient: String,
    pub amount: Amount,
    pub kind: WithdrawalKind,
    pub occurred_at: DateTime<Utc>,
}

impl WithdrawalEvent {
    pub(crate) fn new(
        recipient: String,
        amount: Amount,
        kind: WithdrawalKind,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            amount,
            kind,
            occurred_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "withdrawals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub recipient: String,
    pub amount: i64,
    pub kind: String,
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

impl From<&WithdrawalEvent> for ActiveModel {
    fn from(event: &WithdrawalEvent) -> Self {
        Self {
            id: ActiveValue::Set(event.id.to_string()),
            recipient: ActiveValue::Set(event.recipient.clone()),
            amount: ActiveValue::Set(event.amount.micros()),
            kind: ActiveValue::Set(event.kind.as_str().to_string()),
            occurred_at: ActiveValue::Set(event.occurred_at),
        }
    }
}

impl TryFrom<Model> for WithdrawalEvent {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("withdrawal not exists".to_string()))?,
            recipient: model.recipient,
            amount: Amount::new(model.amount),
            kind: WithdrawalKind::try_from(model.kind.as_str())?,
            occurred_at: model.occurred_at,
        })
    }
}
