//! Donation events.
//!
//! Every accepted donation appends one immutable row here, so the pool's
//! `total_donated` counter can always be replayed from the log.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{Amount, EngineError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Donation {
    pub id: Uuid,
    pub donor: String,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

impl Donation {
    pub(crate) fn new(donor: String, amount: Amount, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            donor,
            amount,
            occurred_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub donor: String,
    pub amount: i64,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::donors::Entity",
        from = "Column::Donor",
        to = "super::donors::Column::Donor",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Donors,
}

impl Related<super::donors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Donors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Donation> for ActiveModel {
    fn from(value: &Donation) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            donor: ActiveValue::Set(value.donor.clone()),
            amount: ActiveValue::Set(value.amount.micros()),
            occurred_at: ActiveValue::Set(value.occurred_at),
        }
    }
}

impl TryFrom<Model> for Donation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("donation not exists".to_string()))?,
            donor: model.donor,
            amount: Amount::new(model.amount),
            occurred_at: model.occurred_at,
        })
    }
}
