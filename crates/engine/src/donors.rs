//! Donor records: one row per donor identity, created on the first donation
//! and never deleted.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::Amount;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Donor {
    pub donor: String,
    /// Monotonically non-decreasing.
    pub total_donated: Amount,
    pub first_donated_at: DateTime<Utc>,
    pub last_donated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "donors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub donor: String,
    pub total_donated: i64,
    pub first_donated_at: DateTimeUtc,
    pub last_donated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::donations::Entity")]
    Donations,
}

impl Related<super::donations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Donations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Donor {
    fn from(model: Model) -> Self {
        Self {
            donor: model.donor,
            total_donated: Amount::new(model.total_donated),
            first_donated_at: model.first_donated_at,
            last_donated_at: model.last_donated_at,
        }
    }
}
