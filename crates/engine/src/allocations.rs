//! The module contains `RecipientAllocation` and its table.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::Amount;

/// Cumulative allocation state of a single recipient.
///
/// Both counters only grow: a grant adds to `allocated`, a withdrawal adds to
/// `withdrawn`. The engine keeps `allocated >= withdrawn` at all times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientAllocation {
    pub recipient: String,
    pub allocated: Amount,
    pub withdrawn: Amount,
    pub last_auto_withdraw_at: Option<DateTime<Utc>>,
}

impl RecipientAllocation {
    /// State of a recipient that was never granted anything.
    pub fn empty(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            allocated: Amount::ZERO,
            withdrawn: Amount::ZERO,
            last_auto_withdraw_at: None,
        }
    }

    /// The spendable remainder, `allocated - withdrawn`.
    pub fn available(&self) -> Amount {
        self.allocated.saturating_remaining(self.withdrawn)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub recipient: String,
    pub allocated: i64,
    pub withdrawn: i64,
    pub last_auto_withdraw_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::grants::Entity")]
    Grants,
    #[sea_orm(has_many = "super::withdrawals::Entity")]
    Withdrawals,
}

impl Related<super::grants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Grants.def()
    }
}

impl Related<super::withdrawals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Withdrawals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RecipientAllocation {
    fn from(model: Model) -> Self {
        Self {
            recipient: model.recipient,
            allocated: Amount::new(model.allocated),
            withdrawn: Amount::new(model.withdrawn),
            last_auto_withdraw_at: model.last_auto_withdraw_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_allocated_minus_withdrawn() {
        let mut alloc = RecipientAllocation::empty("r");
        assert_eq!(alloc.available(), Amount::ZERO);

        alloc.allocated = Amount::new(2_000_000);
        alloc.withdrawn = Amount::new(500_000);
        assert_eq!(alloc.available(), Amount::new(1_500_000));
    }
}
