//! The module contains the `Pool` singleton and its configuration.

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};

use crate::{Amount, EngineError, ResultEngine};

/// Primary key of the single pool row.
pub(crate) const POOL_ID: i32 = 1;

/// Withdrawals at or below this amount are classified as self-service
/// (`0.029` units).
pub const DEFAULT_AUTO_CEILING: Amount = Amount::new(29_000);

/// Snapshot of the pooled fund.
///
/// `total_balance` is a denormalized counter kept equal to
/// `total_donated - total_withdrawn` by every committed operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    /// The single identity allowed to grant allocations.
    pub admin: String,
    pub total_balance: Amount,
    pub total_donated: Amount,
    pub total_withdrawn: Amount,
    /// Lower bound accepted per donation.
    pub min_donation: Amount,
    /// Upper bound per single withdrawal call.
    pub withdrawal_limit: Amount,
    pub auto_ceiling: Amount,
    /// Minimum spacing between two auto withdrawals of the same recipient.
    /// `None` keeps the ceiling a pure classification.
    pub auto_cooldown: Option<Duration>,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    pub fn is_admin(&self, caller: &str) -> bool {
        self.admin == caller
    }
}

/// Parameters fixed when the pool is created.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub admin: String,
    pub min_donation: Amount,
    pub withdrawal_limit: Amount,
    pub auto_ceiling: Amount,
    pub auto_cooldown_secs: Option<i64>,
}

impl PoolConfig {
    #[must_use]
    pub fn new(admin: impl Into<String>, min_donation: Amount, withdrawal_limit: Amount) -> Self {
        Self {
            admin: admin.into(),
            min_donation,
            withdrawal_limit,
            auto_ceiling: DEFAULT_AUTO_CEILING,
            auto_cooldown_secs: None,
        }
    }

    #[must_use]
    pub fn auto_ceiling(mut self, ceiling: Amount) -> Self {
        self.auto_ceiling = ceiling;
        self
    }

    #[must_use]
    pub fn auto_cooldown_secs(mut self, secs: i64) -> Self {
        self.auto_cooldown_secs = Some(secs);
        self
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        if self.admin.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "admin identity must not be empty".to_string(),
            ));
        }
        if !self.min_donation.is_positive() {
            return Err(EngineError::InvalidAmount(
                "min_donation must be > 0".to_string(),
            ));
        }
        if !self.withdrawal_limit.is_positive() {
            return Err(EngineError::InvalidAmount(
                "withdrawal_limit must be > 0".to_string(),
            ));
        }
        if self.auto_ceiling.micros() < 0 {
            return Err(EngineError::InvalidAmount(
                "auto_ceiling must be >= 0".to_string(),
            ));
        }
        if let Some(secs) = self.auto_cooldown_secs {
            if secs <= 0 {
                return Err(EngineError::InvalidInput(
                    "auto_cooldown_secs must be > 0".to_string(),
                ));
            }
            cooldown_from_secs(secs)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pool")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub admin: String,
    pub total_balance: i64,
    pub total_donated: i64,
    pub total_withdrawn: i64,
    pub min_donation: i64,
    pub withdrawal_limit: i64,
    pub auto_ceiling: i64,
    pub auto_cooldown_secs: Option<i64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn cooldown_from_secs(secs: i64) -> ResultEngine<Duration> {
    Duration::try_seconds(secs).ok_or_else(|| {
        EngineError::InvalidInput(format!("auto_cooldown_secs {secs} is out of range"))
    })
}

impl TryFrom<Model> for Pool {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let auto_cooldown = model.auto_cooldown_secs.map(cooldown_from_secs).transpose()?;
        Ok(Self {
            admin: model.admin,
            total_balance: Amount::new(model.total_balance),
            total_donated: Amount::new(model.total_donated),
            total_withdrawn: Amount::new(model.total_withdrawn),
            min_donation: Amount::new(model.min_donation),
            withdrawal_limit: Amount::new(model.withdrawal_limit),
            auto_ceiling: Amount::new(model.auto_ceiling),
            auto_cooldown,
            created_at: model.created_at,
        })
    }
}

impl ActiveModel {
    pub(crate) fn from_config(config: &PoolConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ActiveValue::Set(POOL_ID),
            admin: ActiveValue::Set(config.admin.trim().to_string()),
            total_balance: ActiveValue::Set(0),
            total_donated: ActiveValue::Set(0),
            total_withdrawn: ActiveValue::Set(0),
            min_donation: ActiveValue::Set(config.min_donation.micros()),
            withdrawal_limit: ActiveValue::Set(config.withdrawal_limit.micros()),
            auto_ceiling: ActiveValue::Set(config.auto_ceiling.micros()),
            auto_cooldown_secs: ActiveValue::Set(config.auto_cooldown_secs),
            created_at: ActiveValue::Set(created_at),
        }
    }

    /// Only the running counters change after creation.
    pub(crate) fn counters(pool: &Pool) -> Self {
        Self {
            id: ActiveValue::Set(POOL_ID),
            total_balance: ActiveValue::Set(pool.total_balance.micros()),
            total_donated: ActiveValue::Set(pool.total_donated.micros()),
            total_withdrawn: ActiveValue::Set(pool.total_withdrawn.micros()),
            ..Default::default()
        }
    }
}
