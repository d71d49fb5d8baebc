use sea_orm::{DatabaseConnection, DatabaseTransaction, prelude::*};
use tokio::sync::Mutex;

use crate::{Amount, EngineError, Pool, ResultEngine};

mod allocations;
mod audit;
mod donations;
mod pool;
mod withdrawals;

pub use audit::AuditReport;
pub use withdrawals::WithdrawalListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The fund ledger.
///
/// Every mutation takes `write_lock` before opening its DB transaction, so
/// validation and commit of one operation never interleave with another.
/// Reads only open a transaction and never wait on the lock.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    write_lock: Mutex<()>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) async fn require_pool(&self, db: &DatabaseTransaction) -> ResultEngine<Pool> {
        crate::pool::Entity::find_by_id(crate::pool::POOL_ID)
            .one(db)
            .await?
            .map(Pool::try_from)
            .transpose()?
            .ok_or(EngineError::NotInitialized)
    }

    pub(crate) async fn find_allocation(
        &self,
        db: &DatabaseTransaction,
        recipient: &str,
    ) -> ResultEngine<Option<crate::allocations::Model>> {
        crate::allocations::Entity::find_by_id(recipient.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }
}

/// Trim an identity and reject empty ones.
pub(crate) fn normalize_identity(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} identity must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn add_checked(lhs: Amount, rhs: Amount, label: &str) -> ResultEngine<Amount> {
    lhs.checked_add(rhs)
        .ok_or_else(|| EngineError::InvalidAmount(format!("{label} overflow")))
}

pub(crate) fn sub_checked(lhs: Amount, rhs: Amount, label: &str) -> ResultEngine<Amount> {
    match lhs.checked_sub(rhs) {
        Some(value) if value.micros() >= 0 => Ok(value),
        _ => Err(EngineError::InvalidAmount(format!(
            "{label} would go negative"
        ))),
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            write_lock: Mutex::new(()),
        })
    }
}
