use chrono::Utc;

use sea_orm::{TransactionTrait, prelude::*};

use crate::{Amount, EngineError, Pool, PoolConfig, ResultEngine, pool};

use super::{Engine, with_tx};

impl Engine {
    /// Creates the pool singleton.
    ///
    /// Limits and the admin identity are fixed from here on; calling this on
    /// an initialized ledger fails with `ExistingKey` and changes nothing.
    pub async fn init_pool(&self, config: PoolConfig) -> ResultEngine<Pool> {
        config.validate()?;
        let _guard = self.write_lock.lock().await;
        let created: ResultEngine<Pool> = with_tx!(self, |db_tx| {
            let exists = pool::Entity::find_by_id(pool::POOL_ID)
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey("pool".to_string()));
            }

            let model = pool::ActiveModel::from_config(&config, Utc::now())
                .insert(&db_tx)
                .await?;
            Pool::try_from(model)
        });
        let created = created?;

        tracing::info!(
            admin = %created.admin,
            min_donation = %created.min_donation,
            withdrawal_limit = %created.withdrawal_limit,
            auto_ceiling = %created.auto_ceiling,
            "pool initialized"
        );
        Ok(created)
    }

    /// Returns `true` once `init_pool` has committed.
    pub async fn is_initialized(&self) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            let exists = pool::Entity::find_by_id(pool::POOL_ID)
                .one(&db_tx)
                .await?
                .is_some();
            Ok(exists)
        })
    }

    /// Return a pool snapshot from DB.
    pub async fn pool(&self) -> ResultEngine<Pool> {
        with_tx!(self, |db_tx| self.require_pool(&db_tx).await)
    }

    /// Value currently held by the pool.
    pub async fn total_balance(&self) -> ResultEngine<Amount> {
        Ok(self.pool().await?.total_balance)
    }

    /// Sum of every accepted donation, independent of later withdrawals.
    pub async fn total_donations(&self) -> ResultEngine<Amount> {
        Ok(self.pool().await?.total_donated)
    }
}
