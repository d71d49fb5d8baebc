use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    Amount, DonateCmd, Donation, Donor, ResultEngine, donations, donors, policy, pool,
};

use super::{Engine, add_checked, normalize_identity, with_tx};

impl Engine {
    /// Accepts a donation into the pool.
    ///
    /// On success the donor's running total and the pool balance grow by
    /// `amount` and one donation event is appended; a donation under
    /// `min_donation` is rejected with `BelowMinimum` and nothing changes.
    pub async fn donate(&self, cmd: DonateCmd) -> ResultEngine<Donation> {
        let donor = normalize_identity(&cmd.donor, "donor")?;
        let _guard = self.write_lock.lock().await;
        let donation: ResultEngine<Donation> = with_tx!(self, |db_tx| {
            let mut pool = self.require_pool(&db_tx).await?;
            policy::can_donate(&pool, cmd.amount)?;

            pool.total_donated = add_checked(pool.total_donated, cmd.amount, "total donated")?;
            pool.total_balance = add_checked(pool.total_balance, cmd.amount, "pool balance")?;

            match donors::Entity::find_by_id(donor.clone()).one(&db_tx).await? {
                Some(model) => {
                    let total = add_checked(
                        Amount::new(model.total_donated),
                        cmd.amount,
                        "donor total",
                    )?;
                    let active = donors::ActiveModel {
                        donor: ActiveValue::Set(donor.clone()),
                        total_donated: ActiveValue::Set(total.micros()),
                        last_donated_at: ActiveValue::Set(cmd.occurred_at),
                        ..Default::default()
                    };
                    active.update(&db_tx).await?;
                }
                None => {
                    let active = donors::ActiveModel {
                        donor: ActiveValue::Set(donor.clone()),
                        total_donated: ActiveValue::Set(cmd.amount.micros()),
                        first_donated_at: ActiveValue::Set(cmd.occurred_at),
                        last_donated_at: ActiveValue::Set(cmd.occurred_at),
                    };
                    active.insert(&db_tx).await?;
                }
            }

            let donation = Donation::new(donor.clone(), cmd.amount, cmd.occurred_at);
            donations::ActiveModel::from(&donation).insert(&db_tx).await?;
            pool::ActiveModel::counters(&pool).update(&db_tx).await?;

            Ok(donation)
        });
        let donation = donation?;

        tracing::info!(
            donation_id = %donation.id,
            donor = %donation.donor,
            amount = %donation.amount,
            "donation accepted"
        );
        Ok(donation)
    }

    /// Total donated by `donor`; zero for an identity that never donated.
    pub async fn donation_of(&self, donor: &str) -> ResultEngine<Amount> {
        Ok(self
            .donor(donor)
            .await?
            .map_or(Amount::ZERO, |d| d.total_donated))
    }

    /// Return a donor record from DB, if the donor ever donated.
    pub async fn donor(&self, donor: &str) -> ResultEngine<Option<Donor>> {
        with_tx!(self, |db_tx| {
            let model = donors::Entity::find_by_id(donor.trim().to_string())
                .one(&db_tx)
                .await?;
            Ok(model.map(Donor::from))
        })
    }

    /// Donation events of `donor`, oldest first.
    pub async fn donations_of(&self, donor: &str) -> ResultEngine<Vec<Donation>> {
        with_tx!(self, |db_tx| {
            let models = donations::Entity::find()
                .filter(donations::Column::Donor.eq(donor.trim().to_string()))
                .order_by_asc(donations::Column::OccurredAt)
                .order_by_asc(donations::Column::Id)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(Donation::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
