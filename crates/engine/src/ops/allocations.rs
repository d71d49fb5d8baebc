use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    AllocationGrant, Amount, EngineError, IncreaseAllocationCmd, RecipientAllocation,
    ResultEngine, allocations, grants, policy,
};

use super::{Engine, add_checked, normalize_identity, normalize_optional_text, with_tx};

impl Engine {
    /// Grants `amount` more to a recipient.
    ///
    /// Allocations are additive: a second grant of the same amount doubles the
    /// allocation, it never replaces it. Only the pool admin may call this
    /// (`NotAdmin` otherwise).
    ///
    /// With `request_id` set, the grant is idempotent: if a grant for that
    /// request is already recorded it is returned unchanged and the allocation
    /// is not touched again. A recorded grant for the same request but a
    /// different recipient or amount is reported as `ExistingKey`.
    pub async fn increase_allocation(
        &self,
        cmd: IncreaseAllocationCmd,
    ) -> ResultEngine<AllocationGrant> {
        let recipient = normalize_identity(&cmd.recipient, "recipient")?;
        let caller = cmd.caller.trim().to_string();
        let note = normalize_optional_text(cmd.note.as_deref());

        let _guard = self.write_lock.lock().await;
        let grant: ResultEngine<AllocationGrant> = with_tx!(self, |db_tx| {
            let pool = self.require_pool(&db_tx).await?;
            if let Err(err) = policy::can_increase_allocation(&pool, &caller, cmd.amount) {
                if matches!(err, EngineError::NotAdmin(_)) {
                    tracing::warn!(
                        caller = %caller,
                        recipient = %recipient,
                        "allocation rejected: caller is not the admin"
                    );
                }
                return Err(err);
            }

            if let Some(request_id) = cmd.request_id {
                let existing = grants::Entity::find()
                    .filter(grants::Column::RequestId.eq(request_id.to_string()))
                    .one(&db_tx)
                    .await?;
                if let Some(existing) = existing {
                    let grant = AllocationGrant::try_from(existing)?;
                    if grant.recipient != recipient || grant.amount != cmd.amount {
                        return Err(EngineError::ExistingKey(format!(
                            "request {request_id} already granted with different terms"
                        )));
                    }
                    return Ok(grant);
                }
            }

            match self.find_allocation(&db_tx, &recipient).await? {
                Some(model) => {
                    let allocated =
                        add_checked(Amount::new(model.allocated), cmd.amount, "allocation")?;
                    let active = allocations::ActiveModel {
                        recipient: ActiveValue::Set(recipient.clone()),
                        allocated: ActiveValue::Set(allocated.micros()),
                        ..Default::default()
                    };
                    active.update(&db_tx).await?;
                }
                None => {
                    let active = allocations::ActiveModel {
                        recipient: ActiveValue::Set(recipient.clone()),
                        allocated: ActiveValue::Set(cmd.amount.micros()),
                        withdrawn: ActiveValue::Set(0),
                        last_auto_withdraw_at: ActiveValue::Set(None),
                        created_at: ActiveValue::Set(cmd.occurred_at),
                    };
                    active.insert(&db_tx).await?;
                }
            }

            let grant = AllocationGrant {
                id: Uuid::new_v4(),
                recipient: recipient.clone(),
                amount: cmd.amount,
                granted_by: caller.clone(),
                request_id: cmd.request_id,
                note,
                occurred_at: cmd.occurred_at,
            };
            grants::ActiveModel::from(&grant).insert(&db_tx).await?;

            Ok(grant)
        });
        let grant = grant?;

        tracing::info!(
            grant_id = %grant.id,
            recipient = %grant.recipient,
            amount = %grant.amount,
            request_id = ?grant.request_id,
            "allocation increased"
        );
        Ok(grant)
    }

    /// Return the allocation state of a recipient from DB.
    ///
    /// A recipient that was never granted anything reads as all zeros.
    pub async fn recipient(&self, recipient: &str) -> ResultEngine<RecipientAllocation> {
        let recipient = recipient.trim();
        with_tx!(self, |db_tx| {
            let allocation = self
                .find_allocation(&db_tx, recipient)
                .await?
                .map(RecipientAllocation::from)
                .unwrap_or_else(|| RecipientAllocation::empty(recipient));
            Ok(allocation)
        })
    }

    /// Cumulative amount ever granted to `recipient`.
    pub async fn allocation_of(&self, recipient: &str) -> ResultEngine<Amount> {
        Ok(self.recipient(recipient).await?.allocated)
    }

    /// Cumulative amount `recipient` has withdrawn.
    pub async fn withdrawn_of(&self, recipient: &str) -> ResultEngine<Amount> {
        Ok(self.recipient(recipient).await?.withdrawn)
    }

    /// The grant recorded for a funding request, if its allocation increase
    /// was committed.
    pub async fn grant_for_request(
        &self,
        request_id: Uuid,
    ) -> ResultEngine<Option<AllocationGrant>> {
        with_tx!(self, |db_tx| {
            grants::Entity::find()
                .filter(grants::Column::RequestId.eq(request_id.to_string()))
                .one(&db_tx)
                .await?
                .map(AllocationGrant::try_from)
                .transpose()
        })
    }

    /// Grants received by `recipient`, oldest first.
    pub async fn grants_for(&self, recipient: &str) -> ResultEngine<Vec<AllocationGrant>> {
        with_tx!(self, |db_tx| {
            let models = grants::Entity::find()
                .filter(grants::Column::Recipient.eq(recipient.trim().to_string()))
                .order_by_asc(grants::Column::OccurredAt)
                .order_by_asc(grants::Column::Id)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(AllocationGrant::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
