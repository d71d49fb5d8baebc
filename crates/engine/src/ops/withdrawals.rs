use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};

use crate::{
    EngineError, RecipientAllocation, ResultEngine, WithdrawCmd, WithdrawalEvent, WithdrawalKind,
    allocations, policy, pool, withdrawals,
};

use super::{Engine, add_checked, normalize_identity, sub_checked, with_tx};

/// Filters for listing withdrawal events.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct WithdrawalListFilter {
    pub recipient: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, only events of this kind are returned.
    pub kind: Option<WithdrawalKind>,
}

fn validate_list_filter(filter: &WithdrawalListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidInput(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

trait ApplyWithdrawalFilters: QueryFilter + Sized {
    fn apply_withdrawal_filters(self, filter: &WithdrawalListFilter) -> Self;
}

impl<T> ApplyWithdrawalFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_withdrawal_filters(mut self, filter: &WithdrawalListFilter) -> Self {
        if let Some(recipient) = filter.recipient.as_deref() {
            self = self.filter(withdrawals::Column::Recipient.eq(recipient.trim().to_string()));
        }
        if let Some(from) = filter.from {
            self = self.filter(withdrawals::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(withdrawals::Column::OccurredAt.lt(to));
        }
        if let Some(kind) = filter.kind {
            self = self.filter(withdrawals::Column::Kind.eq(kind.as_str()));
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WithdrawalsCursor {
    occurred_at: DateTime<Utc>,
    withdrawal_id: String,
}

impl WithdrawalsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid withdrawals cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid withdrawals cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid withdrawals cursor".to_string()))
    }
}

impl Engine {
    /// Withdraws against the recipient's own allocation.
    ///
    /// The checks of [`policy::can_withdraw`] run against the state read in
    /// the same transaction and under the engine write lock, so two
    /// concurrent withdrawals by one recipient cannot both pass the
    /// remaining-allocation check. On success the recipient's `withdrawn`
    /// and the pool balance move together and one classified event is
    /// appended.
    pub async fn withdraw(&self, cmd: WithdrawCmd) -> ResultEngine<WithdrawalEvent> {
        let recipient = normalize_identity(&cmd.recipient, "recipient")?;
        let _guard = self.write_lock.lock().await;
        let event: ResultEngine<WithdrawalEvent> = with_tx!(self, |db_tx| {
            let mut pool = self.require_pool(&db_tx).await?;
            let allocation = self
                .find_allocation(&db_tx, &recipient)
                .await?
                .map(RecipientAllocation::from)
                .unwrap_or_else(|| RecipientAllocation::empty(recipient.clone()));

            let kind = match policy::can_withdraw(&pool, &allocation, cmd.amount, cmd.occurred_at)
            {
                Ok(kind) => kind,
                Err(err) => {
                    tracing::info!(
                        recipient = %recipient,
                        amount = %cmd.amount,
                        "withdrawal rejected: {err}"
                    );
                    return Err(err);
                }
            };

            let withdrawn = add_checked(allocation.withdrawn, cmd.amount, "withdrawn")?;
            pool.total_withdrawn =
                add_checked(pool.total_withdrawn, cmd.amount, "total withdrawn")?;
            pool.total_balance = sub_checked(pool.total_balance, cmd.amount, "pool balance")?;

            let last_auto_withdraw_at = match kind {
                WithdrawalKind::Auto => ActiveValue::Set(Some(cmd.occurred_at)),
                WithdrawalKind::Approved => ActiveValue::NotSet,
            };
            let active = allocations::ActiveModel {
                recipient: ActiveValue::Set(recipient.clone()),
                withdrawn: ActiveValue::Set(withdrawn.micros()),
                last_auto_withdraw_at,
                ..Default::default()
            };
            active.update(&db_tx).await?;

            let event = WithdrawalEvent::new(recipient.clone(), cmd.amount, kind, cmd.occurred_at);
            withdrawals::ActiveModel::from(&event).insert(&db_tx).await?;
            pool::ActiveModel::counters(&pool).update(&db_tx).await?;

            Ok(event)
        });

        let event = event?;

        tracing::info!(
            withdrawal_id = %event.id,
            recipient = %event.recipient,
            amount = %event.amount,
            kind = event.kind.as_str(),
            "withdrawal committed"
        );
        Ok(event)
    }

    /// Lists withdrawal events, with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, id DESC)`.
    pub async fn list_withdrawals_page(
        &self,
        filter: &WithdrawalListFilter,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<WithdrawalEvent>, Option<String>)> {
        validate_list_filter(filter)?;
        with_tx!(self, |db_tx| {
            let limit_plus_one = limit.saturating_add(1);
            let mut query = withdrawals::Entity::find()
                .order_by_desc(withdrawals::Column::OccurredAt)
                .order_by_desc(withdrawals::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = WithdrawalsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(withdrawals::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(withdrawals::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(withdrawals::Column::Id.lt(cursor.withdrawal_id)),
                        ),
                );
            }
            query = query.apply_withdrawal_filters(filter);

            let rows: Vec<withdrawals::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let out = rows
                .into_iter()
                .take(limit as usize)
                .map(WithdrawalEvent::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            let next_cursor = if has_more {
                out.last()
                    .map(|event| WithdrawalsCursor {
                        occurred_at: event.occurred_at,
                        withdrawal_id: event.id.to_string(),
                    })
                    .map(|c| c.encode())
                    .transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    /// Withdrawal events of `recipient` in `[from, to)`, oldest first.
    ///
    /// Used to match funding requests against what was actually paid out.
    pub async fn withdrawals_for_audit(
        &self,
        recipient: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ResultEngine<Vec<WithdrawalEvent>> {
        let filter = WithdrawalListFilter {
            recipient: Some(recipient.to_string()),
            from: Some(from),
            to: Some(to),
            kind: None,
        };
        validate_list_filter(&filter)?;
        with_tx!(self, |db_tx| {
            let rows = withdrawals::Entity::find()
                .apply_withdrawal_filters(&filter)
                .order_by_asc(withdrawals::Column::OccurredAt)
                .order_by_asc(withdrawals::Column::Id)
                .all(&db_tx)
                .await?;
            rows.into_iter()
                .map(WithdrawalEvent::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
