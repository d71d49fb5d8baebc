use std::collections::HashMap;

use sea_orm::{TransactionTrait, prelude::*};

use crate::{Amount, EngineError, ResultEngine, allocations, donations, donors, grants, withdrawals};

use super::{Engine, add_checked, with_tx};

/// Result of replaying the append-only logs against the running counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub total_balance: Amount,
    /// `Σ donations - Σ withdrawals` as replayed from the logs.
    pub replayed_balance: Amount,
    pub donors: usize,
    pub recipients: usize,
    /// Human readable description of every counter that disagrees with its
    /// log, or that breaks `allocated >= withdrawn`.
    pub mismatches: Vec<String>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn sum_by<I>(rows: I) -> ResultEngine<HashMap<String, Amount>>
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut out: HashMap<String, Amount> = HashMap::new();
    for (key, micros) in rows {
        let entry = out.entry(key).or_default();
        *entry = add_checked(*entry, Amount::new(micros), "replayed total")?;
    }
    Ok(out)
}

fn total(values: &HashMap<String, Amount>) -> ResultEngine<Amount> {
    values
        .values()
        .try_fold(Amount::ZERO, |acc, v| add_checked(acc, *v, "replayed total"))
}

impl Engine {
    /// Recomputes every denormalized counter from the donation, grant and
    /// withdrawal logs and reports where they disagree.
    ///
    /// Read-only: nothing is repaired here. A consistent ledger satisfies
    /// `total_balance == Σ donations - Σ withdrawals` and, per recipient,
    /// `allocated == Σ grants >= withdrawn == Σ withdrawals`.
    pub async fn audit(&self) -> ResultEngine<AuditReport> {
        with_tx!(self, |db_tx| {
            let pool = self.require_pool(&db_tx).await?;

            let donated_by = sum_by(
                donations::Entity::find()
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|m| (m.donor, m.amount)),
            )?;
            let granted_to = sum_by(
                grants::Entity::find()
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|m| (m.recipient, m.amount)),
            )?;
            let withdrawn_by = sum_by(
                withdrawals::Entity::find()
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|m| (m.recipient, m.amount)),
            )?;

            let donated = total(&donated_by)?;
            let withdrawn = total(&withdrawn_by)?;
            let replayed_balance = donated.checked_sub(withdrawn).ok_or_else(|| {
                EngineError::InvalidAmount("replayed balance overflow".to_string())
            })?;

            let mut mismatches = Vec::new();
            if pool.total_donated != donated {
                mismatches.push(format!(
                    "pool total_donated is {}, donation log sums to {donated}",
                    pool.total_donated
                ));
            }
            if pool.total_withdrawn != withdrawn {
                mismatches.push(format!(
                    "pool total_withdrawn is {}, withdrawal log sums to {withdrawn}",
                    pool.total_withdrawn
                ));
            }
            if pool.total_balance != replayed_balance {
                mismatches.push(format!(
                    "pool total_balance is {}, logs give {replayed_balance}",
                    pool.total_balance
                ));
            }
            if replayed_balance.micros() < 0 {
                mismatches.push(format!("replayed balance is negative: {replayed_balance}"));
            }

            let donor_models = donors::Entity::find().all(&db_tx).await?;
            for model in &donor_models {
                let logged = donated_by.get(&model.donor).copied().unwrap_or_default();
                if Amount::new(model.total_donated) != logged {
                    mismatches.push(format!(
                        "donor {} total is {}, log sums to {logged}",
                        model.donor,
                        Amount::new(model.total_donated)
                    ));
                }
            }

            let allocation_models = allocations::Entity::find().all(&db_tx).await?;
            for model in &allocation_models {
                let allocated = Amount::new(model.allocated);
                let withdrawn = Amount::new(model.withdrawn);
                let granted = granted_to.get(&model.recipient).copied().unwrap_or_default();
                let paid = withdrawn_by.get(&model.recipient).copied().unwrap_or_default();
                if allocated != granted {
                    mismatches.push(format!(
                        "recipient {} allocated is {allocated}, grant log sums to {granted}",
                        model.recipient
                    ));
                }
                if withdrawn != paid {
                    mismatches.push(format!(
                        "recipient {} withdrawn is {withdrawn}, withdrawal log sums to {paid}",
                        model.recipient
                    ));
                }
                if withdrawn > allocated {
                    mismatches.push(format!(
                        "recipient {} withdrew {withdrawn} of {allocated} allocated",
                        model.recipient
                    ));
                }
            }
            for recipient in withdrawn_by.keys() {
                if !allocation_models.iter().any(|m| &m.recipient == recipient) {
                    mismatches.push(format!("withdrawals logged for unknown recipient {recipient}"));
                }
            }

            if !mismatches.is_empty() {
                tracing::warn!(count = mismatches.len(), "ledger audit found mismatches");
            }

            Ok(AuditReport {
                total_balance: pool.total_balance,
                replayed_balance,
                donors: donor_models.len(),
                recipients: allocation_models.len(),
                mismatches,
            })
        })
    }
}
