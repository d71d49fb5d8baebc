//! Authorization policy.
//!
//! Pure decision functions: given a ledger snapshot and a proposed operation
//! they either accept or return the specific rejection. Nothing here touches
//! the database; the engine calls these inside the same transaction that
//! commits the change, so the snapshot cannot be stale.

use chrono::{DateTime, Utc};

use crate::{Amount, EngineError, Pool, RecipientAllocation, ResultEngine, WithdrawalKind};

fn require_positive(amount: Amount) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
    }
    Ok(())
}

/// Accepts a donation iff `amount >= min_donation`.
pub fn can_donate(pool: &Pool, amount: Amount) -> ResultEngine<()> {
    require_positive(amount)?;
    if amount < pool.min_donation {
        return Err(EngineError::BelowMinimum(format!(
            "{amount} is below the minimum of {}",
            pool.min_donation
        )));
    }
    Ok(())
}

/// Accepts an allocation increase iff the caller is the admin.
///
/// There is no upper bound on the granted amount.
pub fn can_increase_allocation(pool: &Pool, caller: &str, amount: Amount) -> ResultEngine<()> {
    if !pool.is_admin(caller) {
        return Err(EngineError::NotAdmin(caller.to_string()));
    }
    require_positive(amount)
}

/// Classifies a withdrawal for the audit log.
pub fn classify_withdrawal(pool: &Pool, amount: Amount) -> WithdrawalKind {
    if amount <= pool.auto_ceiling {
        WithdrawalKind::Auto
    } else {
        WithdrawalKind::Approved
    }
}

/// Accepts a withdrawal by `allocation.recipient` and returns its
/// classification.
///
/// Checks, in order: positive amount, single-call limit, remaining
/// allocation, pool balance and, when the pool has one, the auto cooldown.
/// The single-call limit and the remaining allocation are independent: a
/// request can pass one and fail the other.
pub fn can_withdraw(
    pool: &Pool,
    allocation: &RecipientAllocation,
    amount: Amount,
    now: DateTime<Utc>,
) -> ResultEngine<WithdrawalKind> {
    require_positive(amount)?;
    if amount > pool.withdrawal_limit {
        return Err(EngineError::ExceedsSingleLimit(format!(
            "{amount} is over the limit of {}",
            pool.withdrawal_limit
        )));
    }
    let available = allocation.available();
    if amount > available {
        return Err(EngineError::ExceedsRemainingAllocation(format!(
            "{amount} requested, {available} available"
        )));
    }
    if amount > pool.total_balance {
        return Err(EngineError::InsufficientPoolBalance(format!(
            "{amount} requested, pool holds {}",
            pool.total_balance
        )));
    }

    let kind = classify_withdrawal(pool, amount);
    if kind == WithdrawalKind::Auto
        && let (Some(cooldown), Some(last)) = (pool.auto_cooldown, allocation.last_auto_withdraw_at)
    {
        match last.checked_add_signed(cooldown) {
            Some(next_allowed) if now < next_allowed => {
                return Err(EngineError::CooldownActive(format!(
                    "next auto withdrawal allowed at {}",
                    next_allowed.to_rfc3339()
                )));
            }
            Some(_) => {}
            None => {
                return Err(EngineError::CooldownActive(format!(
                    "cooldown of {}s after {} does not end",
                    cooldown.num_seconds(),
                    last.to_rfc3339()
                )));
            }
        }
    }

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::DEFAULT_AUTO_CEILING;

    fn units(raw: &str) -> Amount {
        raw.parse().unwrap()
    }

    fn pool() -> Pool {
        Pool {
            admin: "admin".to_string(),
            total_balance: units("10"),
            total_donated: units("10"),
            total_withdrawn: Amount::ZERO,
            min_donation: units("0.01"),
            withdrawal_limit: units("1"),
            auto_ceiling: DEFAULT_AUTO_CEILING,
            auto_cooldown: None,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    fn allocation(allocated: &str, withdrawn: &str) -> RecipientAllocation {
        RecipientAllocation {
            recipient: "r".to_string(),
            allocated: units(allocated),
            withdrawn: units(withdrawn),
            last_auto_withdraw_at: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn donation_floor_is_inclusive() {
        let pool = pool();
        assert!(can_donate(&pool, units("0.01")).is_ok());
        assert!(matches!(
            can_donate(&pool, units("0.001")),
            Err(EngineError::BelowMinimum(_))
        ));
        assert!(matches!(
            can_donate(&pool, Amount::ZERO),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn only_admin_grants() {
        let pool = pool();
        assert!(can_increase_allocation(&pool, "admin", units("1000000")).is_ok());
        assert_eq!(
            can_increase_allocation(&pool, "mallory", units("0.5")),
            Err(EngineError::NotAdmin("mallory".to_string()))
        );
    }

    #[test]
    fn single_limit_checked_even_when_allocation_covers() {
        let pool = pool();
        let alloc = allocation("5", "0");
        assert!(matches!(
            can_withdraw(&pool, &alloc, units("1.1"), now()),
            Err(EngineError::ExceedsSingleLimit(_))
        ));
        assert_eq!(
            can_withdraw(&pool, &alloc, units("1"), now()),
            Ok(WithdrawalKind::Approved)
        );
    }

    #[test]
    fn remaining_allocation_checked_even_under_single_limit() {
        let pool = pool();
        let alloc = allocation("2", "1.8");
        assert_eq!(
            can_withdraw(&pool, &alloc, units("0.5"), now()),
            Err(EngineError::ExceedsRemainingAllocation(
                "0.5 requested, 0.2 available".to_string()
            ))
        );
    }

    #[test]
    fn pool_balance_is_last_cap() {
        let mut pool = pool();
        pool.total_balance = units("0.3");
        let alloc = allocation("2", "0");
        assert!(matches!(
            can_withdraw(&pool, &alloc, units("0.5"), now()),
            Err(EngineError::InsufficientPoolBalance(_))
        ));
    }

    #[test]
    fn classification_uses_inclusive_ceiling() {
        let pool = pool();
        assert_eq!(classify_withdrawal(&pool, units("0.029")), WithdrawalKind::Auto);
        assert_eq!(
            classify_withdrawal(&pool, units("0.029001")),
            WithdrawalKind::Approved
        );
    }

    #[test]
    fn auto_withdrawals_unlimited_without_cooldown() {
        let pool = pool();
        let mut alloc = allocation("1", "0");
        alloc.last_auto_withdraw_at = Some(now());
        assert_eq!(
            can_withdraw(&pool, &alloc, units("0.02"), now()),
            Ok(WithdrawalKind::Auto)
        );
    }

    #[test]
    fn cooldown_gates_only_auto_withdrawals() {
        let mut pool = pool();
        pool.auto_cooldown = Some(Duration::hours(24));
        let mut alloc = allocation("1", "0");
        alloc.last_auto_withdraw_at = Some(now() - Duration::hours(1));

        assert!(matches!(
            can_withdraw(&pool, &alloc, units("0.02"), now()),
            Err(EngineError::CooldownActive(_))
        ));
        assert_eq!(
            can_withdraw(&pool, &alloc, units("0.5"), now()),
            Ok(WithdrawalKind::Approved)
        );
        assert_eq!(
            can_withdraw(&pool, &alloc, units("0.02"), now() + Duration::hours(23)),
            Ok(WithdrawalKind::Auto)
        );
    }

    #[test]
    fn cooldown_past_the_end_of_time_stays_active() {
        let mut pool = pool();
        pool.auto_cooldown = Some(Duration::seconds(10_000_000_000_000));
        let mut alloc = allocation("1", "0");
        alloc.last_auto_withdraw_at = Some(now());

        assert!(matches!(
            can_withdraw(&pool, &alloc, units("0.01"), now() + Duration::days(365)),
            Err(EngineError::CooldownActive(_))
        ));
        assert_eq!(
            can_withdraw(&pool, &alloc, units("0.5"), now()),
            Ok(WithdrawalKind::Approved)
        );
    }
}
