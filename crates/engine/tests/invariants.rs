use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use sea_orm::Database;

use engine::{
    Amount, DonateCmd, Engine, EngineError, IncreaseAllocationCmd, PoolConfig, WithdrawCmd,
};
use migration::MigratorTrait;

const DONORS: [&str; 3] = ["d0", "d1", "d2"];
const RECIPIENTS: [&str; 3] = ["r0", "r1", "r2"];
const CALLERS: [&str; 2] = ["admin", "mallory"];

#[derive(Clone, Debug)]
enum Op {
    Donate { donor: usize, micros: i64 },
    Grant { caller: usize, recipient: usize, micros: i64 },
    Withdraw { recipient: usize, micros: i64 },
}

// ── Helpers ─────────────────────────────────────────────────────────

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..DONORS.len(), -1_000i64..3_000_000)
            .prop_map(|(donor, micros)| Op::Donate { donor, micros }),
        (0..CALLERS.len(), 0..RECIPIENTS.len(), 0i64..2_000_000).prop_map(
            |(caller, recipient, micros)| Op::Grant {
                caller,
                recipient,
                micros
            }
        ),
        (0..RECIPIENTS.len(), 0i64..1_500_000)
            .prop_map(|(recipient, micros)| Op::Withdraw { recipient, micros }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn fresh_engine() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    engine
        .init_pool(PoolConfig::new(
            "admin",
            Amount::new(10_000),
            Amount::new(1_000_000),
        ))
        .await
        .unwrap();
    engine
}

fn assert_rejection(err: &EngineError) {
    assert!(
        err.is_policy_rejection() || matches!(err, EngineError::InvalidAmount(_)),
        "unexpected error: {err:?}"
    );
}

async fn run_sequence(ops: Vec<Op>) {
    let engine = fresh_engine().await;
    let mut donated = Amount::ZERO;
    let mut withdrawn = Amount::ZERO;
    let mut allocated: HashMap<&str, Amount> = HashMap::new();

    for op in ops {
        match op {
            Op::Donate { donor, micros } => {
                let cmd = DonateCmd::new(DONORS[donor], Amount::new(micros), Utc::now());
                match engine.donate(cmd).await {
                    Ok(_) => donated = donated.checked_add(Amount::new(micros)).unwrap(),
                    Err(err) => assert_rejection(&err),
                }
            }
            Op::Grant {
                caller,
                recipient,
                micros,
            } => {
                let cmd = IncreaseAllocationCmd::new(
                    CALLERS[caller],
                    RECIPIENTS[recipient],
                    Amount::new(micros),
                    Utc::now(),
                );
                match engine.increase_allocation(cmd).await {
                    Ok(_) => {
                        assert_eq!(CALLERS[caller], "admin");
                        let slot = allocated.entry(RECIPIENTS[recipient]).or_default();
                        *slot = slot.checked_add(Amount::new(micros)).unwrap();
                    }
                    Err(err) => assert_rejection(&err),
                }
            }
            Op::Withdraw { recipient, micros } => {
                let cmd = WithdrawCmd::new(RECIPIENTS[recipient], Amount::new(micros), Utc::now());
                match engine.withdraw(cmd).await {
                    Ok(_) => withdrawn = withdrawn.checked_add(Amount::new(micros)).unwrap(),
                    Err(err) => assert_rejection(&err),
                }
            }
        }

        // Conservation.
        let pool = engine.pool().await.unwrap();
        assert_eq!(pool.total_donated, donated);
        assert_eq!(pool.total_withdrawn, withdrawn);
        assert_eq!(pool.total_balance, donated.checked_sub(withdrawn).unwrap());
        assert!(pool.total_balance >= Amount::ZERO);

        for recipient in RECIPIENTS {
            let state = engine.recipient(recipient).await.unwrap();
            assert!(state.allocated >= state.withdrawn);
            assert_eq!(
                state.allocated,
                allocated.get(recipient).copied().unwrap_or_default()
            );
        }
    }

    let report = engine.audit().await.unwrap();
    assert!(report.is_consistent(), "{:?}", report.mismatches);
}

// ── Random operation sequences ──────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn ledger_invariants_hold_for_any_sequence(ops in prop::collection::vec(op(), 1..30)) {
        runtime().block_on(run_sequence(ops));
    }
}
