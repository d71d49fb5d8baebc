use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Amount, DonateCmd, Engine, EngineError, IncreaseAllocationCmd, PoolConfig, WithdrawCmd,
    WithdrawalKind, WithdrawalListFilter,
};
use migration::MigratorTrait;
use uuid::Uuid;

fn units(raw: &str) -> Amount {
    raw.parse().unwrap()
}

fn config() -> PoolConfig {
    PoolConfig::new("admin", units("0.01"), units("1"))
}

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn initialized_engine() -> Engine {
    let (engine, _db) = engine_with_db().await;
    engine.init_pool(config()).await.unwrap();
    engine
}

async fn engine_with_file_db() -> (Engine, DatabaseConnection, String, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();

    (engine, db, url, path)
}

async fn donate(engine: &Engine, donor: &str, amount: &str) -> Result<(), EngineError> {
    engine
        .donate(DonateCmd::new(donor, units(amount), Utc::now()))
        .await
        .map(|_| ())
}

async fn grant(engine: &Engine, caller: &str, recipient: &str, amount: &str) -> Result<(), EngineError> {
    engine
        .increase_allocation(IncreaseAllocationCmd::new(
            caller,
            recipient,
            units(amount),
            Utc::now(),
        ))
        .await
        .map(|_| ())
}

async fn withdraw(
    engine: &Engine,
    recipient: &str,
    amount: &str,
) -> Result<WithdrawalKind, EngineError> {
    engine
        .withdraw(WithdrawCmd::new(recipient, units(amount), Utc::now()))
        .await
        .map(|event| event.kind)
}

#[tokio::test]
async fn operations_before_init_report_not_initialized() {
    let (engine, _db) = engine_with_db().await;

    assert!(!engine.is_initialized().await.unwrap());
    assert_eq!(
        donate(&engine, "bob", "1").await,
        Err(EngineError::NotInitialized)
    );
    assert_eq!(
        engine.total_balance().await,
        Err(EngineError::NotInitialized)
    );
    assert_eq!(
        withdraw(&engine, "alice", "0.01").await,
        Err(EngineError::NotInitialized)
    );
}

#[tokio::test]
async fn pool_can_only_be_initialized_once() {
    let (engine, _db) = engine_with_db().await;

    let pool = engine.init_pool(config()).await.unwrap();
    assert_eq!(pool.total_balance, Amount::ZERO);
    assert_eq!(pool.auto_ceiling, units("0.029"));
    assert!(engine.is_initialized().await.unwrap());

    let err = engine
        .init_pool(PoolConfig::new("mallory", units("0.01"), units("5")))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    assert_eq!(engine.pool().await.unwrap().admin, "admin");
}

#[tokio::test]
async fn donation_below_minimum_leaves_state_unchanged() {
    let engine = initialized_engine().await;
    donate(&engine, "bob", "1").await.unwrap();

    let err = donate(&engine, "bob", "0.009").await.unwrap_err();
    assert!(matches!(err, EngineError::BelowMinimum(_)));

    assert_eq!(engine.total_balance().await.unwrap(), units("1"));
    assert_eq!(engine.donation_of("bob").await.unwrap(), units("1"));
    assert_eq!(engine.donations_of("bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn donations_accumulate_per_donor() {
    let engine = initialized_engine().await;
    donate(&engine, "bob", "1.5").await.unwrap();
    donate(&engine, "bob", "0.25").await.unwrap();
    donate(&engine, "carol", "2").await.unwrap();

    assert_eq!(engine.donation_of("bob").await.unwrap(), units("1.75"));
    assert_eq!(engine.donation_of("carol").await.unwrap(), units("2"));
    assert_eq!(engine.donation_of("nobody").await.unwrap(), Amount::ZERO);
    assert_eq!(engine.total_donations().await.unwrap(), units("3.75"));

    let donor = engine.donor("bob").await.unwrap().unwrap();
    assert!(donor.first_donated_at <= donor.last_donated_at);
}

#[tokio::test]
async fn non_admin_cannot_increase_allocation() {
    let engine = initialized_engine().await;

    let err = grant(&engine, "mallory", "alice", "1").await.unwrap_err();
    assert_eq!(err, EngineError::NotAdmin("mallory".to_string()));
    assert_eq!(engine.allocation_of("alice").await.unwrap(), Amount::ZERO);
    assert!(engine.grants_for("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn allocations_are_additive() {
    let engine = initialized_engine().await;

    grant(&engine, "admin", "alice", "0.5").await.unwrap();
    grant(&engine, "admin", "alice", "0.5").await.unwrap();

    assert_eq!(engine.allocation_of("alice").await.unwrap(), units("1"));
    assert_eq!(engine.grants_for("alice").await.unwrap().len(), 2);
}

#[tokio::test]
async fn allocation_is_not_capped_by_pool_balance() {
    let engine = initialized_engine().await;

    grant(&engine, "admin", "alice", "1000").await.unwrap();
    assert_eq!(engine.allocation_of("alice").await.unwrap(), units("1000"));

    let err = withdraw(&engine, "alice", "0.5").await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientPoolBalance(_)));
}

#[tokio::test]
async fn withdrawal_over_single_limit_is_rejected() {
    let engine = initialized_engine().await;
    donate(&engine, "bob", "10").await.unwrap();
    grant(&engine, "admin", "alice", "5").await.unwrap();

    let err = withdraw(&engine, "alice", "1.1").await.unwrap_err();
    assert!(matches!(err, EngineError::ExceedsSingleLimit(_)));
    assert_eq!(engine.withdrawn_of("alice").await.unwrap(), Amount::ZERO);
    assert_eq!(engine.total_balance().await.unwrap(), units("10"));
}

#[tokio::test]
async fn withdrawal_over_remaining_allocation_is_rejected() {
    let engine = initialized_engine().await;
    donate(&engine, "bob", "10").await.unwrap();
    grant(&engine, "admin", "alice", "2").await.unwrap();
    withdraw(&engine, "alice", "1").await.unwrap();
    withdraw(&engine, "alice", "0.8").await.unwrap();

    let err = withdraw(&engine, "alice", "0.5").await.unwrap_err();
    assert_eq!(
        err,
        EngineError::ExceedsRemainingAllocation("0.5 requested, 0.2 available".to_string())
    );
    assert_eq!(engine.withdrawn_of("alice").await.unwrap(), units("1.8"));
}

#[tokio::test]
async fn unknown_recipient_cannot_withdraw() {
    let engine = initialized_engine().await;
    donate(&engine, "bob", "10").await.unwrap();

    let err = withdraw(&engine, "ghost", "0.01").await.unwrap_err();
    assert!(matches!(err, EngineError::ExceedsRemainingAllocation(_)));
    let allocation = engine.recipient("ghost").await.unwrap();
    assert_eq!(allocation.allocated, Amount::ZERO);
    assert_eq!(allocation.withdrawn, Amount::ZERO);
}

#[tokio::test]
async fn donor_admin_recipient_end_to_end() {
    let engine = initialized_engine().await;

    donate(&engine, "donor", "10").await.unwrap();
    grant(&engine, "admin", "r", "2").await.unwrap();

    let kind = withdraw(&engine, "r", "0.5").await.unwrap();
    assert_eq!(kind, WithdrawalKind::Approved);

    let allocation = engine.recipient("r").await.unwrap();
    assert_eq!(allocation.withdrawn, units("0.5"));
    assert_eq!(allocation.available(), units("1.5"));
    assert_eq!(engine.total_balance().await.unwrap(), units("9.5"));

    let err = withdraw(&engine, "r", "3").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::ExceedsSingleLimit(_) | EngineError::ExceedsRemainingAllocation(_)
    ));

    let report = engine.audit().await.unwrap();
    assert!(report.is_consistent(), "{:?}", report.mismatches);
    assert_eq!(report.replayed_balance, units("9.5"));
}

#[tokio::test]
async fn remaining_allocation_checked_when_under_limit() {
    let (engine, _db) = engine_with_db().await;
    engine
        .init_pool(PoolConfig::new("admin", units("0.01"), units("5")))
        .await
        .unwrap();
    donate(&engine, "donor", "10").await.unwrap();
    grant(&engine, "admin", "r", "2").await.unwrap();
    withdraw(&engine, "r", "0.5").await.unwrap();

    let err = withdraw(&engine, "r", "3").await.unwrap_err();
    assert!(matches!(err, EngineError::ExceedsRemainingAllocation(_)));
}

#[tokio::test]
async fn small_withdrawals_are_classified_auto() {
    let engine = initialized_engine().await;
    donate(&engine, "bob", "1").await.unwrap();
    grant(&engine, "admin", "alice", "1").await.unwrap();

    assert_eq!(withdraw(&engine, "alice", "0.029").await.unwrap(), WithdrawalKind::Auto);
    assert_eq!(withdraw(&engine, "alice", "0.03").await.unwrap(), WithdrawalKind::Approved);
    // No cooldown configured: the ceiling only classifies.
    assert_eq!(withdraw(&engine, "alice", "0.01").await.unwrap(), WithdrawalKind::Auto);

    let allocation = engine.recipient("alice").await.unwrap();
    assert!(allocation.last_auto_withdraw_at.is_some());
}

#[tokio::test]
async fn auto_cooldown_gates_only_auto_withdrawals() {
    let (engine, _db) = engine_with_db().await;
    engine
        .init_pool(config().auto_cooldown_secs(60))
        .await
        .unwrap();
    donate(&engine, "bob", "5").await.unwrap();
    grant(&engine, "admin", "alice", "2").await.unwrap();

    let t0 = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let at = |secs: i64| t0 + Duration::seconds(secs);

    engine
        .withdraw(WithdrawCmd::new("alice", units("0.01"), at(0)))
        .await
        .unwrap();

    let err = engine
        .withdraw(WithdrawCmd::new("alice", units("0.01"), at(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CooldownActive(_)));

    let event = engine
        .withdraw(WithdrawCmd::new("alice", units("0.5"), at(30)))
        .await
        .unwrap();
    assert_eq!(event.kind, WithdrawalKind::Approved);

    let event = engine
        .withdraw(WithdrawCmd::new("alice", units("0.01"), at(61)))
        .await
        .unwrap();
    assert_eq!(event.kind, WithdrawalKind::Auto);
    assert_eq!(engine.withdrawn_of("alice").await.unwrap(), units("0.52"));
}

#[tokio::test]
async fn unrepresentable_cooldown_is_refused_at_init() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .init_pool(config().auto_cooldown_secs(i64::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert!(!engine.is_initialized().await.unwrap());

    engine.init_pool(config()).await.unwrap();
}

#[tokio::test]
async fn very_long_cooldown_keeps_blocking_auto_withdrawals() {
    let (engine, _db) = engine_with_db().await;
    engine
        .init_pool(config().auto_cooldown_secs(10_000_000_000_000))
        .await
        .unwrap();
    donate(&engine, "bob", "10").await.unwrap();
    grant(&engine, "admin", "alice", "1").await.unwrap();

    assert_eq!(
        withdraw(&engine, "alice", "0.01").await,
        Ok(WithdrawalKind::Auto)
    );
    let err = withdraw(&engine, "alice", "0.01").await.unwrap_err();
    assert!(matches!(err, EngineError::CooldownActive(_)));

    // The engine is still usable afterwards.
    assert_eq!(
        withdraw(&engine, "alice", "0.5").await,
        Ok(WithdrawalKind::Approved)
    );
    assert_eq!(engine.withdrawn_of("alice").await.unwrap(), units("0.51"));
}

#[tokio::test]
async fn malformed_input_is_not_reported_as_an_amount_error() {
    let engine = initialized_engine().await;

    let err = donate(&engine, "   ", "1").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
    let filter = WithdrawalListFilter {
        from: Some(t0),
        to: Some(t0 - Duration::hours(1)),
        ..Default::default()
    };
    let err = engine
        .list_withdrawals_page(&filter, 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn idempotent_grant_is_applied_once() {
    let engine = initialized_engine().await;
    let request_id = Uuid::new_v4();
    let cmd = IncreaseAllocationCmd::new("admin", "alice", units("1"), Utc::now())
        .request_id(request_id);

    let first = engine.increase_allocation(cmd.clone()).await.unwrap();
    let second = engine.increase_allocation(cmd).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(engine.allocation_of("alice").await.unwrap(), units("1"));

    let err = engine
        .increase_allocation(
            IncreaseAllocationCmd::new("admin", "alice", units("2"), Utc::now())
                .request_id(request_id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let found = engine.grant_for_request(request_id).await.unwrap().unwrap();
    assert_eq!(found.id, first.id);
    assert!(
        engine
            .grant_for_request(Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_never_overdraw() {
    let engine = Arc::new(initialized_engine().await);
    donate(&engine, "bob", "10").await.unwrap();
    grant(&engine, "admin", "alice", "1").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            withdraw(&engine, "alice", "0.1").await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(err, EngineError::ExceedsRemainingAllocation(_))),
        }
    }

    assert_eq!(accepted, 10);
    let allocation = engine.recipient("alice").await.unwrap();
    assert_eq!(allocation.withdrawn, units("1"));
    assert_eq!(allocation.available(), Amount::ZERO);
    assert_eq!(engine.total_balance().await.unwrap(), units("9"));
}

#[tokio::test]
async fn withdrawals_page_newest_first() {
    let engine = initialized_engine().await;
    donate(&engine, "bob", "10").await.unwrap();
    grant(&engine, "admin", "alice", "1").await.unwrap();
    grant(&engine, "admin", "dave", "1").await.unwrap();

    let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
    for (i, recipient) in ["alice", "dave", "alice", "alice"].iter().enumerate() {
        engine
            .withdraw(WithdrawCmd::new(
                *recipient,
                units("0.01"),
                t0 + Duration::minutes(i as i64),
            ))
            .await
            .unwrap();
    }

    let filter = WithdrawalListFilter {
        recipient: Some("alice".to_string()),
        ..Default::default()
    };
    let (page, cursor) = engine.list_withdrawals_page(&filter, 2, None).await.unwrap();
    assert_eq!(page.len(), 2);
    assert!(page[0].occurred_at > page[1].occurred_at);
    let cursor = cursor.unwrap();

    let (rest, cursor) = engine
        .list_withdrawals_page(&filter, 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert!(cursor.is_none());
    assert_eq!(rest[0].occurred_at, t0);

    let err = engine
        .list_withdrawals_page(&filter, 2, Some("not-a-cursor"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));

    let window = engine
        .withdrawals_for_audit("alice", t0, t0 + Duration::minutes(3))
        .await
        .unwrap();
    assert_eq!(window.len(), 2);
}

#[tokio::test]
async fn ledger_survives_reopening_the_database() {
    let (engine, db, url, path) = engine_with_file_db().await;
    engine.init_pool(config()).await.unwrap();
    donate(&engine, "bob", "4").await.unwrap();
    grant(&engine, "admin", "alice", "1").await.unwrap();
    withdraw(&engine, "alice", "0.75").await.unwrap();
    drop(engine);
    db.close().await.unwrap();

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();

    assert_eq!(engine.total_balance().await.unwrap(), units("3.25"));
    assert_eq!(engine.donation_of("bob").await.unwrap(), units("4"));
    assert_eq!(engine.recipient("alice").await.unwrap().available(), units("0.25"));
    assert!(engine.audit().await.unwrap().is_consistent());

    db.close().await.unwrap();
    let _ = std::fs::remove_file(path);
}
