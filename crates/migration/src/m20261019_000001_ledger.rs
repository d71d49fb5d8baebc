//! Ledger schema.
//!
//! - `users`: HTTP basic-auth identities
//! - `pool`: the single fund pool with its limits and running totals
//! - `donors` / `donations`: per-donor totals and the donation log
//! - `allocations` / `allocation_grants`: per-recipient totals and the grant log
//! - `withdrawals`: the classified withdrawal log

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Pool {
    Table,
    Id,
    Admin,
    TotalBalance,
    TotalDonated,
    TotalWithdrawn,
    MinDonation,
    WithdrawalLimit,
    AutoCeiling,
    AutoCooldownSecs,
    CreatedAt,
}

#[derive(Iden)]
enum Donors {
    Table,
    Donor,
    TotalDonated,
    FirstDonatedAt,
    LastDonatedAt,
}

#[derive(Iden)]
enum Donations {
    Table,
    Id,
    Donor,
    Amount,
    OccurredAt,
}

#[derive(Iden)]
enum Allocations {
    Table,
    Recipient,
    Allocated,
    Withdrawn,
    LastAutoWithdrawAt,
    CreatedAt,
}

#[derive(Iden)]
enum AllocationGrants {
    Table,
    Id,
    Recipient,
    Amount,
    GrantedBy,
    RequestId,
    Note,
    OccurredAt,
}

#[derive(Iden)]
enum Withdrawals {
    Table,
    Id,
    Recipient,
    Amount,
    Kind,
    OccurredAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Pool
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Pool::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Pool::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Pool::Admin).string().not_null())
                    .col(ColumnDef::new(Pool::TotalBalance).big_integer().not_null())
                    .col(ColumnDef::new(Pool::TotalDonated).big_integer().not_null())
                    .col(ColumnDef::new(Pool::TotalWithdrawn).big_integer().not_null())
                    .col(ColumnDef::new(Pool::MinDonation).big_integer().not_null())
                    .col(ColumnDef::new(Pool::WithdrawalLimit).big_integer().not_null())
                    .col(ColumnDef::new(Pool::AutoCeiling).big_integer().not_null())
                    .col(ColumnDef::new(Pool::AutoCooldownSecs).big_integer())
                    .col(ColumnDef::new(Pool::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Donors and donations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Donors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Donors::Donor)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Donors::TotalDonated).big_integer().not_null())
                    .col(ColumnDef::new(Donors::FirstDonatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Donors::LastDonatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Donations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Donations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Donations::Donor).string().not_null())
                    .col(ColumnDef::new(Donations::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Donations::OccurredAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-donations-donor")
                            .from(Donations::Table, Donations::Donor)
                            .to(Donors::Table, Donors::Donor),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-donations-donor-occurred_at")
                    .table(Donations::Table)
                    .col(Donations::Donor)
                    .col(Donations::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Allocations and grants
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allocations::Recipient)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Allocations::Allocated).big_integer().not_null())
                    .col(ColumnDef::new(Allocations::Withdrawn).big_integer().not_null())
                    .col(ColumnDef::new(Allocations::LastAutoWithdrawAt).timestamp())
                    .col(ColumnDef::new(Allocations::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AllocationGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AllocationGrants::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AllocationGrants::Recipient).string().not_null())
                    .col(ColumnDef::new(AllocationGrants::Amount).big_integer().not_null())
                    .col(ColumnDef::new(AllocationGrants::GrantedBy).string().not_null())
                    .col(ColumnDef::new(AllocationGrants::RequestId).string())
                    .col(ColumnDef::new(AllocationGrants::Note).string())
                    .col(
                        ColumnDef::new(AllocationGrants::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-allocation_grants-recipient")
                            .from(AllocationGrants::Table, AllocationGrants::Recipient)
                            .to(Allocations::Table, Allocations::Recipient),
                    )
                    .to_owned(),
            )
            .await?;

        // NULLs are distinct, so only request-backed grants are constrained.
        manager
            .create_index(
                Index::create()
                    .name("uidx-allocation_grants-request_id")
                    .table(AllocationGrants::Table)
                    .col(AllocationGrants::RequestId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocation_grants-recipient")
                    .table(AllocationGrants::Table)
                    .col(AllocationGrants::Recipient)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Withdrawals
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Withdrawals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Withdrawals::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Withdrawals::Recipient).string().not_null())
                    .col(ColumnDef::new(Withdrawals::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Withdrawals::Kind).string().not_null())
                    .col(ColumnDef::new(Withdrawals::OccurredAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-withdrawals-recipient")
                            .from(Withdrawals::Table, Withdrawals::Recipient)
                            .to(Allocations::Table, Allocations::Recipient),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-withdrawals-occurred_at-id")
                    .table(Withdrawals::Table)
                    .col(Withdrawals::OccurredAt)
                    .col(Withdrawals::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-withdrawals-recipient")
                    .table(Withdrawals::Table)
                    .col(Withdrawals::Recipient)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Withdrawals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AllocationGrants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Donations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Donors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pool::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
