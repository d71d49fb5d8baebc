use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum FundingRequests {
    Table,
    Id,
    Requester,
    Amount,
    Note,
    Status,
    CreatedAt,
    DecidedAt,
    DecidedBy,
    GrantId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FundingRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FundingRequests::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FundingRequests::Requester).string().not_null())
                    .col(ColumnDef::new(FundingRequests::Amount).big_integer().not_null())
                    .col(ColumnDef::new(FundingRequests::Note).string())
                    .col(
                        ColumnDef::new(FundingRequests::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(FundingRequests::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(FundingRequests::DecidedAt).timestamp())
                    .col(ColumnDef::new(FundingRequests::DecidedBy).string())
                    .col(ColumnDef::new(FundingRequests::GrantId).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-funding_requests-status-created_at")
                    .table(FundingRequests::Table)
                    .col(FundingRequests::Status)
                    .col(FundingRequests::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-funding_requests-requester")
                    .table(FundingRequests::Table)
                    .col(FundingRequests::Requester)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FundingRequests::Table).to_owned())
            .await
    }
}
