//! Create poll table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Poll::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Poll::Slug).string_len(128).not_null())
                    .col(ColumnDef::new(Poll::Question).string_len(512).not_null())
                    .col(ColumnDef::new(Poll::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Poll::Category).string_len(64).null())
                    .col(
                        ColumnDef::new(Poll::OpenedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: slug (polls are addressed by slug)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_slug")
                    .table(Poll::Table)
                    .col(Poll::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (status, created_at) - the feed scans open polls newest-first
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_status_created_at")
                    .table(Poll::Table)
                    .col(Poll::Status)
                    .col(Poll::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Slug,
    Question,
    Status,
    Category,
    OpenedAt,
    CreatedAt,
}
