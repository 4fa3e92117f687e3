//! Create vote table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vote::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(Vote::OptionId).string_len(32).not_null())
                    .col(ColumnDef::new(Vote::UserId).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Vote::VotedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Vote::IdempotencyKey)
                            .string_len(128)
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_poll")
                            .from(Vote::Table, Vote::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_option")
                            .from(Vote::Table, Vote::OptionId)
                            .to(PollOption::Table, PollOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, voted_at) - tallies scan a poll's votes newest-first
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_poll_voted_at")
                    .table(Vote::Table)
                    .col(Vote::PollId)
                    .col(Vote::VotedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, poll_id) - resolving a user's current vote
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_user_poll")
                    .table(Vote::Table)
                    .col(Vote::UserId)
                    .col(Vote::PollId)
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, idempotency_key) - replayed requests insert
        // nothing. NULL keys are distinct, so key-less votes are unconstrained.
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_user_idempotency")
                    .table(Vote::Table)
                    .col(Vote::UserId)
                    .col(Vote::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Vote {
    Table,
    Id,
    PollId,
    OptionId,
    UserId,
    VotedAt,
    IdempotencyKey,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
}
