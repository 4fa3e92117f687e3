//! Vote entity: an append-only event log.
//!
//! Rows are never updated or deleted. "Current vote" is derived at read
//! time: a user's latest row per poll by `(voted_at, id)` descending. The
//! ULID primary key gives the id tie-break a deterministic order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Poll being voted on
    #[sea_orm(indexed)]
    pub poll_id: String,

    /// Chosen option
    pub option_id: String,

    /// Voting user
    #[sea_orm(indexed)]
    pub user_id: String,

    pub voted_at: DateTimeWithTimeZone,

    /// Caller-supplied deduplication token; unique per user when present
    #[sea_orm(nullable)]
    pub idempotency_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::PollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Poll,

    #[sea_orm(
        belongs_to = "super::poll_option::Entity",
        from = "Column::OptionId",
        to = "super::poll_option::Column::Id",
        on_delete = "Cascade"
    )]
    PollOption,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
