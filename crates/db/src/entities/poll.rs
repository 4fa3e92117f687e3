//! Poll entity.

use opine_core::ports::PollStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Poll lifecycle status as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Status {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl From<Status> for PollStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Draft => Self::Draft,
            Status::Open => Self::Open,
            Status::Closed => Self::Closed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Human-readable unique key
    #[sea_orm(unique, indexed)]
    pub slug: String,

    /// The question being polled
    pub question: String,

    /// Lifecycle status; only open polls accept votes
    pub status: Status,

    /// Optional category tag
    #[sea_orm(nullable)]
    pub category: Option<String>,

    /// When the poll was opened for voting
    #[sea_orm(nullable)]
    pub opened_at: Option<DateTimeWithTimeZone>,

    /// Assigned once at creation; the feed's ordering and cursor key
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOption,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
