//! Vote repository.
//!
//! Votes are append-only. Tallies and "current vote" lookups reduce the log
//! to each user's latest row per poll, ordered by `(voted_at, id)` descending.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use opine_common::{AppError, AppResult, IdGenerator};
use opine_core::ports::{CurrentVote, OptionTally, VoteEvent, VotesSource};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};

use crate::entities::{Vote, vote};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }
}

/// Reduce a vote log, already sorted by `(voted_at, id)` descending, to each
/// user's latest row. Rows for the same user within the same poll after the
/// first are superseded votes.
pub(crate) fn latest_per_user(votes: &[vote::Model]) -> Vec<&vote::Model> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    votes
        .iter()
        .filter(|v| seen.insert((v.poll_id.as_str(), v.user_id.as_str())))
        .collect()
}

#[async_trait]
impl VotesSource for VoteRepository {
    async fn append(&self, event: VoteEvent) -> AppResult<()> {
        let model = vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(event.poll_id),
            option_id: Set(event.option_id),
            user_id: Set(event.user_id),
            voted_at: Set(Utc::now().into()),
            idempotency_key: Set(event.idempotency_key),
        };

        match model.insert(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            // A replayed idempotency key trips the unique index; the earlier
            // insert already holds, so the replay is a no-op.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(()),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn was_used(&self, user_id: &str, idempotency_key: &str) -> AppResult<bool> {
        let count = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::IdempotencyKey.eq(idempotency_key))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    async fn tally_current(&self, poll_id: &str) -> AppResult<Vec<OptionTally>> {
        let votes = Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .order_by_desc(vote::Column::VotedAt)
            .order_by_desc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for v in latest_per_user(&votes) {
            *counts.entry(v.option_id.as_str()).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(option_id, count)| OptionTally {
                option_id: option_id.to_string(),
                count,
            })
            .collect())
    }

    async fn current_by_user_in_polls(
        &self,
        poll_ids: &[String],
        user_id: &str,
    ) -> AppResult<Vec<CurrentVote>> {
        if poll_ids.is_empty() {
            return Ok(Vec::new());
        }

        let votes = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.is_in(poll_ids.iter().map(String::as_str)))
            .order_by_desc(vote::Column::VotedAt)
            .order_by_desc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(latest_per_user(&votes)
            .into_iter()
            .map(|v| CurrentVote {
                poll_id: v.poll_id.clone(),
                option_id: v.option_id.clone(),
            })
            .collect())
    }
}
