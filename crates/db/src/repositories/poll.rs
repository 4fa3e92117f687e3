//! Poll repository.

use std::sync::Arc;

use async_trait::async_trait;
use opine_common::{AppError, AppResult};
use opine_core::ports::{PollOptionRef, PollRef, PollsSource};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::{Poll, PollOption, poll, poll_option};

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PollsSource for PollRepository {
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<PollRef>> {
        let poll = Poll::find()
            .filter(poll::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(poll.map(|p| PollRef {
            poll_id: p.id,
            status: p.status.into(),
        }))
    }

    async fn list_options(&self, poll_id: &str) -> AppResult<Vec<PollOptionRef>> {
        let options = PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::CreatedAt)
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(options
            .into_iter()
            .map(|o| PollOptionRef {
                option_id: o.id,
                label: o.label,
            })
            .collect())
    }
}
