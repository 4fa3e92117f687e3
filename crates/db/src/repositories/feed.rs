//! Feed repository.
//!
//! Serves card-ready poll pages: each row carries its option list and an
//! aggregated results summary so the caller renders without further lookups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use opine_common::{AppError, AppResult};
use opine_core::ports::{
    FeedPageRequest, OptionTally, PollCard, PollFeedSource, PollOptionRef, PollSummarySource,
    Timestamp,
};
use opine_core::tally;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities::{Poll, PollOption, Vote, poll, poll_option, vote};
use crate::repositories::vote::latest_per_user;

/// Feed repository for database operations.
#[derive(Clone)]
pub struct FeedRepository {
    db: Arc<DatabaseConnection>,
}

impl FeedRepository {
    /// Create a new feed repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Assemble cards for a set of polls: batch-fetch their options and
    /// votes, reduce the vote log to current votes, and summarize per poll.
    async fn build_cards(
        &self,
        polls: Vec<poll::Model>,
        quorum: u64,
    ) -> AppResult<Vec<PollCard>> {
        if polls.is_empty() {
            return Ok(Vec::new());
        }

        let poll_ids: Vec<&str> = polls.iter().map(|p| p.id.as_str()).collect();

        let options = PollOption::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids.clone()))
            .order_by_asc(poll_option::Column::CreatedAt)
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let votes = Vote::find()
            .filter(vote::Column::PollId.is_in(poll_ids))
            .order_by_desc(vote::Column::VotedAt)
            .order_by_desc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut options_by_poll: HashMap<String, Vec<PollOptionRef>> = HashMap::new();
        for o in options {
            options_by_poll
                .entry(o.poll_id)
                .or_default()
                .push(PollOptionRef {
                    option_id: o.id,
                    label: o.label,
                });
        }

        let mut counts_by_poll: HashMap<String, HashMap<String, u64>> = HashMap::new();
        let mut updated_by_poll: HashMap<String, Timestamp> = HashMap::new();
        for v in latest_per_user(&votes) {
            *counts_by_poll
                .entry(v.poll_id.clone())
                .or_default()
                .entry(v.option_id.clone())
                .or_default() += 1;
            // Rows arrive newest-first, so the first seen per poll is the max.
            updated_by_poll
                .entry(v.poll_id.clone())
                .or_insert(v.voted_at);
        }

        Ok(polls
            .into_iter()
            .map(|p| {
                let options = options_by_poll.remove(&p.id).unwrap_or_default();
                let tallies: Vec<OptionTally> = counts_by_poll
                    .remove(&p.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(option_id, count)| OptionTally { option_id, count })
                    .collect();
                let updated_at = updated_by_poll.remove(&p.id);
                let results = tally::summarize(&options, &tallies, quorum, updated_at);

                PollCard {
                    poll_id: p.id,
                    slug: p.slug,
                    question: p.question,
                    status: p.status.into(),
                    category: p.category,
                    opened_at: p.opened_at,
                    created_at: p.created_at,
                    options,
                    results,
                }
            })
            .collect())
    }
}

#[async_trait]
impl PollFeedSource for FeedRepository {
    async fn page(&self, request: FeedPageRequest) -> AppResult<Vec<PollCard>> {
        let mut query = Poll::find()
            .filter(poll::Column::Status.eq(poll::Status::Open))
            .order_by_desc(poll::Column::CreatedAt)
            .order_by_desc(poll::Column::Id);

        // The cursor is exclusive: only rows strictly older than it qualify.
        if let Some(cursor) = request.cursor {
            query = query.filter(poll::Column::CreatedAt.lt(cursor));
        }

        let polls = query
            .limit(request.limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.build_cards(polls, request.quorum).await
    }
}

#[async_trait]
impl PollSummarySource for FeedRepository {
    async fn find_by_slug(&self, slug: &str, quorum: u64) -> AppResult<Option<PollCard>> {
        let poll = Poll::find()
            .filter(poll::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(poll) = poll else {
            return Ok(None);
        };

        Ok(self.build_cards(vec![poll], quorum).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use opine_core::ports::PollStatus;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_poll(id: &str, slug: &str) -> poll::Model {
        poll::Model {
            id: id.to_string(),
            slug: slug.to_string(),
            question: format!("Question for {slug}?"),
            status: poll::Status::Open,
            category: Some("general".to_string()),
            opened_at: Some(Utc::now().into()),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_option(id: &str, poll_id: &str, label: &str) -> poll_option::Model {
        poll_option::Model {
            id: id.to_string(),
            poll_id: poll_id.to_string(),
            label: label.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_vote(id: &str, poll_id: &str, user_id: &str, option_id: &str) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            user_id: user_id.to_string(),
            voted_at: Utc::now().into(),
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_page_builds_cards_with_summaries() {
        let polls = vec![create_test_poll("p1", "cats-or-dogs")];
        let options = vec![
            create_test_option("o1", "p1", "Cats"),
            create_test_option("o2", "p1", "Dogs"),
        ];
        let votes = vec![
            create_test_vote("v2", "p1", "u2", "o1"),
            create_test_vote("v1", "p1", "u1", "o1"),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([polls])
                .append_query_results([options])
                .append_query_results([votes])
                .into_connection(),
        );

        let repo = FeedRepository::new(db);
        let cards = repo
            .page(FeedPageRequest {
                limit: 21,
                cursor: None,
                quorum: 30,
            })
            .await
            .unwrap();

        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.slug, "cats-or-dogs");
        assert_eq!(card.status, PollStatus::Open);
        assert_eq!(card.results.total, 2);
        assert!(card.results.warming_up);
        assert_eq!(card.results.items.len(), 2);
        assert_eq!(card.results.items[0].option_id, "o1");
        assert_eq!(card.results.items[0].count, 2);
        assert_eq!(card.results.items[0].pct, 100.0);
        assert_eq!(card.results.items[1].count, 0);
    }

    #[tokio::test]
    async fn test_page_empty_feed() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let repo = FeedRepository::new(db);
        let cards = repo
            .page(FeedPageRequest {
                limit: 21,
                cursor: None,
                quorum: 30,
            })
            .await
            .unwrap();

        assert!(cards.is_empty());
    }

    #[tokio::test]
    async fn test_superseded_votes_excluded_from_card_totals() {
        let polls = vec![create_test_poll("p1", "tabs-or-spaces")];
        let options = vec![
            create_test_option("o1", "p1", "Tabs"),
            create_test_option("o2", "p1", "Spaces"),
        ];
        let mut older = create_test_vote("v1", "p1", "u1", "o1");
        older.voted_at = (Utc::now() - Duration::hours(1)).into();
        let votes = vec![create_test_vote("v2", "p1", "u1", "o2"), older];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([polls])
                .append_query_results([options])
                .append_query_results([votes])
                .into_connection(),
        );

        let repo = FeedRepository::new(db);
        let cards = repo
            .page(FeedPageRequest {
                limit: 21,
                cursor: None,
                quorum: 30,
            })
            .await
            .unwrap();

        assert_eq!(cards[0].results.total, 1);
        assert_eq!(cards[0].results.items[0].count, 0);
        assert_eq!(cards[0].results.items[1].count, 1);
        assert_eq!(cards[0].results.items[1].pct, 100.0);
    }

    #[tokio::test]
    async fn test_find_by_slug_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let repo = FeedRepository::new(db);
        let card = repo.find_by_slug("nonexistent", 30).await.unwrap();

        assert!(card.is_none());
    }

    #[tokio::test]
    async fn test_find_by_slug_builds_card() {
        let polls = vec![create_test_poll("p1", "cats-or-dogs")];
        let options = vec![create_test_option("o1", "p1", "Cats")];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([polls])
                .append_query_results([options])
                .append_query_results([Vec::<vote::Model>::new()])
                .into_connection(),
        );

        let repo = FeedRepository::new(db);
        let card = repo.find_by_slug("cats-or-dogs", 30).await.unwrap().unwrap();

        assert_eq!(card.poll_id, "p1");
        assert_eq!(card.results.total, 0);
        assert!(card.results.updated_at.is_none());
        assert!(card.results.warming_up);
    }
}
