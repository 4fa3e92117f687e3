//! Poll feed pagination.

use std::collections::HashMap;
use std::sync::Arc;

use opine_common::AppResult;

use crate::ports::{FeedPageRequest, PollCard, PollFeedSource, Timestamp, VotesSource};
use crate::services::{DEFAULT_QUORUM, FEED_DEFAULT_LIMIT, FEED_MAX_LIMIT};

/// Caller-facing feed query. All fields are optional; defaults and clamping
/// are applied here, at the use-case boundary, so every edge (HTTP, CLI,
/// jobs) gets the same semantics.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Requested page size; clamped into `[1, max_limit]`.
    pub limit: Option<u64>,
    /// Keyset cursor: only polls created strictly before this instant.
    pub cursor: Option<Timestamp>,
    /// Quorum override for the `warming_up` flag.
    pub quorum: Option<u64>,
}

/// One page of the public feed.
#[derive(Debug, Clone)]
pub struct FeedPage {
    /// At most `limit` cards, newest first.
    pub items: Vec<PollCard>,
    /// Cursor for the next page; absent on the last page.
    pub next_cursor: Option<Timestamp>,
}

/// A feed card enriched with the requesting user's current vote.
#[derive(Debug, Clone)]
pub struct PersonalizedCard {
    /// The underlying card.
    pub card: PollCard,
    /// The user's currently selected option in this poll, if any.
    pub current: Option<String>,
}

/// One page of the personalized feed.
#[derive(Debug, Clone)]
pub struct PersonalizedFeedPage {
    /// At most `limit` personalized cards, newest first.
    pub items: Vec<PersonalizedCard>,
    /// Cursor for the next page; absent on the last page.
    pub next_cursor: Option<Timestamp>,
}

/// Feed service: keyset pagination with N+1 lookahead, optionally
/// personalized with the caller's current votes.
#[derive(Clone)]
pub struct FeedService {
    feed: Arc<dyn PollFeedSource>,
    votes: Arc<dyn VotesSource>,
    max_limit: u64,
}

impl FeedService {
    /// Create a new feed service with the default page-size cap.
    #[must_use]
    pub fn new(feed: Arc<dyn PollFeedSource>, votes: Arc<dyn VotesSource>) -> Self {
        Self {
            feed,
            votes,
            max_limit: FEED_MAX_LIMIT,
        }
    }

    /// Override the page-size cap.
    #[must_use]
    pub const fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// One page of the public feed.
    pub async fn feed(&self, query: FeedQuery) -> AppResult<FeedPage> {
        let (items, next_cursor) = self.page(query).await?;
        Ok(FeedPage { items, next_cursor })
    }

    /// One page of the feed, each card annotated with the user's current
    /// vote (`None` where they have not voted).
    pub async fn personalized_feed(
        &self,
        user_id: &str,
        query: FeedQuery,
    ) -> AppResult<PersonalizedFeedPage> {
        let (items, next_cursor) = self.page(query).await?;

        let poll_ids: Vec<String> = items.iter().map(|card| card.poll_id.clone()).collect();
        let mine = self.votes.current_by_user_in_polls(&poll_ids, user_id).await?;
        let current_by_poll: HashMap<String, String> = mine
            .into_iter()
            .map(|vote| (vote.poll_id, vote.option_id))
            .collect();

        let items = items
            .into_iter()
            .map(|card| {
                let current = current_by_poll.get(&card.poll_id).cloned();
                PersonalizedCard { card, current }
            })
            .collect();

        Ok(PersonalizedFeedPage { items, next_cursor })
    }

    /// Clamp the limit, fetch one extra row to detect a further page, and
    /// derive the next cursor from the last retained row.
    async fn page(&self, query: FeedQuery) -> AppResult<(Vec<PollCard>, Option<Timestamp>)> {
        let requested = query.limit.unwrap_or(FEED_DEFAULT_LIMIT);
        // A zero cap would invert the clamp bounds; serve at least one row.
        let limit = requested.clamp(1, self.max_limit.max(1));
        let quorum = query.quorum.unwrap_or(DEFAULT_QUORUM);

        let mut rows = self
            .feed
            .page(FeedPageRequest {
                limit: limit + 1,
                cursor: query.cursor,
                quorum,
            })
            .await?;

        let has_more = rows.len() as u64 > limit;
        if has_more {
            rows.truncate(limit as usize);
        }
        let next_cursor = if has_more {
            rows.last().map(|card| card.created_at)
        } else {
            None
        };

        Ok((rows, next_cursor))
    }
}
