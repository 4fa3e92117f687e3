//! Outbound data-source ports consumed by the use-case layer.
//!
//! Each port is an async trait with two implementations: the durable
//! Postgres repositories and the in-memory development fixture (both in
//! `opine-db`). Sources raise only infrastructure errors
//! ([`opine_common::AppError::Database`]); domain errors are the use cases'
//! responsibility.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use opine_common::AppResult;
use serde::{Deserialize, Serialize};

/// Timezone-qualified timestamp used throughout the domain.
pub type Timestamp = DateTime<FixedOffset>;

/// Poll lifecycle status. Only `open` polls accept new votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    /// Not yet published.
    Draft,
    /// Accepting votes.
    Open,
    /// No longer accepting votes.
    Closed,
}

/// Minimal poll reference resolved by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRef {
    /// Opaque poll identifier.
    pub poll_id: String,
    /// Current lifecycle status.
    pub status: PollStatus,
}

/// An option belonging to a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionRef {
    /// Opaque option identifier.
    pub option_id: String,
    /// Display label.
    pub label: String,
}

/// An immutable vote event to append. Timestamp and identifier are assigned
/// by the source on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteEvent {
    /// Poll being voted on.
    pub poll_id: String,
    /// Chosen option.
    pub option_id: String,
    /// Voting user.
    pub user_id: String,
    /// Caller-supplied deduplication token, if any.
    pub idempotency_key: Option<String>,
}

/// Per-option count of current votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTally {
    /// Option the count applies to.
    pub option_id: String,
    /// Number of distinct users whose current vote targets this option.
    pub count: u64,
}

/// A user's current option choice in one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentVote {
    /// Poll the vote belongs to.
    pub poll_id: String,
    /// The user's currently selected option.
    pub option_id: String,
}

/// Aggregated vote summary embedded in a [`PollCard`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSummary {
    /// Total current votes across all options.
    pub total: u64,
    /// Timestamp of the most recent counted vote, if any.
    pub updated_at: Option<Timestamp>,
    /// Whether the total is still below the requested quorum.
    pub warming_up: bool,
    /// Per-option breakdown, zero-filled for options without votes.
    pub items: Vec<ResultItem>,
}

/// One option's share of a results summary.
///
/// `pct` is rounded half-up to one decimal; percentages are not renormalized,
/// so a page of items may drift from 100.0 by up to 0.1.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    /// Option the row describes.
    pub option_id: String,
    /// Display label.
    pub label: String,
    /// Current vote count.
    pub count: u64,
    /// Share of the total, in percent with one decimal.
    pub pct: f64,
}

/// A card-ready feed item: poll metadata plus its aggregated results.
#[derive(Debug, Clone, PartialEq)]
pub struct PollCard {
    /// Opaque poll identifier.
    pub poll_id: String,
    /// Human-readable unique key.
    pub slug: String,
    /// The poll question.
    pub question: String,
    /// Current lifecycle status.
    pub status: PollStatus,
    /// Optional category tag.
    pub category: Option<String>,
    /// When the poll was opened for voting, if it has been.
    pub opened_at: Option<Timestamp>,
    /// Creation time; the feed's ordering and cursor key.
    pub created_at: Timestamp,
    /// All options of the poll.
    pub options: Vec<PollOptionRef>,
    /// Aggregated current-vote summary.
    pub results: ResultsSummary,
}

/// Page request forwarded to the feed source.
///
/// `limit` already includes the N+1 lookahead row; `cursor` restricts the
/// page to rows strictly older than the given timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPageRequest {
    /// Maximum rows to return (lookahead included).
    pub limit: u64,
    /// Exclusive upper bound on `created_at`.
    pub cursor: Option<Timestamp>,
    /// Quorum used for the per-card `warming_up` flag.
    pub quorum: u64,
}

/// Read access to polls and their options.
#[async_trait]
pub trait PollsSource: Send + Sync {
    /// Resolve a poll by slug. `None` when no poll carries the slug.
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<PollRef>>;

    /// List every option belonging to the poll. Option membership here is
    /// the sole authority for vote validity.
    async fn list_options(&self, poll_id: &str) -> AppResult<Vec<PollOptionRef>>;
}

/// Append-only vote log with derived current-vote reads.
#[async_trait]
pub trait VotesSource: Send + Sync {
    /// Append one immutable vote event, assigning id and timestamp.
    ///
    /// Implementations must make the idempotency guarantee atomic: a
    /// concurrent duplicate `(user_id, idempotency_key)` append is a silent
    /// no-op, not an error.
    async fn append(&self, event: VoteEvent) -> AppResult<()>;

    /// Whether the `(user_id, idempotency_key)` pair was already observed.
    async fn was_used(&self, user_id: &str, idempotency_key: &str) -> AppResult<bool>;

    /// Current tallies for a poll: each user's latest vote, ordered by
    /// `(voted_at, id)` descending, counts exactly once. Options without
    /// votes may be omitted.
    async fn tally_current(&self, poll_id: &str) -> AppResult<Vec<OptionTally>>;

    /// The user's current option per poll, for the given polls only.
    async fn current_by_user_in_polls(
        &self,
        poll_ids: &[String],
        user_id: &str,
    ) -> AppResult<Vec<CurrentVote>>;
}

/// Pre-aggregated, card-ready feed pages.
#[async_trait]
pub trait PollFeedSource: Send + Sync {
    /// One page of open polls, newest-created first with id as tie-break,
    /// each carrying its aggregated results summary.
    async fn page(&self, request: FeedPageRequest) -> AppResult<Vec<PollCard>>;
}

/// Single-card lookup by slug.
#[async_trait]
pub trait PollSummarySource: Send + Sync {
    /// The card for the given slug regardless of status, or `None`.
    async fn find_by_slug(&self, slug: &str, quorum: u64) -> AppResult<Option<PollCard>>;
}
