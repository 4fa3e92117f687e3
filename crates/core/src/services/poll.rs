//! Vote casting, results aggregation and single-poll summaries.

use std::sync::Arc;

use chrono::Utc;
use opine_common::{AppError, AppResult};

use crate::ports::{
    PollCard, PollStatus, PollSummarySource, PollsSource, ResultItem, Timestamp, VoteEvent,
    VotesSource,
};
use crate::services::DEFAULT_QUORUM;
use crate::tally;

/// Input for casting a vote.
#[derive(Debug, Clone)]
pub struct CastVoteInput {
    /// Slug of the target poll.
    pub slug: String,
    /// Chosen option; must belong to the poll.
    pub option_id: String,
    /// Authenticated voter.
    pub user_id: String,
    /// Optional retry-safety token.
    pub idempotency_key: Option<String>,
}

/// Point-in-time snapshot of a poll's current tallies.
#[derive(Debug, Clone)]
pub struct PollResults {
    /// Per-option rows, zero-filled, in option-list order.
    pub items: Vec<ResultItem>,
    /// Total current votes.
    pub total: u64,
    /// The poll's lifecycle status.
    pub status: PollStatus,
    /// When this snapshot was computed. Not a data-freshness watermark.
    pub updated_at: Timestamp,
    /// Whether `total` is still below `min_quorum`.
    pub warming_up: bool,
    /// The quorum applied to this snapshot.
    pub min_quorum: u64,
}

/// Poll service: vote validation and append, tally snapshots, summaries.
#[derive(Clone)]
pub struct PollService {
    polls: Arc<dyn PollsSource>,
    votes: Arc<dyn VotesSource>,
    summaries: Arc<dyn PollSummarySource>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub fn new(
        polls: Arc<dyn PollsSource>,
        votes: Arc<dyn VotesSource>,
        summaries: Arc<dyn PollSummarySource>,
    ) -> Self {
        Self {
            polls,
            votes,
            summaries,
        }
    }

    /// Validate and record a single vote.
    ///
    /// Checks run in a fixed order so a request failing several of them
    /// reports deterministically: poll existence, then open status, then
    /// option membership. A replayed idempotency key is a silent success
    /// with no new vote recorded.
    pub async fn cast_vote(&self, input: CastVoteInput) -> AppResult<()> {
        let poll = self
            .polls
            .find_by_slug(&input.slug)
            .await?
            .ok_or_else(|| AppError::NotFound(input.slug.clone()))?;

        if poll.status != PollStatus::Open {
            return Err(AppError::PollClosed(input.slug.clone()));
        }

        let options = self.polls.list_options(&poll.poll_id).await?;
        if !options.iter().any(|o| o.option_id == input.option_id) {
            return Err(AppError::OptionMismatch(input.option_id.clone()));
        }

        if let Some(key) = &input.idempotency_key
            && self.votes.was_used(&input.user_id, key).await?
        {
            // Idempotent no-op: observably a success, minus the duplicate row.
            return Ok(());
        }

        self.votes
            .append(VoteEvent {
                poll_id: poll.poll_id,
                option_id: input.option_id,
                user_id: input.user_id,
                idempotency_key: input.idempotency_key,
            })
            .await
    }

    /// Current latest-vote-wins tallies for the poll, zero-filled across
    /// its full option list.
    pub async fn results(&self, slug: &str, quorum: Option<u64>) -> AppResult<PollResults> {
        let min_quorum = quorum.unwrap_or(DEFAULT_QUORUM);

        let poll = self
            .polls
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(slug.to_string()))?;

        let (options, tallies) = tokio::try_join!(
            self.polls.list_options(&poll.poll_id),
            self.votes.tally_current(&poll.poll_id),
        )?;

        let (items, total) = tally::result_items(&options, &tallies);

        Ok(PollResults {
            items,
            total,
            status: poll.status,
            updated_at: Utc::now().fixed_offset(),
            warming_up: total < min_quorum,
            min_quorum,
        })
    }

    /// One card-ready poll by slug, any status.
    pub async fn summary(&self, slug: &str, quorum: Option<u64>) -> AppResult<PollCard> {
        let quorum = quorum.unwrap_or(DEFAULT_QUORUM);
        self.summaries
            .find_by_slug(slug, quorum)
            .await?
            .ok_or_else(|| AppError::NotFound(slug.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ports::{CurrentVote, OptionTally, PollOptionRef, PollRef};

    struct MockPollsSource {
        poll: Option<PollRef>,
        options: Vec<PollOptionRef>,
        calls: Mutex<Vec<String>>,
    }

    impl MockPollsSource {
        fn new(poll: Option<PollRef>, options: Vec<PollOptionRef>) -> Self {
            Self {
                poll,
                options,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PollsSource for MockPollsSource {
        async fn find_by_slug(&self, slug: &str) -> AppResult<Option<PollRef>> {
            self.calls.lock().unwrap().push(format!("find_by_slug:{slug}"));
            Ok(self.poll.clone())
        }

        async fn list_options(&self, poll_id: &str) -> AppResult<Vec<PollOptionRef>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list_options:{poll_id}"));
            Ok(self.options.clone())
        }
    }

    #[derive(Default)]
    struct MockVotesSource {
        used: bool,
        tallies: Vec<OptionTally>,
        appended: Mutex<Vec<VoteEvent>>,
        was_used_calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl VotesSource for MockVotesSource {
        async fn append(&self, event: VoteEvent) -> AppResult<()> {
            self.appended.lock().unwrap().push(event);
            Ok(())
        }

        async fn was_used(&self, user_id: &str, idempotency_key: &str) -> AppResult<bool> {
            self.was_used_calls
                .lock()
                .unwrap()
                .push((user_id.to_string(), idempotency_key.to_string()));
            Ok(self.used)
        }

        async fn tally_current(&self, _poll_id: &str) -> AppResult<Vec<OptionTally>> {
            Ok(self.tallies.clone())
        }

        async fn current_by_user_in_polls(
            &self,
            _poll_ids: &[String],
            _user_id: &str,
        ) -> AppResult<Vec<CurrentVote>> {
            Ok(vec![])
        }
    }

    struct NoSummaries;

    #[async_trait]
    impl PollSummarySource for NoSummaries {
        async fn find_by_slug(&self, _slug: &str, _quorum: u64) -> AppResult<Option<PollCard>> {
            Ok(None)
        }
    }

    fn poll_ref(status: PollStatus) -> PollRef {
        PollRef {
            poll_id: "p1".to_string(),
            status,
        }
    }

    fn option(id: &str, label: &str) -> PollOptionRef {
        PollOptionRef {
            option_id: id.to_string(),
            label: label.to_string(),
        }
    }

    fn tally(id: &str, count: u64) -> OptionTally {
        OptionTally {
            option_id: id.to_string(),
            count,
        }
    }

    fn service(polls: Arc<MockPollsSource>, votes: Arc<MockVotesSource>) -> PollService {
        PollService::new(polls, votes, Arc::new(NoSummaries))
    }

    fn cast_input(slug: &str, option_id: &str, key: Option<&str>) -> CastVoteInput {
        CastVoteInput {
            slug: slug.to_string(),
            option_id: option_id.to_string(),
            user_id: "u1".to_string(),
            idempotency_key: key.map(ToString::to_string),
        }
    }

    #[tokio::test]
    async fn test_cast_vote_appends_for_open_poll() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("o1", "Yes")],
        ));
        let votes = Arc::new(MockVotesSource::default());

        service(polls, Arc::clone(&votes))
            .cast_vote(cast_input("best-flavor", "o1", None))
            .await
            .unwrap();

        let appended = votes.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].poll_id, "p1");
        assert_eq!(appended[0].option_id, "o1");
        assert_eq!(appended[0].user_id, "u1");
        assert!(appended[0].idempotency_key.is_none());
        // No key supplied, so no idempotency lookup.
        assert!(votes.was_used_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote_unknown_slug() {
        let polls = Arc::new(MockPollsSource::new(None, vec![]));
        let votes = Arc::new(MockVotesSource::default());

        let err = service(Arc::clone(&polls), Arc::clone(&votes))
            .cast_vote(cast_input("missing", "o1", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(votes.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote_closed_poll_checked_before_option() {
        // Closed poll plus an option that does not exist: the status check
        // wins, so the caller sees poll_closed, not option_mismatch.
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Closed)),
            vec![option("o1", "Yes")],
        ));
        let votes = Arc::new(MockVotesSource::default());

        let err = service(Arc::clone(&polls), Arc::clone(&votes))
            .cast_vote(cast_input("s1", "no-such-option", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PollClosed(_)));
        let calls = polls.calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("list_options")));
        assert!(votes.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote_draft_poll_rejected() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Draft)),
            vec![option("o1", "Yes")],
        ));
        let votes = Arc::new(MockVotesSource::default());

        let err = service(polls, votes)
            .cast_vote(cast_input("s1", "o1", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PollClosed(_)));
    }

    #[tokio::test]
    async fn test_cast_vote_option_mismatch() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("oA", "A")],
        ));
        let votes = Arc::new(MockVotesSource::default());

        let err = service(polls, Arc::clone(&votes))
            .cast_vote(cast_input("s1", "oZ", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::OptionMismatch(_)));
        assert!(votes.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote_idempotent_replay_is_silent_noop() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("o9", "Nine")],
        ));
        let votes = Arc::new(MockVotesSource {
            used: true,
            ..MockVotesSource::default()
        });

        service(polls, Arc::clone(&votes))
            .cast_vote(cast_input("s9", "o9", Some("key-1")))
            .await
            .unwrap();

        assert_eq!(
            votes.was_used_calls.lock().unwrap().as_slice(),
            &[("u1".to_string(), "key-1".to_string())]
        );
        assert!(votes.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote_unused_key_is_recorded_with_vote() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("o2", "Two")],
        ));
        let votes = Arc::new(MockVotesSource::default());

        service(polls, Arc::clone(&votes))
            .cast_vote(cast_input("s2", "o2", Some("key-2")))
            .await
            .unwrap();

        let appended = votes.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].idempotency_key.as_deref(), Some("key-2"));
    }

    #[tokio::test]
    async fn test_results_scenario() {
        // p1 open with Yes/No; current votes (u1,o1),(u2,o1),(u3,o2).
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("o1", "Yes"), option("o2", "No")],
        ));
        let votes = Arc::new(MockVotesSource {
            tallies: vec![tally("o1", 2), tally("o2", 1)],
            ..MockVotesSource::default()
        });

        let results = service(polls, votes).results("p1", None).await.unwrap();

        assert_eq!(results.total, 3);
        assert_eq!(results.status, PollStatus::Open);
        assert_eq!(results.min_quorum, DEFAULT_QUORUM);
        assert!(results.warming_up);

        assert_eq!(results.items[0].option_id, "o1");
        assert_eq!(results.items[0].count, 2);
        assert_eq!(results.items[0].pct, 66.7);
        assert_eq!(results.items[1].option_id, "o2");
        assert_eq!(results.items[1].count, 1);
        assert_eq!(results.items[1].pct, 33.3);
    }

    #[tokio::test]
    async fn test_results_zero_vote_option_included() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("o1", "Yes"), option("o2", "No"), option("o3", "Maybe")],
        ));
        let votes = Arc::new(MockVotesSource {
            tallies: vec![tally("o1", 5), tally("o2", 3), tally("o3", 2)],
            ..MockVotesSource::default()
        });

        let results = service(polls, votes).results("p1", None).await.unwrap();

        let pct: Vec<f64> = results.items.iter().map(|i| i.pct).collect();
        assert_eq!(pct, vec![50.0, 30.0, 20.0]);
    }

    #[tokio::test]
    async fn test_results_empty_poll() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("o1", "Yes"), option("o2", "No")],
        ));
        let votes = Arc::new(MockVotesSource::default());

        let results = service(polls, votes).results("p1", None).await.unwrap();

        assert_eq!(results.total, 0);
        assert!(results.warming_up);
        assert!(results.items.iter().all(|i| i.count == 0 && i.pct == 0.0));
    }

    #[tokio::test]
    async fn test_results_quorum_boundary() {
        let polls = Arc::new(MockPollsSource::new(
            Some(poll_ref(PollStatus::Open)),
            vec![option("o1", "Yes")],
        ));
        let votes = Arc::new(MockVotesSource {
            tallies: vec![tally("o1", 30)],
            ..MockVotesSource::default()
        });
        let svc = service(polls, votes);

        let at_quorum = svc.results("p1", Some(30)).await.unwrap();
        assert!(!at_quorum.warming_up);

        let below_quorum = svc.results("p1", Some(31)).await.unwrap();
        assert!(below_quorum.warming_up);
    }

    #[tokio::test]
    async fn test_results_unknown_slug() {
        let polls = Arc::new(MockPollsSource::new(None, vec![]));
        let votes = Arc::new(MockVotesSource::default());

        let err = service(polls, votes).results("missing", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_summary_unknown_slug() {
        let polls = Arc::new(MockPollsSource::new(None, vec![]));
        let votes = Arc::new(MockVotesSource::default());

        let err = service(polls, votes)
            .summary("missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
