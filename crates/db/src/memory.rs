//! In-process storage fixture.
//!
//! Implements every data-source port over a mutex-guarded store. Used by the
//! server's `memory` backend for dependency-free local runs and by the HTTP
//! integration tests. Semantics mirror the Postgres repositories: append-only
//! votes, latest-per-user tallies, strictly-older cursor pages.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use opine_common::{AppError, AppResult, IdGenerator};
use opine_core::ports::{
    CurrentVote, FeedPageRequest, OptionTally, PollCard, PollFeedSource, PollOptionRef, PollRef,
    PollStatus, PollSummarySource, PollsSource, Timestamp, VoteEvent, VotesSource,
};
use opine_core::tally;

#[derive(Debug, Clone)]
struct StoredPoll {
    id: String,
    slug: String,
    question: String,
    status: PollStatus,
    category: Option<String>,
    opened_at: Option<Timestamp>,
    created_at: Timestamp,
}

#[derive(Debug, Clone)]
struct StoredOption {
    id: String,
    poll_id: String,
    label: String,
}

#[derive(Debug, Clone)]
struct StoredVote {
    id: String,
    poll_id: String,
    option_id: String,
    user_id: String,
    voted_at: Timestamp,
    idempotency_key: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    polls: Vec<StoredPoll>,
    options: Vec<StoredOption>,
    votes: Vec<StoredVote>,
}

/// Mutex-guarded in-memory store implementing all data-source ports.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    id_gen: IdGenerator,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| AppError::Database(format!("store lock poisoned: {e}")))
    }

    /// Insert a poll created now. Returns its id.
    pub fn insert_poll(
        &self,
        slug: &str,
        question: &str,
        status: PollStatus,
    ) -> AppResult<String> {
        self.insert_poll_at(slug, question, status, None, Utc::now().fixed_offset())
    }

    /// Insert a poll with an explicit creation time. Returns its id.
    pub fn insert_poll_at(
        &self,
        slug: &str,
        question: &str,
        status: PollStatus,
        category: Option<&str>,
        created_at: Timestamp,
    ) -> AppResult<String> {
        let id = self.id_gen.generate();
        let opened_at = matches!(status, PollStatus::Open | PollStatus::Closed)
            .then_some(created_at);
        self.lock()?.polls.push(StoredPoll {
            id: id.clone(),
            slug: slug.to_string(),
            question: question.to_string(),
            status,
            category: category.map(str::to_string),
            opened_at,
            created_at,
        });
        Ok(id)
    }

    /// Attach an option to a poll. Returns the option id.
    pub fn insert_option(&self, poll_id: &str, label: &str) -> AppResult<String> {
        let id = self.id_gen.generate();
        self.lock()?.options.push(StoredOption {
            id: id.clone(),
            poll_id: poll_id.to_string(),
            label: label.to_string(),
        });
        Ok(id)
    }

    /// Seed a handful of open polls so a fresh dev server has content.
    pub fn seed_demo(&self) -> AppResult<()> {
        let now = Utc::now().fixed_offset();
        let seeds: [(&str, &str, &str, [&str; 2]); 3] = [
            (
                "tabs-or-spaces",
                "Tabs or spaces?",
                "tech",
                ["Tabs", "Spaces"],
            ),
            (
                "coffee-or-tea",
                "Coffee or tea to start the day?",
                "food",
                ["Coffee", "Tea"],
            ),
            (
                "cats-or-dogs",
                "Cats or dogs?",
                "pets",
                ["Cats", "Dogs"],
            ),
        ];

        for (i, (slug, question, category, labels)) in seeds.into_iter().enumerate() {
            let created_at = now - Duration::minutes(i as i64);
            let poll_id = self.insert_poll_at(
                slug,
                question,
                PollStatus::Open,
                Some(category),
                created_at,
            )?;
            for label in labels {
                self.insert_option(&poll_id, label)?;
            }
        }
        Ok(())
    }
}

/// A poll's votes reduced to each user's latest, newest-first.
fn current_votes<'a>(inner: &'a Inner, poll_id: &str) -> Vec<&'a StoredVote> {
    let mut votes: Vec<&StoredVote> = inner
        .votes
        .iter()
        .filter(|v| v.poll_id == poll_id)
        .collect();
    votes.sort_by(|a, b| b.voted_at.cmp(&a.voted_at).then_with(|| b.id.cmp(&a.id)));

    let mut seen: HashSet<&str> = HashSet::new();
    votes
        .into_iter()
        .filter(|v| seen.insert(v.user_id.as_str()))
        .collect()
}

fn option_refs(inner: &Inner, poll_id: &str) -> Vec<PollOptionRef> {
    inner
        .options
        .iter()
        .filter(|o| o.poll_id == poll_id)
        .map(|o| PollOptionRef {
            option_id: o.id.clone(),
            label: o.label.clone(),
        })
        .collect()
}

fn build_card(inner: &Inner, poll: &StoredPoll, quorum: u64) -> PollCard {
    let options = option_refs(inner, &poll.id);
    let current = current_votes(inner, &poll.id);

    let mut tallies: Vec<OptionTally> = Vec::new();
    for v in &current {
        match tallies.iter_mut().find(|t| t.option_id == v.option_id) {
            Some(t) => t.count += 1,
            None => tallies.push(OptionTally {
                option_id: v.option_id.clone(),
                count: 1,
            }),
        }
    }
    let updated_at = current.first().map(|v| v.voted_at);

    PollCard {
        poll_id: poll.id.clone(),
        slug: poll.slug.clone(),
        question: poll.question.clone(),
        status: poll.status,
        category: poll.category.clone(),
        opened_at: poll.opened_at,
        created_at: poll.created_at,
        results: tally::summarize(&options, &tallies, quorum, updated_at),
        options,
    }
}

#[async_trait]
impl PollsSource for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<PollRef>> {
        let inner = self.lock()?;
        Ok(inner.polls.iter().find(|p| p.slug == slug).map(|p| PollRef {
            poll_id: p.id.clone(),
            status: p.status,
        }))
    }

    async fn list_options(&self, poll_id: &str) -> AppResult<Vec<PollOptionRef>> {
        let inner = self.lock()?;
        Ok(option_refs(&inner, poll_id))
    }
}

#[async_trait]
impl VotesSource for MemoryStore {
    async fn append(&self, event: VoteEvent) -> AppResult<()> {
        let mut inner = self.lock()?;
        // Same guarantee as the database's unique index: a replayed key
        // inserts nothing.
        if let Some(key) = &event.idempotency_key
            && inner
                .votes
                .iter()
                .any(|v| v.user_id == event.user_id && v.idempotency_key.as_ref() == Some(key))
        {
            return Ok(());
        }
        inner.votes.push(StoredVote {
            id: self.id_gen.generate(),
            poll_id: event.poll_id,
            option_id: event.option_id,
            user_id: event.user_id,
            voted_at: Utc::now().fixed_offset(),
            idempotency_key: event.idempotency_key,
        });
        Ok(())
    }

    async fn was_used(&self, user_id: &str, idempotency_key: &str) -> AppResult<bool> {
        let inner = self.lock()?;
        Ok(inner
            .votes
            .iter()
            .any(|v| v.user_id == user_id && v.idempotency_key.as_deref() == Some(idempotency_key)))
    }

    async fn tally_current(&self, poll_id: &str) -> AppResult<Vec<OptionTally>> {
        let inner = self.lock()?;
        let mut tallies: Vec<OptionTally> = Vec::new();
        for v in current_votes(&inner, poll_id) {
            match tallies.iter_mut().find(|t| t.option_id == v.option_id) {
                Some(t) => t.count += 1,
                None => tallies.push(OptionTally {
                    option_id: v.option_id.clone(),
                    count: 1,
                }),
            }
        }
        Ok(tallies)
    }

    async fn current_by_user_in_polls(
        &self,
        poll_ids: &[String],
        user_id: &str,
    ) -> AppResult<Vec<CurrentVote>> {
        let inner = self.lock()?;
        let mut current = Vec::new();
        for poll_id in poll_ids {
            if let Some(v) = current_votes(&inner, poll_id)
                .into_iter()
                .find(|v| v.user_id == user_id)
            {
                current.push(CurrentVote {
                    poll_id: v.poll_id.clone(),
                    option_id: v.option_id.clone(),
                });
            }
        }
        Ok(current)
    }
}

#[async_trait]
impl PollFeedSource for MemoryStore {
    async fn page(&self, request: FeedPageRequest) -> AppResult<Vec<PollCard>> {
        let inner = self.lock()?;
        let mut polls: Vec<&StoredPoll> = inner
            .polls
            .iter()
            .filter(|p| p.status == PollStatus::Open)
            .filter(|p| request.cursor.is_none_or(|cursor| p.created_at < cursor))
            .collect();
        polls.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(polls
            .into_iter()
            .take(request.limit as usize)
            .map(|p| build_card(&inner, p, request.quorum))
            .collect())
    }
}

#[async_trait]
impl PollSummarySource for MemoryStore {
    async fn find_by_slug(&self, slug: &str, quorum: u64) -> AppResult<Option<PollCard>> {
        let inner = self.lock()?;
        Ok(inner
            .polls
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| build_card(&inner, p, quorum)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote_event(poll_id: &str, option_id: &str, user_id: &str, key: Option<&str>) -> VoteEvent {
        VoteEvent {
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            user_id: user_id.to_string(),
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_find_by_slug() {
        let store = MemoryStore::new();
        store
            .insert_poll("cats-or-dogs", "Cats or dogs?", PollStatus::Open)
            .unwrap();

        let found = PollsSource::find_by_slug(&store, "cats-or-dogs")
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().status, PollStatus::Open);

        let missing = PollsSource::find_by_slug(&store, "nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_append_and_tally_latest_wins() {
        let store = MemoryStore::new();
        let poll_id = store
            .insert_poll("tabs-or-spaces", "Tabs or spaces?", PollStatus::Open)
            .unwrap();
        let o1 = store.insert_option(&poll_id, "Tabs").unwrap();
        let o2 = store.insert_option(&poll_id, "Spaces").unwrap();

        store.append(vote_event(&poll_id, &o1, "u1", None)).await.unwrap();
        store.append(vote_event(&poll_id, &o1, "u2", None)).await.unwrap();
        // u1 changes their mind; only the later vote counts.
        store.append(vote_event(&poll_id, &o2, "u1", None)).await.unwrap();

        let mut tallies = store.tally_current(&poll_id).await.unwrap();
        tallies.sort_by(|a, b| a.option_id.cmp(&b.option_id));
        let total: u64 = tallies.iter().map(|t| t.count).sum();

        assert_eq!(total, 2);
        assert!(tallies.iter().any(|t| t.option_id == o2 && t.count == 1));
    }

    #[tokio::test]
    async fn test_append_replayed_key_is_noop() {
        let store = MemoryStore::new();
        let poll_id = store
            .insert_poll("coffee-or-tea", "Coffee or tea?", PollStatus::Open)
            .unwrap();
        let o1 = store.insert_option(&poll_id, "Coffee").unwrap();

        store
            .append(vote_event(&poll_id, &o1, "u1", Some("req-1")))
            .await
            .unwrap();
        store
            .append(vote_event(&poll_id, &o1, "u1", Some("req-1")))
            .await
            .unwrap();

        let tallies = store.tally_current(&poll_id).await.unwrap();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].count, 1);
        assert!(store.was_used("u1", "req-1").await.unwrap());
        assert!(!store.was_used("u2", "req-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_page_filters_open_and_cursor() {
        let store = MemoryStore::new();
        let now = Utc::now().fixed_offset();
        for i in 0..3 {
            store
                .insert_poll_at(
                    &format!("poll-{i}"),
                    "Q?",
                    PollStatus::Open,
                    None,
                    now - Duration::minutes(i),
                )
                .unwrap();
        }
        store
            .insert_poll_at("draft", "Q?", PollStatus::Draft, None, now)
            .unwrap();

        let page = store
            .page(FeedPageRequest {
                limit: 10,
                cursor: None,
                quorum: 30,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].slug, "poll-0");

        // Cursor at the newest row's created_at excludes it.
        let rest = store
            .page(FeedPageRequest {
                limit: 10,
                cursor: Some(page[0].created_at),
                quorum: 30,
            })
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].slug, "poll-1");
    }

    #[tokio::test]
    async fn test_card_zero_fills_and_flags_quorum() {
        let store = MemoryStore::new();
        let poll_id = store
            .insert_poll("cats-or-dogs", "Cats or dogs?", PollStatus::Open)
            .unwrap();
        let o1 = store.insert_option(&poll_id, "Cats").unwrap();
        store.insert_option(&poll_id, "Dogs").unwrap();
        store.append(vote_event(&poll_id, &o1, "u1", None)).await.unwrap();

        let card = PollSummarySource::find_by_slug(&store, "cats-or-dogs", 30)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(card.results.total, 1);
        assert!(card.results.warming_up);
        assert_eq!(card.results.items.len(), 2);
        assert_eq!(card.results.items[0].pct, 100.0);
        assert_eq!(card.results.items[1].count, 0);
        assert!(card.results.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_seed_demo_populates_feed() {
        let store = MemoryStore::new();
        store.seed_demo().unwrap();

        let page = store
            .page(FeedPageRequest {
                limit: 21,
                cursor: None,
                quorum: 30,
            })
            .await
            .unwrap();

        assert_eq!(page.len(), 3);
        assert!(page.iter().all(|c| c.options.len() == 2));
        assert!(page.iter().all(|c| c.results.total == 0));
    }
}
