//! Postgres-backed implementations of the core data-source ports.

pub mod feed;
pub mod poll;
pub mod vote;

pub use feed::FeedRepository;
pub use poll::PollRepository;
pub use vote::VoteRepository;
