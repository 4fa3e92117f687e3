//! Core business logic for opine.
//!
//! The use-case layer of the application: feed pagination, vote casting and
//! results aggregation, expressed as services over abstract data-source
//! ports. The services hold no state of their own; every invocation is pure
//! orchestration over the injected sources, so one instance can serve any
//! number of concurrent requests.

pub mod ports;
pub mod services;
pub mod tally;

pub use ports::{
    CurrentVote, FeedPageRequest, OptionTally, PollCard, PollFeedSource, PollOptionRef, PollRef,
    PollStatus, PollSummarySource, PollsSource, ResultItem, ResultsSummary, Timestamp, VoteEvent,
    VotesSource,
};
pub use services::{
    DEFAULT_QUORUM, FEED_DEFAULT_LIMIT, FEED_MAX_LIMIT,
    feed::{FeedPage, FeedQuery, FeedService, PersonalizedCard, PersonalizedFeedPage},
    poll::{CastVoteInput, PollResults, PollService},
};
