//! Use-case services.

pub mod feed;
pub mod poll;

/// Default page size when the caller does not specify a limit.
pub const FEED_DEFAULT_LIMIT: u64 = 20;

/// Hard cap on the feed page size. Services may be configured with a
/// different cap; this is the default.
pub const FEED_MAX_LIMIT: u64 = 50;

/// Default quorum below which results are flagged as warming up.
pub const DEFAULT_QUORUM: u64 = 30;
