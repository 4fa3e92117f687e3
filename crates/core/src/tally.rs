//! Shared tally aggregation helpers.
//!
//! Both the use cases and the storage backends build result summaries; the
//! zero-fill and rounding policy lives here so every surface reports the
//! same numbers.

use std::collections::HashMap;

use crate::ports::{OptionTally, PollOptionRef, ResultItem, ResultsSummary, Timestamp};

/// Round a count's share of `total` to one decimal percent, half-up.
///
/// Returns `0.0` when `total` is zero. Percentages are not renormalized;
/// a set of rows may sum to 100.0 ± 0.1.
#[must_use]
pub fn round_pct(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((count as f64) * 1000.0 / (total as f64)).round() / 10.0
}

/// Merge a poll's option list with its current tallies.
///
/// Every option appears exactly once, in option-list order, with a count of
/// zero when absent from the tallies. Returns the rows and the vote total.
#[must_use]
pub fn result_items(
    options: &[PollOptionRef],
    tallies: &[OptionTally],
) -> (Vec<ResultItem>, u64) {
    let counts: HashMap<&str, u64> = tallies
        .iter()
        .map(|t| (t.option_id.as_str(), t.count))
        .collect();

    let total: u64 = options
        .iter()
        .map(|o| counts.get(o.option_id.as_str()).copied().unwrap_or(0))
        .sum();

    let items = options
        .iter()
        .map(|o| {
            let count = counts.get(o.option_id.as_str()).copied().unwrap_or(0);
            ResultItem {
                option_id: o.option_id.clone(),
                label: o.label.clone(),
                count,
                pct: round_pct(count, total),
            }
        })
        .collect();

    (items, total)
}

/// Build the embedded results summary for a poll card.
#[must_use]
pub fn summarize(
    options: &[PollOptionRef],
    tallies: &[OptionTally],
    quorum: u64,
    updated_at: Option<Timestamp>,
) -> ResultsSummary {
    let (items, total) = result_items(options, tallies);
    ResultsSummary {
        total,
        updated_at,
        warming_up: total < quorum,
        items,
    }
}
