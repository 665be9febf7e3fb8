//! Aggregation engine over flattened tables.
//!
//! Every function here is a pure computation over a borrowed slice of rows.
//! Results do not depend on input row order: groups are keyed through
//! ordered maps and floating point sums are taken over sorted values, so
//! a permuted table reproduces every statistic bit for bit.

pub mod distribution;
pub mod duration;
pub mod events;
pub mod grouping;
pub mod growth;
pub mod pricing;

pub use distribution::{mean, median, percentile, std_dev, Summary};
pub use duration::{by_duration, DurationBucket};
pub use events::{by_operator_class, clearing_events, ClearingEvent, OperatorClass, TSO_OPERATOR};
pub use grouping::{
    by_category, by_hour, by_month, by_weekday, by_year, cost_per_volume, group_by,
    ranked_by_count, ranked_by_volume, GroupStat, WeekdayKey, YearMonth,
};
pub use growth::{cumulative_volume, daily_growth, year_over_year, CumulativePoint, DailyPoint, YearOverYear};
pub use pricing::{by_price_tier, price_by_category, price_summary, PriceTier};

/// A scalar statistic was requested over an empty input.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsError {
    #[error("no data: statistic is undefined over an empty input")]
    NoData,
}

/// Finite values in ascending `total_cmp` order.
pub(crate) fn sorted_finite(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Order-independent sum.
pub(crate) fn ordered_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    sorted_finite(values).iter().sum()
}

/// Number of distinct keys among the rows.
pub fn distinct<'a, R: 'a, K: Ord + 'a>(
    rows: impl IntoIterator<Item = &'a R>,
    key: impl Fn(&'a R) -> K,
) -> usize {
    rows.into_iter()
        .map(key)
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}
