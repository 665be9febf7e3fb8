use std::{collections::BTreeMap, fmt};

use time::Weekday;

use super::{ordered_sum, StatsError};
use crate::domain::Observation;

/// Statistics for one grouping key.
///
/// `share` is this group's fraction of the grand total volume. It is kept
/// unrounded; `None` when the grand total is zero and shares are undefined.
/// `cost` is `None` when no row in the group carries a cost.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStat<K> {
    pub key: K,
    pub count: usize,
    pub volume: f64,
    pub share: Option<f64>,
    pub cost: Option<f64>,
}

impl<K> GroupStat<K> {
    /// Mean volume per row in the group.
    pub fn mean_volume(&self) -> f64 {
        self.volume / self.count as f64
    }

    /// Cost per unit of volume; `NoData` without a cost or with zero volume.
    pub fn cost_per_volume(&self) -> Result<f64, StatsError> {
        cost_ratio(self.cost, self.volume)
    }
}

pub(crate) fn cost_ratio(cost: Option<f64>, volume: f64) -> Result<f64, StatsError> {
    match cost {
        Some(cost) if volume != 0.0 && volume.is_finite() => Ok(cost / volume),
        _ => Err(StatsError::NoData),
    }
}

/// Total cost over total volume for the whole table.
pub fn cost_per_volume<R: Observation>(rows: &[R]) -> Result<f64, StatsError> {
    let costs: Vec<f64> = rows.iter().filter_map(|r| r.cost()).collect();
    let cost = (!costs.is_empty()).then(|| ordered_sum(costs));
    cost_ratio(cost, ordered_sum(rows.iter().filter_map(|r| r.volume())))
}

/// Partition rows by `key` and compute count, summed volume and share of
/// total for every partition, ordered by key.
pub fn group_by<'a, R, K, F>(rows: impl IntoIterator<Item = &'a R>, key: F) -> Vec<GroupStat<K>>
where
    R: Observation + 'a,
    K: Ord,
    F: Fn(&R) -> K,
{
    let mut groups: BTreeMap<K, (usize, Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(key(row)).or_default();
        entry.0 += 1;
        if let Some(v) = row.volume() {
            entry.1.push(v);
        }
        if let Some(c) = row.cost() {
            entry.2.push(c);
        }
    }

    let mut stats: Vec<GroupStat<K>> = groups
        .into_iter()
        .map(|(key, (count, volumes, costs))| GroupStat {
            key,
            count,
            volume: ordered_sum(volumes),
            share: None,
            cost: (!costs.is_empty()).then(|| ordered_sum(costs)),
        })
        .collect();

    let total: f64 = stats.iter().map(|s| s.volume).sum();
    if total != 0.0 && total.is_finite() {
        for s in &mut stats {
            s.share = Some(s.volume / total);
        }
    }
    stats
}

/// Calendar month of a row's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u8,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// ISO weekday ordered Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayKey(pub Weekday);

impl Ord for WeekdayKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .number_from_monday()
            .cmp(&other.0.number_from_monday())
    }
}

impl PartialOrd for WeekdayKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for WeekdayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn by_year<R: Observation>(rows: &[R]) -> Vec<GroupStat<i32>> {
    group_by(rows, |r| r.start().year())
}

pub fn by_month<R: Observation>(rows: &[R]) -> Vec<GroupStat<YearMonth>> {
    group_by(rows, |r| {
        let start = r.start();
        YearMonth {
            year: start.year(),
            month: u8::from(start.month()),
        }
    })
}

pub fn by_weekday<R: Observation>(rows: &[R]) -> Vec<GroupStat<WeekdayKey>> {
    group_by(rows, |r| WeekdayKey(r.start().weekday()))
}

pub fn by_hour<R: Observation>(rows: &[R]) -> Vec<GroupStat<u8>> {
    group_by(rows, |r| r.start().hour())
}

/// Group by a categorical column (operator, technology, product, provider).
pub fn by_category<R, F>(rows: &[R], category: F) -> Vec<GroupStat<String>>
where
    R: Observation,
    F: Fn(&R) -> &str,
{
    group_by(rows, |r| category(r).to_owned())
}

/// Largest groups first by row count; ties keep key order.
pub fn ranked_by_count<K: Clone>(stats: &[GroupStat<K>]) -> Vec<GroupStat<K>> {
    let mut out = stats.to_vec();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// Largest groups first by volume; ties keep key order.
pub fn ranked_by_volume<K: Clone>(stats: &[GroupStat<K>]) -> Vec<GroupStat<K>> {
    let mut out = stats.to_vec();
    out.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::row;
    use time::macros::datetime;

    #[test]
    fn temporal_groups_sort_naturally() {
        let rows = vec![
            row("Stedin", datetime!(2024-02-04 23:15:00 UTC), 60, Some(2.0)), // Sunday
            row("Stedin", datetime!(2023-12-04 08:00:00 UTC), 60, Some(1.0)), // Monday
            row("Stedin", datetime!(2024-02-06 00:45:00 UTC), 60, Some(4.0)), // Tuesday
        ];

        let years: Vec<i32> = by_year(&rows).into_iter().map(|g| g.key).collect();
        assert_eq!(years, vec![2023, 2024]);

        let months: Vec<String> = by_month(&rows).iter().map(|g| g.key.to_string()).collect();
        assert_eq!(months, vec!["2023-12", "2024-02"]);

        let weekdays: Vec<String> = by_weekday(&rows).iter().map(|g| g.key.to_string()).collect();
        assert_eq!(weekdays, vec!["Monday", "Tuesday", "Sunday"]);

        let hours: Vec<u8> = by_hour(&rows).into_iter().map(|g| g.key).collect();
        assert_eq!(hours, vec![0, 8, 23]);
    }

    #[test]
    fn category_shares_sum_to_one() {
        let rows = vec![
            row("TenneT", datetime!(2024-01-01 10:00:00 UTC), 15, Some(3.0)),
            row("Liander", datetime!(2024-01-01 10:15:00 UTC), 15, Some(1.5)),
            row("Stedin", datetime!(2024-01-01 10:30:00 UTC), 15, Some(0.7)),
            row("TenneT", datetime!(2024-01-01 10:45:00 UTC), 15, Some(2.2)),
            row("Enexis", datetime!(2024-01-01 11:00:00 UTC), 15, None),
        ];

        let stats = by_category(&rows, |r| r.organisation_name.as_str());
        assert_eq!(stats.len(), 4);

        let total_share: f64 = stats.iter().filter_map(|s| s.share).sum();
        assert!((total_share - 1.0).abs() < 1e-12);

        let enexis = stats.iter().find(|s| s.key == "Enexis").unwrap();
        assert_eq!(enexis.count, 1);
        assert_eq!(enexis.volume, 0.0);
        assert_eq!(enexis.share, Some(0.0));
    }

    #[test]
    fn zero_total_volume_leaves_shares_undefined() {
        let rows = vec![row("TenneT", datetime!(2024-01-01 10:00:00 UTC), 15, None)];
        let stats = by_category(&rows, |r| r.organisation_name.as_str());
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].share, None);
    }

    #[test]
    fn permuted_rows_give_identical_groups() {
        let mut rows = Vec::new();
        for i in 0..40u32 {
            let operator = ["TenneT", "Liander", "Enexis"][(i % 3) as usize];
            let start = datetime!(2023-11-27 00:00:00 UTC) + time::Duration::hours(i64::from(i) * 37);
            rows.push(row(operator, start, 15, Some(0.1 * f64::from(i) + 0.013)));
        }
        let mut permuted = rows.clone();
        permuted.reverse();
        permuted.swap(3, 17);

        assert_eq!(by_year(&rows), by_year(&permuted));
        assert_eq!(by_month(&rows), by_month(&permuted));
        assert_eq!(by_weekday(&rows), by_weekday(&permuted));
        assert_eq!(by_hour(&rows), by_hour(&permuted));
        assert_eq!(
            by_category(&rows, |r| r.organisation_name.as_str()),
            by_category(&permuted, |r| r.organisation_name.as_str()),
        );
    }

    #[test]
    fn ranking_breaks_ties_by_key() {
        let rows = vec![
            row("B", datetime!(2024-01-01 10:00:00 UTC), 15, Some(1.0)),
            row("A", datetime!(2024-01-01 10:00:00 UTC), 15, Some(1.0)),
            row("C", datetime!(2024-01-01 10:00:00 UTC), 15, Some(1.0)),
            row("C", datetime!(2024-01-01 10:15:00 UTC), 15, Some(1.0)),
        ];
        let stats = by_category(&rows, |r| r.organisation_name.as_str());
        let keys: Vec<String> = ranked_by_count(&stats).into_iter().map(|g| g.key).collect();
        assert_eq!(keys, vec!["C", "A", "B"]);
    }

    #[test]
    fn dispatch_groups_sum_cost_and_price_it_per_mwh() {
        use crate::analytics::tests::dispatch;

        let rows = vec![
            dispatch("Battery", 300.0, 2.0),
            dispatch("Battery", 500.0, 1.0),
            dispatch("Gas", 250.0, 4.0),
        ];
        let stats = by_category(&rows, |r| r.technology.as_str());
        assert_eq!(stats[0].key, "Battery");
        assert_eq!(stats[0].cost, Some(1100.0));
        assert!((stats[0].cost_per_volume().unwrap() - 1100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats[1].cost, Some(1000.0));
        assert_eq!(stats[1].cost_per_volume(), Ok(250.0));

        assert!((cost_per_volume(&rows).unwrap() - 2100.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn cost_per_volume_is_no_data_without_cost_or_volume() {
        use crate::analytics::tests::dispatch;

        let ptus = vec![row("TenneT", datetime!(2024-01-01 10:00:00 UTC), 15, Some(3.0))];
        assert_eq!(by_year(&ptus)[0].cost, None);
        assert_eq!(by_year(&ptus)[0].cost_per_volume(), Err(StatsError::NoData));
        assert_eq!(cost_per_volume(&ptus), Err(StatsError::NoData));

        let idle = vec![dispatch("Battery", 300.0, 0.0)];
        assert_eq!(by_year(&idle)[0].cost, Some(0.0));
        assert_eq!(cost_per_volume(&idle), Err(StatsError::NoData));
        let empty: Vec<crate::domain::DispatchRow> = Vec::new();
        assert_eq!(cost_per_volume(&empty), Err(StatsError::NoData));
    }

    #[test]
    fn mean_volume_divides_by_row_count() {
        let rows = vec![
            row("TenneT", datetime!(2024-01-01 10:00:00 UTC), 15, Some(3.0)),
            row("TenneT", datetime!(2024-01-01 10:15:00 UTC), 15, Some(1.0)),
            row("TenneT", datetime!(2024-01-01 10:30:00 UTC), 15, None),
        ];
        let stats = by_category(&rows, |r| r.organisation_name.as_str());
        assert!((stats[0].mean_volume() - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_table_yields_empty_groups() {
        let rows: Vec<crate::domain::PtuRow> = Vec::new();
        assert!(by_year(&rows).is_empty());
        assert!(by_month(&rows).is_empty());
        assert!(by_weekday(&rows).is_empty());
        assert!(by_hour(&rows).is_empty());
        assert!(by_category(&rows, |r| r.organisation_name.as_str()).is_empty());
    }
}
