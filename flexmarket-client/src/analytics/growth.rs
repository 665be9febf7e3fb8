use time::{Date, OffsetDateTime};

use super::grouping::{group_by, GroupStat};
use crate::domain::Observation;

/// One step of the running total, ordered by row start.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativePoint {
    pub at: OffsetDateTime,
    pub volume: f64,
    pub running_volume: f64,
    pub running_count: usize,
}

/// Running sum of volume ordered by timestamp.
///
/// Rows sharing a timestamp are ordered by volume so the running total is
/// reproducible for any input order.
pub fn cumulative_volume<R: Observation>(rows: &[R]) -> Vec<CumulativePoint> {
    let mut points: Vec<(OffsetDateTime, f64)> = rows
        .iter()
        .map(|r| (r.start(), r.volume().filter(|v| v.is_finite()).unwrap_or(0.0)))
        .collect();
    points.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut running_volume = 0.0;
    points
        .into_iter()
        .enumerate()
        .map(|(i, (at, volume))| {
            running_volume += volume;
            CumulativePoint {
                at,
                volume,
                running_volume,
                running_count: i + 1,
            }
        })
        .collect()
}

const ROLLING_WINDOW: usize = 7;

/// Activity for one calendar date with running totals.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyPoint {
    pub date: Date,
    pub count: usize,
    pub volume: f64,
    pub cumulative_count: usize,
    pub cumulative_volume: f64,
    /// `None` for tables without a cost column.
    pub cost: Option<f64>,
    pub cumulative_cost: Option<f64>,
    /// Mean daily count over this and the previous six active days.
    pub rolling_count: Option<f64>,
}

pub fn daily_growth<R: Observation>(rows: &[R]) -> Vec<DailyPoint> {
    let days = group_by(rows, |r| r.start().date());

    let mut cumulative_count = 0;
    let mut cumulative_volume = 0.0;
    let mut cumulative_cost: Option<f64> = None;
    days.iter()
        .enumerate()
        .map(|(i, day)| {
            cumulative_count += day.count;
            cumulative_volume += day.volume;
            if let Some(cost) = day.cost {
                cumulative_cost = Some(cumulative_cost.unwrap_or(0.0) + cost);
            }
            let rolling_count = (i + 1 >= ROLLING_WINDOW).then(|| {
                let window = &days[i + 1 - ROLLING_WINDOW..=i];
                window.iter().map(|d| d.count as f64).sum::<f64>() / ROLLING_WINDOW as f64
            });
            DailyPoint {
                date: day.key,
                count: day.count,
                volume: day.volume,
                cumulative_count,
                cumulative_volume,
                cost: day.cost,
                cumulative_cost,
                rolling_count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearOverYear {
    pub year: i32,
    pub count: usize,
    pub volume: f64,
    /// Percent change against the previous listed year.
    pub count_growth_pct: Option<f64>,
    pub volume_growth_pct: Option<f64>,
}

fn pct_change(previous: f64, current: f64) -> Option<f64> {
    (previous != 0.0).then(|| (current - previous) / previous * 100.0)
}

pub fn year_over_year(by_year: &[GroupStat<i32>]) -> Vec<YearOverYear> {
    by_year
        .iter()
        .enumerate()
        .map(|(i, year)| {
            let previous = i.checked_sub(1).map(|p| &by_year[p]);
            YearOverYear {
                year: year.key,
                count: year.count,
                volume: year.volume,
                count_growth_pct: previous
                    .and_then(|p| pct_change(p.count as f64, year.count as f64)),
                volume_growth_pct: previous.and_then(|p| pct_change(p.volume, year.volume)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{grouping::by_year, tests::row};
    use time::macros::{date, datetime};

    #[test]
    fn cumulative_volume_is_order_independent() {
        let t = datetime!(2024-01-01 00:00:00 UTC);
        let rows = vec![
            row("TenneT", t + time::Duration::hours(2), 15, Some(0.3)),
            row("TenneT", t, 15, Some(0.1)),
            row("TenneT", t, 15, Some(0.2)),
            row("TenneT", t + time::Duration::hours(1), 15, None),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let points = cumulative_volume(&rows);
        assert_eq!(points, cumulative_volume(&reversed));
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].volume, 0.1);
        assert_eq!(points[3].running_count, 4);
        assert!((points[3].running_volume - 0.6).abs() < 1e-12);
    }

    #[test]
    fn daily_growth_rolls_over_seven_active_days() {
        let mut rows = Vec::new();
        for day in 0..8i64 {
            let start = datetime!(2024-01-01 09:00:00 UTC) + time::Duration::days(day);
            for _ in 0..=day {
                rows.push(row("TenneT", start, 15, Some(1.0)));
            }
        }

        let daily = daily_growth(&rows);
        assert_eq!(daily.len(), 8);
        assert_eq!(daily[0].date, date!(2024-01-01));
        assert_eq!(daily[5].rolling_count, None);
        // Days 1..=7 hold 1..=7 rows.
        assert_eq!(daily[6].rolling_count, Some(4.0));
        assert_eq!(daily[7].rolling_count, Some(5.0));
        assert_eq!(daily[7].cumulative_count, 36);
        assert_eq!(daily[7].cumulative_volume, 36.0);
    }

    #[test]
    fn daily_growth_accumulates_cost_when_present() {
        use crate::analytics::tests::dispatch;

        let mut late = dispatch("Battery", 100.0, 3.0);
        late.start_time += time::Duration::days(2);
        late.end_time += time::Duration::days(2);
        let rows = vec![late, dispatch("Battery", 200.0, 1.0), dispatch("Gas", 50.0, 2.0)];

        let daily = daily_growth(&rows);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].cost, Some(300.0));
        assert_eq!(daily[0].cumulative_cost, Some(300.0));
        assert_eq!(daily[1].cost, Some(300.0));
        assert_eq!(daily[1].cumulative_cost, Some(600.0));

        let ptus = vec![row("TenneT", datetime!(2024-01-01 09:00:00 UTC), 15, Some(1.0))];
        assert_eq!(daily_growth(&ptus)[0].cumulative_cost, None);
    }

    #[test]
    fn year_over_year_growth() {
        let rows = vec![
            row("TenneT", datetime!(2022-05-01 10:00:00 UTC), 15, Some(2.0)),
            row("TenneT", datetime!(2023-05-01 10:00:00 UTC), 15, Some(3.0)),
            row("TenneT", datetime!(2023-06-01 10:00:00 UTC), 15, Some(3.0)),
        ];
        let yoy = year_over_year(&by_year(&rows));
        assert_eq!(yoy.len(), 2);
        assert_eq!(yoy[0].count_growth_pct, None);
        assert_eq!(yoy[1].count_growth_pct, Some(100.0));
        assert_eq!(yoy[1].volume_growth_pct, Some(200.0));
    }
}
