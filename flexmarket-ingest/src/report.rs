//! Console summaries of a flattened table.

use std::fmt::{self, Write};

use flexmarket_client::{
    analytics::{
        by_category, by_duration, by_hour, by_month, by_operator_class, by_price_tier, by_weekday,
        by_year, clearing_events, cost_per_volume, daily_growth, distinct, price_by_category,
        price_summary,
        ranked_by_count, ranked_by_volume, year_over_year, DurationBucket, GroupStat, OperatorClass,
        StatsError, Summary,
    },
    DispatchRow, Observation, PtuRow,
};

const TOP_N: usize = 10;
const RULE: &str = "================================================================";

fn section(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "\n{RULE}\n{title}\n{RULE}")
}

fn pct(share: Option<f64>) -> String {
    share.map_or_else(|| "n/a".to_string(), |s| format!("{:.2}%", s * 100.0))
}

fn growth(pct: Option<f64>) -> String {
    pct.map_or_else(|| "n/a".to_string(), |p| format!("{p:+.1}%"))
}

fn stat(value: Result<f64, StatsError>) -> String {
    value.map_or_else(|_| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn groups<K: fmt::Display>(out: &mut String, stats: &[GroupStat<K>], unit: &str) -> fmt::Result {
    if stats.is_empty() {
        return writeln!(out, "  (no rows)");
    }
    for s in stats {
        writeln!(
            out,
            "  {:<28} {:>8} rows  {:>14.2} {unit}  {:>8}",
            s.key.to_string(),
            s.count,
            s.volume,
            pct(s.share)
        )?;
    }
    Ok(())
}

fn costs<K: fmt::Display>(out: &mut String, stats: &[GroupStat<K>]) -> fmt::Result {
    if stats.is_empty() {
        return writeln!(out, "  (no rows)");
    }
    for s in stats {
        writeln!(
            out,
            "  {:<28} {:>8} rows  {:>14}  {:>10} per MWh",
            s.key.to_string(),
            s.count,
            stat(s.cost.ok_or(StatsError::NoData)),
            stat(s.cost_per_volume())
        )?;
    }
    Ok(())
}

/// Highest cost first, ties by key.
fn ranked_by_cost<K: Ord + Clone>(stats: &[GroupStat<K>]) -> Vec<GroupStat<K>> {
    let mut ranked = stats.to_vec();
    ranked.sort_by(|a, b| {
        let (a_cost, b_cost) = (a.cost.unwrap_or(0.0), b.cost.unwrap_or(0.0));
        b_cost.total_cmp(&a_cost).then_with(|| a.key.cmp(&b.key))
    });
    ranked
}

fn prices<F>(out: &mut String, rows: &[DispatchRow], category: F) -> fmt::Result
where
    F: Fn(&DispatchRow) -> &str,
{
    for (key, s) in price_by_category(rows, category) {
        writeln!(
            out,
            "  {key:<28} n={:<6} mean={:.2} median={:.2}",
            s.count, s.mean, s.median
        )?;
    }
    Ok(())
}

fn summary(out: &mut String, label: &str, summary: Result<Summary, StatsError>) -> fmt::Result {
    match summary {
        Ok(s) => writeln!(
            out,
            "  {label}: n={} mean={:.2} median={:.2} min={:.2} max={:.2} std={} p10={:.2} p90={:.2}",
            s.count,
            s.mean,
            s.median,
            s.min,
            s.max,
            stat(s.std_dev.ok_or(StatsError::NoData)),
            s.p10,
            s.p90
        ),
        Err(_) => writeln!(out, "  {label}: n/a"),
    }
}

fn date_range<R: Observation>(rows: &[R]) -> String {
    let first = rows.iter().map(|r| r.start()).min();
    let last = rows.iter().map(|r| r.start()).max();
    match (first, last) {
        (Some(first), Some(last)) => format!("{} to {}", first.date(), last.date()),
        _ => "n/a".to_string(),
    }
}

fn yearly(out: &mut String, year_stats: &[GroupStat<i32>], unit: &str) -> fmt::Result {
    for y in year_over_year(year_stats) {
        writeln!(
            out,
            "  {}  {:>8} rows ({:>7})  {:>14.2} {unit} ({:>7})",
            y.year,
            y.count,
            growth(y.count_growth_pct),
            y.volume,
            growth(y.volume_growth_pct)
        )?;
    }
    Ok(())
}

fn daily<R: Observation>(out: &mut String, rows: &[R]) -> fmt::Result {
    let days = daily_growth(rows);
    let Some(latest) = days.last() else {
        return writeln!(out, "  (no rows)");
    };
    let busiest = days.iter().max_by(|a, b| a.count.cmp(&b.count).then(b.date.cmp(&a.date)));
    writeln!(out, "  active days: {}", days.len())?;
    if let Some(day) = busiest {
        writeln!(out, "  busiest day: {} ({} rows)", day.date, day.count)?;
    }
    writeln!(
        out,
        "  latest day: {} (7-day mean {})",
        latest.date,
        stat(latest.rolling_count.ok_or(StatsError::NoData))
    )
}

fn dispatch_report_inner(out: &mut String, rows: &[DispatchRow]) -> fmt::Result {
    section(out, "UKPN FLEXIBILITY DISPATCHES")?;
    writeln!(out, "  dispatches: {}", rows.len())?;
    writeln!(out, "  date range: {}", date_range(rows))?;
    writeln!(out, "  providers: {}", distinct(rows, |r| r.company_name.as_str()))?;
    writeln!(out, "  flexible units: {}", distinct(rows, |r| r.fu_id.as_str()))?;
    writeln!(out, "  zones: {}", distinct(rows, |r| r.zone.as_str()))?;
    let volumes: Vec<f64> = rows.iter().map(|r| r.utilisation_mwh_req).collect();
    summary(out, "utilisation MWh per dispatch", Summary::from_values(volumes))?;
    let cost_summary = Summary::from_values(rows.iter().map(|r| r.total_cost));
    writeln!(out, "  total cost: {}", stat(cost_summary.map(|s| s.total)))?;

    section(out, "TEMPORAL")?;
    writeln!(out, "Per year:")?;
    yearly(out, &by_year(rows), "MWh")?;
    writeln!(out, "Per month:")?;
    groups(out, &by_month(rows), "MWh")?;
    writeln!(out, "Per weekday:")?;
    groups(out, &by_weekday(rows), "MWh")?;
    writeln!(out, "Busiest start hours:")?;
    let hours: Vec<_> = ranked_by_count(&by_hour(rows)).into_iter().take(TOP_N).collect();
    groups(out, &hours, "MWh")?;
    writeln!(out, "Daily activity:")?;
    daily(out, rows)?;

    section(out, "CATEGORIES")?;
    writeln!(out, "Technology:")?;
    groups(out, &ranked_by_volume(&by_category(rows, |r| r.technology.as_str())), "MWh")?;
    writeln!(out, "Product:")?;
    groups(out, &ranked_by_volume(&by_category(rows, |r| r.product.as_str())), "MWh")?;
    writeln!(out, "Dispatch type:")?;
    groups(out, &by_category(rows, |r| r.dispatch_type.as_str()), "MWh")?;
    writeln!(out, "Top zones:")?;
    let zones: Vec<_> = ranked_by_count(&by_category(rows, |r| r.zone.as_str()))
        .into_iter()
        .take(TOP_N)
        .collect();
    groups(out, &zones, "MWh")?;
    writeln!(out, "Top providers:")?;
    let providers: Vec<_> = ranked_by_count(&by_category(rows, |r| r.company_name.as_str()))
        .into_iter()
        .take(TOP_N)
        .collect();
    groups(out, &providers, "MWh")?;

    section(out, "COSTS")?;
    writeln!(out, "  cost per MWh: {}", stat(cost_per_volume(rows)))?;
    let cumulative = daily_growth(rows).last().and_then(|d| d.cumulative_cost);
    writeln!(out, "  cumulative cost: {}", stat(cumulative.ok_or(StatsError::NoData)))?;
    writeln!(out, "Per month:")?;
    costs(out, &by_month(rows))?;
    writeln!(out, "Top zones by cost:")?;
    let zones: Vec<_> = ranked_by_cost(&by_category(rows, |r| r.zone.as_str()))
        .into_iter()
        .take(TOP_N)
        .collect();
    costs(out, &zones)?;
    writeln!(out, "Top providers by cost:")?;
    let providers: Vec<_> = ranked_by_cost(&by_category(rows, |r| r.company_name.as_str()))
        .into_iter()
        .take(TOP_N)
        .collect();
    costs(out, &providers)?;
    writeln!(out, "Per price tier:")?;
    costs(out, &by_price_tier(rows))?;

    section(out, "PRICING")?;
    summary(out, "utilisation price (£/MWh)", price_summary(rows))?;
    writeln!(out, "Price tiers:")?;
    groups(out, &by_price_tier(rows), "MWh")?;
    writeln!(out, "Price by technology:")?;
    prices(out, rows, |r| r.technology.as_str())?;
    writeln!(out, "Price by product:")?;
    prices(out, rows, |r| r.product.as_str())?;
    writeln!(out, "Price by dispatch type:")?;
    prices(out, rows, |r| r.dispatch_type.as_str())?;
    Ok(())
}

fn clearing_report_inner(out: &mut String, rows: &[PtuRow]) -> fmt::Result {
    let events = clearing_events(rows);

    section(out, "GOPACS CLEARED BUCKETS")?;
    writeln!(out, "  clearing events: {}", events.len())?;
    writeln!(out, "  PTUs: {}", rows.iter().filter(|r| r.ptu_start_time.is_some()).count())?;
    writeln!(out, "  date range: {}", date_range(rows))?;
    writeln!(out, "  operators: {}", distinct(rows, |r| r.organisation_name.as_str()))?;
    let volumes: Vec<f64> = rows.iter().filter_map(|r| r.buy_volume_mw).collect();
    summary(out, "buy MW per PTU", Summary::from_values(volumes))?;
    summary(
        out,
        "buy MWh per event",
        Summary::from_values(events.iter().map(|e| e.buy_volume_mwh)),
    )?;

    section(out, "OPERATORS")?;
    for class in by_operator_class(rows) {
        let class_events = distinct(
            events
                .iter()
                .filter(|e| OperatorClass::of(&e.organisation_name) == class.key),
            |e| e.clearing_event_id.as_str(),
        );
        writeln!(
            out,
            "  {:<4} {:>8} PTUs  {:>6} events  {:>14.2} MW  {:>8}",
            class.key.to_string(),
            class.count,
            class_events,
            class.volume,
            pct(class.share)
        )?;
    }
    writeln!(out, "Per operator:")?;
    for op in ranked_by_volume(&by_category(rows, |r| r.organisation_name.as_str())) {
        writeln!(
            out,
            "  {:<28} {:>8} PTUs  {:>14.2} MW  avg {:>8.2} MW  {:>8}",
            op.key,
            op.count,
            op.volume,
            op.mean_volume(),
            pct(op.share)
        )?;
    }

    section(out, "TEMPORAL")?;
    writeln!(out, "Per year:")?;
    yearly(out, &by_year(rows), "MW")?;
    writeln!(out, "Per month:")?;
    groups(out, &by_month(rows), "MW")?;
    writeln!(out, "Per weekday:")?;
    groups(out, &by_weekday(rows), "MW")?;
    writeln!(out, "Per PTU start hour:")?;
    groups(out, &by_hour(rows), "MW")?;
    writeln!(out, "Daily activity:")?;
    daily(out, rows)?;

    section(out, "EVENT DURATIONS")?;
    let buckets = by_duration(&events);
    for bucket in DurationBucket::ALL {
        let count = buckets
            .iter()
            .find(|b| b.key == bucket)
            .map_or(0, |b| b.count);
        writeln!(out, "  {:<12} {count:>8} events", bucket.label())?;
    }
    Ok(())
}

/// Summary report for a UKPN dispatch table.
pub fn dispatch_report(rows: &[DispatchRow]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = dispatch_report_inner(&mut out, rows);
    out
}

/// Summary report for a GOPACS PTU table.
pub fn clearing_report(rows: &[PtuRow]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = clearing_report_inner(&mut out, rows);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, Duration, OffsetDateTime};

    fn ptu(event: &str, operator: &str, start: OffsetDateTime, mw: f64) -> PtuRow {
        PtuRow {
            clearing_event_id: event.to_string(),
            organisation_name: operator.to_string(),
            buy_volume_mwh: 2.0,
            sell_volume_mwh: 2.0,
            event_start_time: start,
            event_end_time: start + Duration::hours(2),
            ptu_start_time: Some(start),
            ptu_end_time: Some(start + Duration::minutes(15)),
            buy_volume_mw: Some(mw),
            sell_volume_mw: Some(mw),
            event_duration_hours: 2.0,
            ptu_duration_minutes: Some(15.0),
        }
    }

    #[test]
    fn empty_tables_report_no_data_instead_of_zero() {
        let ukpn = dispatch_report(&[]);
        assert!(ukpn.contains("dispatches: 0"));
        assert!(ukpn.contains("utilisation MWh per dispatch: n/a"));
        assert!(ukpn.contains("utilisation price (£/MWh): n/a"));
        assert!(ukpn.contains("total cost: n/a"));
        assert!(ukpn.contains("cost per MWh: n/a"));
        assert!(ukpn.contains("cumulative cost: n/a"));

        let gopacs = clearing_report(&[]);
        assert!(gopacs.contains("clearing events: 0"));
        assert!(gopacs.contains("buy MW per PTU: n/a"));
    }

    #[test]
    fn clearing_report_splits_tso_and_dso() {
        let start = datetime!(2024-02-05 09:00 UTC);
        let rows = vec![
            ptu("1", "TenneT", start, 30.0),
            ptu("1", "TenneT", start + Duration::minutes(15), 30.0),
            ptu("2", "Liander", start, 10.0),
        ];

        let report = clearing_report(&rows);
        assert!(report.contains("clearing events: 2"));
        assert!(report.contains("PTUs: 3"));
        assert!(report.contains("TSO"));
        assert!(report.contains("DSO"));
        assert!(report.contains("85.71%"));
        assert!(report.contains("2-4 hours"));
        assert!(report.contains("avg    30.00 MW"));
    }

    fn dispatch(zone: &str, product: &str, dispatch_type: &str, price: f64, mwh: f64) -> DispatchRow {
        let start = datetime!(2024-03-04 17:00 UTC);
        let end = start + Duration::hours(1);
        DispatchRow {
            dispatch_id: DispatchRow::natural_id("FU-1", zone, start, end),
            fu_id: "FU-1".to_string(),
            zone: zone.to_string(),
            company_name: "Flexible Co".to_string(),
            technology: "Battery".to_string(),
            product: product.to_string(),
            dispatch_type: dispatch_type.to_string(),
            start_time: start,
            end_time: end,
            utilisation_mw_req: mwh,
            utilisation_mwh_req: mwh,
            utilisation_price: price,
            availability_mwh_req: 0.0,
            availability_price: 0.0,
            hours_requested: 1.0,
            availability_cost: 0.0,
            utilisation_cost: mwh * price,
            total_cost: mwh * price,
        }
    }

    #[test]
    fn dispatch_report_breaks_down_cost_and_price() {
        let rows = vec![
            dispatch("Zone A", "Secure", "Utilisation", 300.0, 2.0),
            dispatch("Zone B", "Dynamic", "Scheduled", 600.0, 2.0),
        ];

        let report = dispatch_report(&rows);
        assert!(report.contains("total cost: 1800.00"));
        assert!(report.contains("cost per MWh: 450.00"));
        assert!(report.contains("cumulative cost: 1800.00"));
        let by_cost = &report[report.find("Top zones by cost:").unwrap()..];
        assert!(by_cost.find("  Zone B").unwrap() < by_cost.find("  Zone A").unwrap());
        assert!(report.contains("1200.00"));
        assert!(report.contains("600.00 per MWh"));
        assert!(report.contains("Per price tier:"));

        assert!(report.contains("Price by product:"));
        assert!(report.contains("  Dynamic"));
        assert!(report.contains("Price by dispatch type:"));
        assert!(report.contains("  Scheduled"));
    }
}
