use std::{collections::BTreeMap, fmt};

use time::OffsetDateTime;

use super::grouping::{group_by, GroupStat};
use crate::domain::{Observation, PtuRow};

/// Operator that counts as the transmission system operator; every other
/// GOPACS participant is a distribution operator.
pub const TSO_OPERATOR: &str = "TenneT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperatorClass {
    Tso,
    Dso,
}

impl OperatorClass {
    pub fn of(operator: &str) -> Self {
        if operator == TSO_OPERATOR {
            Self::Tso
        } else {
            Self::Dso
        }
    }
}

impl fmt::Display for OperatorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tso => f.write_str("TSO"),
            Self::Dso => f.write_str("DSO"),
        }
    }
}

/// PTU rows split into TSO and DSO activity.
pub fn by_operator_class(rows: &[PtuRow]) -> Vec<GroupStat<OperatorClass>> {
    group_by(rows, |r| OperatorClass::of(&r.organisation_name))
}

/// A clearing event reassembled from its PTU rows.
///
/// Every PTU row carries its parent's fields verbatim, so any one row of an
/// event reconstructs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClearingEvent {
    pub clearing_event_id: String,
    pub organisation_name: String,
    pub buy_volume_mwh: f64,
    pub sell_volume_mwh: f64,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    pub ptu_count: usize,
}

impl Observation for ClearingEvent {
    fn start(&self) -> OffsetDateTime {
        self.start_time
    }

    fn end(&self) -> OffsetDateTime {
        self.end_time
    }

    fn volume(&self) -> Option<f64> {
        Some(self.buy_volume_mwh)
    }
}

/// Distinct clearing events, ordered by event id.
pub fn clearing_events(rows: &[PtuRow]) -> Vec<ClearingEvent> {
    let mut events: BTreeMap<&str, ClearingEvent> = BTreeMap::new();
    for row in rows {
        events
            .entry(row.clearing_event_id.as_str())
            .and_modify(|e| {
                if row.ptu_start_time.is_some() {
                    e.ptu_count += 1;
                }
            })
            .or_insert_with(|| ClearingEvent {
                clearing_event_id: row.clearing_event_id.clone(),
                organisation_name: row.organisation_name.clone(),
                buy_volume_mwh: row.buy_volume_mwh,
                sell_volume_mwh: row.sell_volume_mwh,
                start_time: row.event_start_time,
                end_time: row.event_end_time,
                ptu_count: usize::from(row.ptu_start_time.is_some()),
            });
    }
    events.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{duration::by_duration, tests::row, DurationBucket};
    use time::macros::datetime;

    #[test]
    fn tennet_is_the_only_tso() {
        assert_eq!(OperatorClass::of("TenneT"), OperatorClass::Tso);
        assert_eq!(OperatorClass::of("Liander"), OperatorClass::Dso);
        assert_eq!(OperatorClass::of("tennet"), OperatorClass::Dso);
    }

    #[test]
    fn events_are_reassembled_from_ptus() {
        let start = datetime!(2024-03-01 08:00:00 UTC);
        let mut rows = Vec::new();
        for i in 0..4 {
            let mut r = row("Enexis", start + time::Duration::minutes(15 * i), 15, Some(2.0));
            r.clearing_event_id = "E-2".to_string();
            r.event_start_time = start;
            r.event_end_time = start + time::Duration::hours(1);
            rows.push(r);
        }
        let mut other = row("TenneT", start, 15, Some(5.0));
        other.clearing_event_id = "E-1".to_string();
        rows.push(other);

        let events = clearing_events(&rows);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].clearing_event_id, "E-1");
        assert_eq!(events[1].ptu_count, 4);
        assert_eq!(events[1].organisation_name, "Enexis");

        // The one-hour event sits in the 1-2 hour bucket at event level.
        let buckets = by_duration(&events);
        assert!(buckets
            .iter()
            .any(|b| b.key == DurationBucket::OneToTwoHours && b.count == 1));

        let classes = by_operator_class(&rows);
        assert_eq!(classes[0].key, OperatorClass::Tso);
        assert_eq!(classes[0].count, 1);
        assert_eq!(classes[1].count, 4);
    }
}
