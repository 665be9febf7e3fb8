use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Observation;
use crate::table::TableRow;

/// One PTU of a GOPACS clearing event, carrying every field of its parent
/// event.
///
/// The PTU columns are empty only for the single row emitted for an event
/// that reported no PTUs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtuRow {
    pub clearing_event_id: String,
    pub organisation_name: String,
    pub buy_volume_mwh: f64,
    pub sell_volume_mwh: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub event_start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub event_end_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ptu_start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ptu_end_time: Option<OffsetDateTime>,
    pub buy_volume_mw: Option<f64>,
    pub sell_volume_mw: Option<f64>,
    pub event_duration_hours: f64,
    pub ptu_duration_minutes: Option<f64>,
}

impl Observation for PtuRow {
    fn start(&self) -> OffsetDateTime {
        self.ptu_start_time.unwrap_or(self.event_start_time)
    }

    fn end(&self) -> OffsetDateTime {
        self.ptu_end_time.unwrap_or(self.event_end_time)
    }

    fn volume(&self) -> Option<f64> {
        self.buy_volume_mw
    }
}

impl TableRow for PtuRow {
    fn natural_key(&self) -> String {
        let start = self.start().unix_timestamp_nanos();
        format!("{}|{start}", self.clearing_event_id)
    }
}
