use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Observation;
use crate::table::TableRow;

/// One UKPN flexibility dispatch, flattened.
///
/// Categorical fields keep the casing the API returned. Numeric fields that
/// were missing upstream are stored as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRow {
    pub dispatch_id: String,
    pub fu_id: String,
    pub zone: String,
    pub company_name: String,
    pub technology: String,
    pub product: String,
    pub dispatch_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub utilisation_mw_req: f64,
    pub utilisation_mwh_req: f64,
    pub utilisation_price: f64,
    pub availability_mwh_req: f64,
    pub availability_price: f64,
    pub hours_requested: f64,
    pub availability_cost: f64,
    pub utilisation_cost: f64,
    pub total_cost: f64,
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

impl DispatchRow {
    /// Stable identifier for a dispatch, derived from the fields that make it
    /// unique (flexible unit, zone and window).
    pub fn natural_id(
        fu_id: &str,
        zone: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> String {
        let mut h = blake3::Hasher::new();
        hash_str(&mut h, fu_id);
        hash_str(&mut h, zone);
        h.update(&start.unix_timestamp_nanos().to_le_bytes());
        h.update(&end.unix_timestamp_nanos().to_le_bytes());
        h.finalize().to_hex().to_string()
    }
}

impl Observation for DispatchRow {
    fn start(&self) -> OffsetDateTime {
        self.start_time
    }

    fn end(&self) -> OffsetDateTime {
        self.end_time
    }

    fn volume(&self) -> Option<f64> {
        Some(self.utilisation_mwh_req)
    }

    fn cost(&self) -> Option<f64> {
        Some(self.total_cost)
    }
}

impl TableRow for DispatchRow {
    fn natural_key(&self) -> String {
        self.dispatch_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn natural_id_is_stable_and_field_sensitive() {
        let start = datetime!(2024-01-15 17:00:00 UTC);
        let end = datetime!(2024-01-15 18:30:00 UTC);

        let a = DispatchRow::natural_id("FU-1", "Zone A", start, end);
        let b = DispatchRow::natural_id("FU-1", "Zone A", start, end);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        // Length prefixing keeps "ab"+"c" distinct from "a"+"bc".
        let c = DispatchRow::natural_id("ab", "c", start, end);
        let d = DispatchRow::natural_id("a", "bc", start, end);
        assert_ne!(c, d);

        let e = DispatchRow::natural_id("FU-1", "Zone A", start, datetime!(2024-01-15 19:00:00 UTC));
        assert_ne!(a, e);
    }
}
