use flexmarket_client::{DispatchRow, PtuRow};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};

use crate::pipeline::{Envelope, PipelineError, Transform};
use crate::sources::{FieldValue, GopacsEvent, PtuVolume, UkpnDispatch};

/// Parse an upstream timestamp into an offset-aware instant.
///
/// RFC 3339 keeps its offset. Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, PipelineError> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }

    let naive = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ];
    naive
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(raw, *format).ok())
        .map(PrimitiveDateTime::assume_utc)
        .ok_or_else(|| PipelineError::Transform(format!("invalid timestamp '{raw}'")))
}

fn required_timestamp(value: Option<&str>, field: &str) -> Result<OffsetDateTime, PipelineError> {
    let raw = value
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| PipelineError::Transform(format!("missing required field '{field}'")))?;
    parse_timestamp(raw)
        .map_err(|e| PipelineError::Transform(format!("field '{field}': {e}")))
}

fn text(value: &Option<FieldValue>) -> String {
    value.as_ref().map(FieldValue::as_text).unwrap_or_default()
}

fn number(value: &Option<FieldValue>) -> f64 {
    value.as_ref().and_then(FieldValue::as_f64).unwrap_or(0.0)
}

/// Map one UKPN dispatch to its row.
///
/// Categorical fields pass through unchanged, missing numerics become `0.0`.
/// Only the two timestamps are required.
pub fn flatten_dispatch(raw: &UkpnDispatch) -> Result<DispatchRow, PipelineError> {
    let start_time = required_timestamp(raw.start_time_local.as_deref(), "start_time_local")?;
    let end_time = required_timestamp(raw.end_time_local.as_deref(), "end_time_local")?;

    let fu_id = text(&raw.fu_id);
    let zone = text(&raw.zone);

    let utilisation_mwh_req = number(&raw.utilisation_mwh_req);
    let utilisation_price = number(&raw.utilisation_price);
    let availability_mwh_req = number(&raw.availability_mwh_req);
    let availability_price = number(&raw.availability_price);
    let availability_cost = availability_mwh_req * availability_price;
    let utilisation_cost = utilisation_mwh_req * utilisation_price;

    Ok(DispatchRow {
        dispatch_id: DispatchRow::natural_id(&fu_id, &zone, start_time, end_time),
        fu_id,
        zone,
        company_name: text(&raw.company_name),
        technology: text(&raw.technology),
        product: text(&raw.product),
        dispatch_type: text(&raw.dispatch_type),
        start_time,
        end_time,
        utilisation_mw_req: number(&raw.utilisation_mw_req),
        utilisation_mwh_req,
        utilisation_price,
        availability_mwh_req,
        availability_price,
        hours_requested: number(&raw.hours_requested),
        availability_cost,
        utilisation_cost,
        total_cost: availability_cost + utilisation_cost,
    })
}

/// Expand one clearing event into one row per PTU, in PTU order.
///
/// An event without PTUs still yields exactly one row, with the PTU columns
/// left empty. A PTU without start or end rejects the whole event.
pub fn flatten_clearing_event(raw: &GopacsEvent) -> Result<Vec<PtuRow>, PipelineError> {
    let clearing_event_id = raw
        .clearing_event_id
        .as_ref()
        .map(FieldValue::as_text)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| PipelineError::Transform("missing required field 'clearingEventId'".into()))?;
    let event_start_time = required_timestamp(raw.start_time.as_deref(), "startTime")?;
    let event_end_time = required_timestamp(raw.end_time.as_deref(), "endTime")?;

    let parent = PtuRow {
        clearing_event_id,
        organisation_name: text(&raw.organisation_name),
        buy_volume_mwh: number(&raw.buy_volume_mwh),
        sell_volume_mwh: number(&raw.sell_volume_mwh),
        event_start_time,
        event_end_time,
        ptu_start_time: None,
        ptu_end_time: None,
        buy_volume_mw: None,
        sell_volume_mw: None,
        event_duration_hours: (event_end_time - event_start_time).as_seconds_f64() / 3600.0,
        ptu_duration_minutes: None,
    };

    let ptus = raw.ptus.as_deref().unwrap_or_default();
    if ptus.is_empty() {
        return Ok(vec![parent]);
    }

    ptus.iter()
        .enumerate()
        .map(|(i, ptu)| ptu_row(&parent, ptu, i))
        .collect()
}

fn ptu_row(parent: &PtuRow, ptu: &PtuVolume, index: usize) -> Result<PtuRow, PipelineError> {
    let field = |name: &str| format!("clearedVolumesForPtus[{index}].{name}");
    let start = required_timestamp(ptu.start_time.as_deref(), &field("startTime"))?;
    let end = required_timestamp(ptu.end_time.as_deref(), &field("endTime"))?;

    Ok(PtuRow {
        ptu_start_time: Some(start),
        ptu_end_time: Some(end),
        buy_volume_mw: ptu.buy_volume_mw.as_ref().and_then(FieldValue::as_f64),
        sell_volume_mw: ptu.sell_volume_mw.as_ref().and_then(FieldValue::as_f64),
        ptu_duration_minutes: Some((end - start).as_seconds_f64() / 60.0),
        ..parent.clone()
    })
}

#[derive(Clone, Default)]
pub struct DispatchFlattening;

impl Transform<UkpnDispatch, DispatchRow> for DispatchFlattening {
    fn apply(
        &self,
        input: Envelope<UkpnDispatch>,
    ) -> Result<Vec<Envelope<DispatchRow>>, PipelineError> {
        let row = flatten_dispatch(&input.payload)?;
        Ok(vec![Envelope {
            payload: row,
            received_at: input.received_at,
        }])
    }
}

#[derive(Clone, Default)]
pub struct ClearingEventFlattening;

impl Transform<GopacsEvent, PtuRow> for ClearingEventFlattening {
    fn apply(&self, input: Envelope<GopacsEvent>) -> Result<Vec<Envelope<PtuRow>>, PipelineError> {
        let received_at = input.received_at;
        Ok(flatten_clearing_event(&input.payload)?
            .into_iter()
            .map(|payload| Envelope {
                payload,
                received_at,
            })
            .collect())
    }
}
