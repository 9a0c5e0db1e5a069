//! Result shaper: raw API records to a uniform [`ShapedTable`].
//!
//! The expected row shape follows from the query mode. Records that do not fit
//! are rejected rather than patched, so drift in the upstream contract shows up
//! as an error instead of a silently wrong table.

use crate::error::ShapeError;
use crate::models::{Observation, QueryDescriptor, QueryMode, RawRecord, SeriesMeta, ShapedTable};
use serde_json::Value;

/// Value strings BLS uses for "not available".
const NOT_AVAILABLE: [&str; 2] = ["-", ""];

pub fn shape(records: &[RawRecord], query: &QueryDescriptor) -> Result<ShapedTable, ShapeError> {
    match query.mode() {
        QueryMode::Search => records
            .iter()
            .enumerate()
            .map(|(i, r)| series_row(i, r))
            .collect::<Result<Vec<_>, _>>()
            .map(ShapedTable::Series),
        QueryMode::SeriesById | QueryMode::SeriesByRange => records
            .iter()
            .enumerate()
            .map(|(i, r)| observation_row(i, r))
            .collect::<Result<Vec<_>, _>>()
            .map(ShapedTable::Observations),
    }
}

fn series_row(index: usize, rec: &RawRecord) -> Result<SeriesMeta, ShapeError> {
    Ok(SeriesMeta {
        id: required_str(index, rec, "id")?,
        title: required_str(index, rec, "title")?,
        survey: optional_str(index, rec, "survey")?,
        survey_name: optional_str(index, rec, "survey_name")?,
        seasonality: optional_str(index, rec, "seasonality")?,
    })
}

fn observation_row(index: usize, rec: &RawRecord) -> Result<Observation, ShapeError> {
    Ok(Observation {
        id: required_str(index, rec, "id")?,
        period: required_str(index, rec, "period")?,
        value: value_field(index, rec)?,
        footnote: optional_str(index, rec, "footnote")?,
    })
}

fn err(index: usize, message: String) -> ShapeError {
    ShapeError { index, message }
}

fn required_str(index: usize, rec: &RawRecord, key: &str) -> Result<String, ShapeError> {
    match rec.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(err(index, format!("field `{}` should be a string, got {}", key, other))),
        None => Err(err(index, format!("missing field `{}`", key))),
    }
}

/// Absent, null and blank all map to `None`.
fn optional_str(index: usize, rec: &RawRecord, key: &str) -> Result<Option<String>, ShapeError> {
    match rec.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(err(index, format!("field `{}` should be a string, got {}", key, other))),
    }
}

fn value_field(index: usize, rec: &RawRecord) -> Result<Option<f64>, ShapeError> {
    match rec.get("value") {
        None => Err(err(index, "missing field `value`".into())),
        Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| err(index, format!("field `value` out of range: {}", n))),
        Some(Value::String(s)) => {
            let t = s.trim();
            if NOT_AVAILABLE.contains(&t) {
                return Ok(None);
            }
            // BLS sometimes formats large values with thousands separators.
            // `parse` also accepts "NaN" and "inf"; only finite values count.
            t.replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| err(index, format!("field `value` is not numeric: {:?}", s)))
        }
        Some(other) => Err(err(index, format!("field `value` should be a number, got {}", other))),
    }
}
