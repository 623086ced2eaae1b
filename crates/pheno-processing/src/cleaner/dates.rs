//! Week-column parsing for the cleaning stage.

use crate::error::Result;
use crate::types::WEEK_COL;
use crate::utils::is_numeric_dtype;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

/// Accepted date layouts, most common export formats first. Day-first
/// forms take precedence over month-first ones for ambiguous values.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

/// Datetime layouts seen when a spreadsheet exports timestamps.
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"];

/// Spreadsheet serial dates count days from 1899-12-30.
const SERIAL_EPOCH_OFFSET: i64 = 25_569;

/// Parse one raw week value into a calendar date.
pub(crate) fn parse_week_value(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// Interpret a numeric cell as a spreadsheet serial date.
///
/// Values outside a plausible serial range become missing rather than
/// wrapping into nonsense dates.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.trunc() as i64 - SERIAL_EPOCH_OFFSET;
    if !(-25_567..=100_000).contains(&days) {
        return None;
    }
    Some(NaiveDate::default() + chrono::Duration::days(days))
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

/// Replace the week column with a Date-typed series; values that cannot
/// be interpreted become null.
pub(crate) fn parse_week_column(mut frame: DataFrame) -> Result<DataFrame> {
    let series = frame
        .column(WEEK_COL)?
        .as_materialized_series()
        .clone();

    let parsed = match series.dtype() {
        DataType::Date => series,
        DataType::Datetime(_, _) => series.cast(&DataType::Date)?,
        DataType::String => {
            let values = series.str()?;
            let days: Vec<Option<i32>> = values
                .into_iter()
                .map(|opt| opt.and_then(parse_week_value).map(days_since_epoch))
                .collect();
            Series::new(WEEK_COL.into(), days).cast(&DataType::Date)?
        }
        dtype if is_numeric_dtype(dtype) => {
            let floats = series.cast(&DataType::Float64)?;
            let days: Vec<Option<i32>> = floats
                .f64()?
                .into_iter()
                .map(|opt| opt.and_then(serial_to_date).map(days_since_epoch))
                .collect();
            debug!("Interpreting numeric week column as spreadsheet serial dates");
            Series::new(WEEK_COL.into(), days).cast(&DataType::Date)?
        }
        other => {
            debug!("Week column has unusable dtype {:?}; all values become null", other);
            let days: Vec<Option<i32>> = vec![None; series.len()];
            Series::new(WEEK_COL.into(), days).cast(&DataType::Date)?
        }
    };

    frame.replace(WEEK_COL, parsed)?;
    Ok(frame)
}
