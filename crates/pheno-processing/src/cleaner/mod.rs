//! Cleaning stage for raw surveillance tables.
//!
//! This module provides functionality for:
//! - Normalizing header names and mapping the first column to `week`
//! - Parsing the week column into calendar dates
//! - Dropping rows with unparseable or duplicate weeks
//! - Coercing the category count columns to numeric

mod coercion;
mod dates;

use crate::error::{ProcessingError, Result, ResultExt};
use crate::types::{CleaningReport, Phenotype, WEEK_COL};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

/// Cleans one raw table into the shape the rest of the pipeline expects.
pub struct TableCleaner;

impl TableCleaner {
    /// Clean a raw table.
    ///
    /// Takes ownership of the input; the caller's snapshot is never
    /// mutated. Row- and field-level problems are recovered and counted
    /// in the returned [`CleaningReport`]; the only hard failure is a
    /// structurally missing required column.
    pub fn clean(&self, frame: DataFrame) -> Result<(DataFrame, CleaningReport)> {
        let mut report = CleaningReport {
            rows_in: frame.height(),
            ..CleaningReport::default()
        };

        info!("Cleaning raw table ({} rows)", frame.height());

        let frame = normalize_headers(frame, &mut report)?;
        ensure_category_columns(&frame)?;

        let frame = dates::parse_week_column(frame).context("While parsing week column")?;
        let frame = drop_unparseable_weeks(frame, &mut report)?;
        let frame = drop_duplicate_weeks(frame, &mut report)?;
        let frame = coercion::coerce_count_columns(frame, &mut report)
            .context("While coercing count columns")?;

        report.rows_out = frame.height();
        debug!(
            "Cleaning done: {} rows in, {} rows out",
            report.rows_in, report.rows_out
        );

        Ok((frame, report))
    }
}

/// Trim header whitespace and force the first column to be `week`.
fn normalize_headers(mut frame: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
    if frame.width() == 0 {
        return Err(ProcessingError::MissingColumn(WEEK_COL.to_string()));
    }

    let renames: Vec<(String, String)> = frame
        .get_column_names()
        .iter()
        .filter_map(|name| {
            let trimmed = name.trim();
            (trimmed != name.as_str()).then(|| (name.to_string(), trimmed.to_string()))
        })
        .collect();

    for (old, new) in renames {
        frame.rename(&old, new.as_str().into())?;
        report.add_action(format!("Trimmed header '{}' to '{}'", old, new));
    }

    let first = frame.get_column_names()[0].to_string();
    if first != WEEK_COL {
        frame.rename(&first, WEEK_COL.into())?;
        report.add_action(format!("Renamed first column '{}' to '{}'", first, WEEK_COL));
        debug!("Renamed first column '{}' to '{}'", first, WEEK_COL);
    }

    Ok(frame)
}

/// Fail if any of the four category columns is absent.
fn ensure_category_columns(frame: &DataFrame) -> Result<()> {
    for phenotype in Phenotype::ALL {
        let name = phenotype.column_name();
        if frame.column(name).is_err() {
            return Err(ProcessingError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Drop rows whose week failed to parse, counting them.
fn drop_unparseable_weeks(frame: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
    let mask = frame
        .column(WEEK_COL)?
        .as_materialized_series()
        .is_not_null();

    let dropped = (&mask)
        .into_iter()
        .filter(|kept| !kept.unwrap_or(false))
        .count();
    if dropped == 0 {
        return Ok(frame);
    }

    let frame = frame.filter(&mask)?;
    report.dropped_dates = dropped;
    report.add_action(format!("Dropped {} row(s) with unparseable week dates", dropped));
    debug!("Dropped {} rows with unparseable week dates", dropped);
    Ok(frame)
}

/// Keep only the first row for each week value.
fn drop_duplicate_weeks(frame: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
    let days = frame
        .column(WEEK_COL)?
        .as_materialized_series()
        .cast(&DataType::Int32)?;
    let days = days.i32()?.clone();

    let mut seen: HashSet<i32> = HashSet::with_capacity(days.len());
    let mut mask_values = Vec::with_capacity(days.len());
    for opt in &days {
        match opt {
            Some(day) => mask_values.push(seen.insert(day)),
            // Nulls were already dropped; keep anything unexpected.
            None => mask_values.push(true),
        }
    }

    let dropped = mask_values.iter().filter(|kept| !**kept).count();
    if dropped == 0 {
        return Ok(frame);
    }

    let mask = BooleanChunked::from_slice("mask".into(), &mask_values);
    let frame = frame.filter(&mask)?;
    report.dropped_duplicate_weeks = dropped;
    report.add_action(format!("Dropped {} duplicate week row(s)", dropped));
    debug!("Dropped {} duplicate week rows", dropped);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        df![
            "Semaine" => ["2024-01-01", "2024-01-08", "N/A", "2024-01-08"],
            " MRSA " => ["3", "10", "4", "11"],
            "VRSA" => ["0", "1", "0", "1"],
            "Wild" => ["20", "18", "19", "18"],
            "Other" => ["2", "0", "1", "0"],
        ]
        .unwrap()
    }

    #[test]
    fn test_clean_renames_first_column_to_week() {
        let (frame, _) = TableCleaner.clean(raw_frame()).unwrap();
        assert!(frame.column(WEEK_COL).is_ok());
        assert!(frame.column("Semaine").is_err());
    }

    #[test]
    fn test_clean_trims_headers() {
        let (frame, report) = TableCleaner.clean(raw_frame()).unwrap();
        assert!(frame.column("MRSA").is_ok());
        assert!(report.actions.iter().any(|a| a.contains("Trimmed header")));
    }

    #[test]
    fn test_clean_drops_unparseable_dates_silently() {
        let (frame, report) = TableCleaner.clean(raw_frame()).unwrap();
        // The N/A row is gone, the duplicate week row is gone.
        assert_eq!(frame.height(), 2);
        assert_eq!(report.dropped_dates, 1);
        assert_eq!(report.dropped_duplicate_weeks, 1);
        assert_eq!(report.rows_in, 4);
        assert_eq!(report.rows_out, 2);
    }

    #[test]
    fn test_clean_missing_category_column_is_an_error() {
        let frame = df![
            "Semaine" => ["2024-01-01"],
            "MRSA" => ["3"],
            "Wild" => ["20"],
            "Other" => ["2"],
        ]
        .unwrap();

        let err = TableCleaner.clean(frame).unwrap_err();
        assert!(err.is_missing_column());
        assert!(err.to_string().contains("VRSA"));
    }

    #[test]
    fn test_clean_empty_frame_is_an_error() {
        let err = TableCleaner.clean(DataFrame::empty()).unwrap_err();
        assert!(err.is_missing_column());
    }

    #[test]
    fn test_clean_all_dates_unparseable_yields_empty_table() {
        let frame = df![
            "Semaine" => ["N/A", "soon"],
            "MRSA" => ["3", "1"],
            "VRSA" => ["0", "0"],
            "Wild" => ["20", "20"],
            "Other" => ["2", "2"],
        ]
        .unwrap();

        let (frame, report) = TableCleaner.clean(frame).unwrap();
        assert_eq!(frame.height(), 0);
        assert_eq!(report.dropped_dates, 2);
    }

    #[test]
    fn test_clean_does_not_reorder_rows() {
        let frame = df![
            "Week" => ["2024-02-05", "2024-01-01", "2024-01-22"],
            "MRSA" => [1i64, 2, 3],
            "VRSA" => [0i64, 0, 0],
            "Wild" => [9i64, 9, 9],
            "Other" => [0i64, 0, 0],
        ]
        .unwrap();

        let (frame, _) = TableCleaner.clean(frame).unwrap();
        let mrsa = frame.column("MRSA").unwrap().as_materialized_series();
        let values: Vec<f64> = mrsa.f64().unwrap().into_iter().flatten().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }
}
