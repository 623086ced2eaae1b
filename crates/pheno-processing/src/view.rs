//! Read-only views over a prepared table.
//!
//! Filtering here is what chart and table widgets consume. It always
//! operates on the already-prepared output; thresholds and alerts were
//! fixed when the table was prepared and are never recomputed from a
//! filtered subset.

use crate::error::Result;
use crate::types::{Phenotype, MONTH_COL, TOTAL_COL, WEEK_COL};
use polars::prelude::*;
use std::collections::HashSet;

/// Keep only the rows whose month key is in the inclusion list.
///
/// An empty list keeps everything, mirroring a filter widget with nothing
/// deselected.
pub fn filter_months<S: AsRef<str>>(frame: &DataFrame, months: &[S]) -> Result<DataFrame> {
    if months.is_empty() {
        return Ok(frame.clone());
    }

    let wanted: HashSet<&str> = months.iter().map(|m| m.as_ref()).collect();
    let month_col = frame.column(MONTH_COL)?.as_materialized_series().clone();
    let month_col = month_col.str()?;

    let mask_values: Vec<bool> = month_col
        .into_iter()
        .map(|opt| opt.map(|m| wanted.contains(m)).unwrap_or(false))
        .collect();

    let mask = BooleanChunked::from_slice("mask".into(), &mask_values);
    Ok(frame.filter(&mask)?)
}

/// Project the key columns plus the selected categories' series.
///
/// Used to feed chart widgets that plot a subset of the phenotypes; alert
/// columns come along when the table carries them.
pub fn select_series(frame: &DataFrame, categories: &[Phenotype]) -> Result<DataFrame> {
    let mut columns: Vec<&str> = vec![WEEK_COL, MONTH_COL];
    for category in categories {
        columns.push(category.column_name());
        columns.push(category.pct_column());
        if frame.column(category.alert_column()).is_ok() {
            columns.push(category.alert_column());
        }
    }
    columns.push(TOTAL_COL);

    Ok(frame.select(columns)?)
}
