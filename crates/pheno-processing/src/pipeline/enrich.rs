//! Derived-column computation over the cleaned table.

use crate::config::MissingCountPolicy;
use crate::error::Result;
use crate::types::{week_dates, Phenotype, MONTH_COL, TOTAL_COL, WEEK_COL};
use polars::prelude::*;

/// Adds the derived `month`, `total` and percentage columns.
///
/// Order-preserving and deterministic; never divides by zero (a zero or
/// missing total makes the percentages missing instead).
pub struct Enricher;

impl Enricher {
    pub fn enrich(mut frame: DataFrame, policy: MissingCountPolicy) -> Result<DataFrame> {
        let height = frame.height();

        let months: Vec<Option<String>> = week_dates(&frame)?
            .into_iter()
            .map(|opt| opt.map(|date| format!("{}", date.format("%Y-%m"))))
            .collect();

        let mut count_columns = Vec::with_capacity(Phenotype::ALL.len());
        for phenotype in Phenotype::ALL {
            let counts: Vec<Option<f64>> = frame
                .column(phenotype.column_name())?
                .as_materialized_series()
                .f64()?
                .into_iter()
                .collect();
            count_columns.push(counts);
        }

        let mut totals: Vec<Option<f64>> = Vec::with_capacity(height);
        for row in 0..height {
            let counts: Vec<Option<f64>> =
                count_columns.iter().map(|col| col[row]).collect();
            totals.push(row_total(&counts, policy));
        }

        let mut pct_columns: Vec<Vec<Option<f64>>> =
            vec![Vec::with_capacity(height); Phenotype::ALL.len()];
        for row in 0..height {
            let total = totals[row];
            for (idx, counts) in count_columns.iter().enumerate() {
                let pct = match (counts[row], total) {
                    (Some(count), Some(total)) if total > 0.0 => Some(100.0 * count / total),
                    _ => None,
                };
                pct_columns[idx].push(pct);
            }
        }

        frame.with_column(Series::new(MONTH_COL.into(), months))?;
        frame.with_column(Series::new(TOTAL_COL.into(), totals))?;
        for (idx, phenotype) in Phenotype::ALL.iter().enumerate() {
            frame.with_column(Series::new(
                phenotype.pct_column().into(),
                std::mem::take(&mut pct_columns[idx]),
            ))?;
        }

        // Tidy schema: keys first, then counts, then the derived columns.
        let mut order: Vec<&str> = vec![WEEK_COL, MONTH_COL];
        order.extend(Phenotype::ALL.iter().map(|p| p.column_name()));
        order.push(TOTAL_COL);
        order.extend(Phenotype::ALL.iter().map(|p| p.pct_column()));
        Ok(frame.select(order)?)
    }
}

/// Per-row total under the configured missing-count policy.
fn row_total(counts: &[Option<f64>], policy: MissingCountPolicy) -> Option<f64> {
    match policy {
        MissingCountPolicy::Propagate => {
            let mut sum = 0.0;
            for count in counts {
                sum += (*count)?;
            }
            Some(sum)
        }
        MissingCountPolicy::TreatAsZero => {
            let present: Vec<f64> = counts.iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum())
            }
        }
    }
}
