//! Numeric coercion of the category count columns.

use crate::error::Result;
use crate::types::{CleaningReport, Phenotype};
use crate::utils::{is_numeric_dtype, parse_numeric_string};
use polars::prelude::*;
use tracing::debug;

/// Force the four category columns to Float64 counts.
///
/// Values that cannot be read as a non-negative number become null, counted
/// per column in the report. Field-level only; the row itself survives.
pub(crate) fn coerce_count_columns(
    mut frame: DataFrame,
    report: &mut CleaningReport,
) -> Result<DataFrame> {
    for phenotype in Phenotype::ALL {
        let name = phenotype.column_name();
        let series = frame.column(name)?.as_materialized_series().clone();
        let (coerced, newly_missing) = coerce_series(&series)?;

        if newly_missing > 0 {
            report
                .coerced_missing
                .insert(name.to_string(), newly_missing);
            report.add_action(format!(
                "Coerced {} invalid value(s) in '{}' to missing",
                newly_missing, name
            ));
            debug!("Coerced {} invalid values in '{}'", newly_missing, name);
        }

        frame.replace(name, coerced)?;
    }

    Ok(frame)
}

/// Coerce a single series to Float64 counts, returning the new series and
/// how many previously-present values became missing.
fn coerce_series(series: &Series) -> Result<(Series, usize)> {
    let values: Vec<Option<f64>> = match series.dtype() {
        DataType::String => {
            let strings = series.str()?;
            strings
                .into_iter()
                .map(|opt| opt.and_then(parse_numeric_string))
                .collect()
        }
        dtype if is_numeric_dtype(dtype) => {
            let floats = series.cast(&DataType::Float64)?;
            floats.f64()?.into_iter().collect()
        }
        _ => vec![None; series.len()],
    };

    // Counts are non-negative; anything below zero reads as data entry
    // noise and becomes missing too.
    let values: Vec<Option<f64>> = values
        .into_iter()
        .map(|opt| opt.filter(|v| v.is_finite() && *v >= 0.0))
        .collect();

    let nulls_before = series.null_count();
    let nulls_after = values.iter().filter(|v| v.is_none()).count();
    let coerced = Series::new(series.name().clone(), values);

    Ok((coerced, nulls_after.saturating_sub(nulls_before)))
}
