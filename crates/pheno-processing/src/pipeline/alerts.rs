//! Alert flagging against the computed thresholds.

use crate::error::Result;
use crate::types::Phenotype;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Adds one Boolean alert column per monitored category.
pub struct AlertFlagger;

impl AlertFlagger {
    /// Flag rows whose count strictly exceeds the category threshold.
    ///
    /// A missing count never raises an alert. Total and order-preserving.
    pub fn flag(
        mut frame: DataFrame,
        thresholds: &BTreeMap<Phenotype, f64>,
    ) -> Result<DataFrame> {
        for (&category, &threshold) in thresholds {
            let flags: Vec<bool> = frame
                .column(category.column_name())?
                .as_materialized_series()
                .f64()?
                .into_iter()
                .map(|opt| opt.map(|count| count > threshold).unwrap_or(false))
                .collect();

            let raised = flags.iter().filter(|f| **f).count();
            if raised > 0 {
                debug!("{} alert(s) raised for {}", raised, category);
            }

            frame.with_column(Series::new(category.alert_column().into(), flags))?;
        }

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(entries: &[(Phenotype, f64)]) -> BTreeMap<Phenotype, f64> {
        entries.iter().copied().collect()
    }

    fn flags(frame: &DataFrame, name: &str) -> Vec<bool> {
        frame
            .column(name)
            .unwrap()
            .as_materialized_series()
            .bool()
            .unwrap()
            .into_iter()
            .map(|opt| opt.unwrap())
            .collect()
    }

    #[test]
    fn test_flag_strictly_greater_than() {
        let frame = df![
            "MRSA" => [4.0, 5.0, 6.0],
        ]
        .unwrap();

        let frame =
            AlertFlagger::flag(frame, &thresholds(&[(Phenotype::Mrsa, 5.0)])).unwrap();
        assert_eq!(flags(&frame, "MRSA_alert"), vec![false, false, true]);
    }

    #[test]
    fn test_flag_missing_count_never_alerts() {
        let frame = df![
            "MRSA" => [Some(10.0), None],
        ]
        .unwrap();

        let frame =
            AlertFlagger::flag(frame, &thresholds(&[(Phenotype::Mrsa, 5.0)])).unwrap();
        assert_eq!(flags(&frame, "MRSA_alert"), vec![true, false]);
    }

    #[test]
    fn test_flag_only_monitored_categories_get_columns() {
        let frame = df![
            "MRSA" => [1.0],
            "VRSA" => [1.0],
            "Wild" => [1.0],
            "Other" => [1.0],
        ]
        .unwrap();

        let frame =
            AlertFlagger::flag(frame, &thresholds(&[(Phenotype::Mrsa, 0.5)])).unwrap();
        assert!(frame.column("MRSA_alert").is_ok());
        assert!(frame.column("Wild_alert").is_err());
    }
}
