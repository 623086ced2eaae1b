//! Outlier-threshold computation.
//!
//! Thresholds are always derived from the full cleaned dataset, never a
//! filtered view, so downstream filtering cannot change alert outcomes.

use crate::config::{PipelineConfig, ThresholdPolicy};
use crate::error::Result;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Computes per-category outlier thresholds.
pub struct ThresholdCalculator;

impl ThresholdCalculator {
    /// Compute the threshold for one category's count column.
    ///
    /// `values` are the non-missing counts of the full dataset. Degenerate
    /// input never fails: an all-equal column has IQR 0 and the threshold
    /// collapses to Q3; an empty column yields 0.0.
    pub fn compute(values: &[f64], policy: ThresholdPolicy) -> f64 {
        match policy {
            ThresholdPolicy::Fixed(value) => value,
            ThresholdPolicy::TukeyFence { k } => {
                if values.is_empty() {
                    return 0.0;
                }
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

                let q1 = quantile_linear(&sorted, 0.25);
                let q3 = quantile_linear(&sorted, 0.75);
                q3 + k * (q3 - q1)
            }
        }
    }

    /// Compute thresholds for every monitored category over the full table.
    pub fn compute_all(
        frame: &DataFrame,
        config: &PipelineConfig,
    ) -> Result<BTreeMap<crate::types::Phenotype, f64>> {
        let mut thresholds = BTreeMap::new();

        for &category in &config.monitored {
            let counts: Vec<f64> = frame
                .column(category.column_name())?
                .as_materialized_series()
                .f64()?
                .into_iter()
                .flatten()
                .collect();

            let policy = config.policy_for(category);
            let threshold = Self::compute(&counts, policy);
            debug!(
                "Threshold for {}: {} ({:?}, {} samples)",
                category,
                threshold,
                policy,
                counts.len()
            );
            thresholds.insert(category, threshold);
        }

        Ok(thresholds)
    }
}

/// Quantile of an already-sorted sample by linear interpolation between
/// order statistics (rank `p * (n - 1)`), the estimator spreadsheet and
/// dataframe tools use by default.
fn quantile_linear(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let rank = p * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }

    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
