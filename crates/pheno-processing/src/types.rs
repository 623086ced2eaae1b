//! Core data types shared across the preparation pipeline.

use crate::error::{ProcessingError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the normalized week column (always the first input column).
pub const WEEK_COL: &str = "week";
/// Name of the derived `YYYY-MM` month key column.
pub const MONTH_COL: &str = "month";
/// Name of the derived per-row total column.
pub const TOTAL_COL: &str = "total";

/// One of the four monitored resistance phenotypes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phenotype {
    Mrsa,
    Vrsa,
    Wild,
    Other,
}

impl Phenotype {
    /// All phenotypes, in canonical column order.
    pub const ALL: [Phenotype; 4] = [
        Phenotype::Mrsa,
        Phenotype::Vrsa,
        Phenotype::Wild,
        Phenotype::Other,
    ];

    /// The count column name as it appears in the input table.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Mrsa => "MRSA",
            Self::Vrsa => "VRSA",
            Self::Wild => "Wild",
            Self::Other => "Other",
        }
    }

    /// Name of the derived percentage column for this phenotype.
    pub fn pct_column(&self) -> &'static str {
        match self {
            Self::Mrsa => "MRSA_pct",
            Self::Vrsa => "VRSA_pct",
            Self::Wild => "Wild_pct",
            Self::Other => "Other_pct",
        }
    }

    /// Name of the derived alert column for this phenotype.
    pub fn alert_column(&self) -> &'static str {
        match self {
            Self::Mrsa => "MRSA_alert",
            Self::Vrsa => "VRSA_alert",
            Self::Wild => "Wild_alert",
            Self::Other => "Other_alert",
        }
    }

    /// Parse a phenotype from user input (case-insensitive).
    pub fn parse(s: &str) -> Option<Phenotype> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mrsa" => Some(Self::Mrsa),
            "vrsa" => Some(Self::Vrsa),
            "wild" => Some(Self::Wild),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Phenotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Diagnostics collected while cleaning a raw table.
///
/// Nothing in here is fatal; the report exists so callers can see how much
/// of the input survived and why the rest did not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningReport {
    /// Number of rows in the raw input.
    pub rows_in: usize,
    /// Number of rows in the cleaned output.
    pub rows_out: usize,
    /// Rows dropped because the week value could not be parsed as a date.
    pub dropped_dates: usize,
    /// Rows dropped as later duplicates of an already-seen week.
    pub dropped_duplicate_weeks: usize,
    /// Per-column count of values coerced to missing during numeric coercion.
    pub coerced_missing: BTreeMap<String, usize>,
    /// Human-readable log of the actions taken.
    pub actions: Vec<String>,
}

impl CleaningReport {
    pub fn add_action(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }
}

/// A single raised alert, extracted from the flagged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub week: NaiveDate,
    pub category: Phenotype,
    pub count: f64,
    pub threshold: f64,
}

/// Typed row view of the enriched+flagged table.
///
/// The pipeline itself works column-wise on the DataFrame; this view exists
/// for consumers (table widgets, tests) that want one record per week.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub week: NaiveDate,
    pub month: String,
    pub counts: BTreeMap<Phenotype, Option<f64>>,
    pub total: Option<f64>,
    pub percentages: BTreeMap<Phenotype, Option<f64>>,
    /// Alert flags for the monitored phenotypes only.
    pub alerts: BTreeMap<Phenotype, bool>,
}

/// Immutable output of one pipeline run.
///
/// Filtering and export operate on this value; nothing downstream ever
/// mutates it or triggers recomputation.
#[derive(Debug, Clone)]
pub struct PreparedTable {
    /// The enriched and flagged table.
    pub frame: DataFrame,
    /// Per-category outlier thresholds, computed over the full dataset.
    pub thresholds: BTreeMap<Phenotype, f64>,
    /// Diagnostics from the cleaning stage.
    pub cleaning: CleaningReport,
    /// Content fingerprint of the raw input this table was prepared from.
    pub fingerprint: u64,
}

impl PreparedTable {
    /// Extract the typed row view of the table.
    pub fn observations(&self) -> Result<Vec<Observation>> {
        let height = self.frame.height();
        let weeks = week_dates(&self.frame)?;

        let months = self
            .frame
            .column(MONTH_COL)?
            .as_materialized_series()
            .str()?
            .clone();
        let totals = self
            .frame
            .column(TOTAL_COL)?
            .as_materialized_series()
            .f64()?
            .clone();

        let mut counts_cols = Vec::with_capacity(Phenotype::ALL.len());
        let mut pct_cols = Vec::with_capacity(Phenotype::ALL.len());
        for phenotype in Phenotype::ALL {
            counts_cols.push(
                self.frame
                    .column(phenotype.column_name())?
                    .as_materialized_series()
                    .f64()?
                    .clone(),
            );
            pct_cols.push(
                self.frame
                    .column(phenotype.pct_column())?
                    .as_materialized_series()
                    .f64()?
                    .clone(),
            );
        }

        let mut alert_cols = Vec::new();
        for phenotype in Phenotype::ALL {
            if let Ok(col) = self.frame.column(phenotype.alert_column()) {
                alert_cols.push((phenotype, col.as_materialized_series().bool()?.clone()));
            }
        }

        let mut observations = Vec::with_capacity(height);
        for i in 0..height {
            let Some(week) = weeks.get(i).copied().flatten() else {
                continue;
            };

            let mut counts = BTreeMap::new();
            let mut percentages = BTreeMap::new();
            for (idx, phenotype) in Phenotype::ALL.iter().enumerate() {
                counts.insert(*phenotype, counts_cols[idx].get(i));
                percentages.insert(*phenotype, pct_cols[idx].get(i));
            }

            let mut alerts = BTreeMap::new();
            for (phenotype, col) in &alert_cols {
                alerts.insert(*phenotype, col.get(i).unwrap_or(false));
            }

            observations.push(Observation {
                week,
                month: months.get(i).unwrap_or_default().to_string(),
                counts,
                total: totals.get(i),
                percentages,
                alerts,
            });
        }

        Ok(observations)
    }

    /// Collect the raised alerts as flat records, ordered by week.
    pub fn alert_records(&self) -> Result<Vec<AlertRecord>> {
        let weeks = week_dates(&self.frame)?;
        let mut records = Vec::new();

        for phenotype in Phenotype::ALL {
            let Ok(alert_col) = self.frame.column(phenotype.alert_column()) else {
                continue;
            };
            let alerts = alert_col.as_materialized_series().bool()?.clone();
            let counts = self
                .frame
                .column(phenotype.column_name())?
                .as_materialized_series()
                .f64()?
                .clone();
            let threshold = *self.thresholds.get(&phenotype).ok_or_else(|| {
                ProcessingError::MissingColumn(phenotype.alert_column().to_string())
            })?;

            for i in 0..self.frame.height() {
                if alerts.get(i).unwrap_or(false)
                    && let (Some(Some(week)), Some(count)) =
                        (weeks.get(i).copied(), counts.get(i))
                {
                    records.push(AlertRecord {
                        week,
                        category: phenotype,
                        count,
                        threshold,
                    });
                }
            }
        }

        records.sort_by(|a, b| a.week.cmp(&b.week).then(a.category.cmp(&b.category)));
        Ok(records)
    }
}

/// Decode the Date-typed week column into calendar dates.
pub(crate) fn week_dates(frame: &DataFrame) -> Result<Vec<Option<NaiveDate>>> {
    let days = frame
        .column(WEEK_COL)?
        .as_materialized_series()
        .cast(&DataType::Int32)?;
    let days = days.i32()?;
    Ok(days
        .into_iter()
        .map(|opt| opt.map(|d| NaiveDate::default() + chrono::Duration::days(d as i64)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phenotype_column_names() {
        assert_eq!(Phenotype::Mrsa.column_name(), "MRSA");
        assert_eq!(Phenotype::Vrsa.pct_column(), "VRSA_pct");
        assert_eq!(Phenotype::Wild.alert_column(), "Wild_alert");
    }

    #[test]
    fn test_phenotype_parse() {
        assert_eq!(Phenotype::parse("mrsa"), Some(Phenotype::Mrsa));
        assert_eq!(Phenotype::parse(" VRSA "), Some(Phenotype::Vrsa));
        assert_eq!(Phenotype::parse("wild"), Some(Phenotype::Wild));
        assert_eq!(Phenotype::parse("unknown"), None);
    }

    #[test]
    fn test_phenotype_serializes_to_column_spelling() {
        let json = serde_json::to_string(&Phenotype::Mrsa).unwrap();
        assert_eq!(json, "\"MRSA\"");
    }

    #[test]
    fn test_cleaning_report_default_is_empty() {
        let report = CleaningReport::default();
        assert_eq!(report.rows_in, 0);
        assert_eq!(report.dropped_dates, 0);
        assert!(report.actions.is_empty());
    }
}
