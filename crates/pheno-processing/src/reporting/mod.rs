//! Run reports and table export.
//!
//! A [`SurveillanceReport`] is the serializable summary of one pipeline
//! run: what survived cleaning, which thresholds were in force and which
//! weeks raised alerts. The CSV writer exports any (possibly filtered)
//! view of the prepared table with its column names unchanged.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::types::{AlertRecord, CleaningReport, Phenotype, PreparedTable};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Serializable summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SurveillanceReport {
    /// Source path, when the table came from a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub cleaning: CleaningReport,
    /// Threshold in force per monitored category.
    pub thresholds: BTreeMap<Phenotype, f64>,
    /// Human-readable description of each category's threshold policy.
    pub policies: BTreeMap<Phenotype, String>,
    pub alerts: Vec<AlertRecord>,
}

/// Builds and writes surveillance reports.
pub struct ReportGenerator;

impl ReportGenerator {
    /// Build the run report from a prepared table.
    pub fn build_report(
        input_file: Option<&str>,
        table: &PreparedTable,
        config: &PipelineConfig,
    ) -> Result<SurveillanceReport> {
        let mut policies = BTreeMap::new();
        for &category in &config.monitored {
            policies.insert(category, format!("{:?}", config.policy_for(category)));
        }

        Ok(SurveillanceReport {
            input_file: input_file.map(|s| s.to_string()),
            rows_before: table.cleaning.rows_in,
            rows_after: table.cleaning.rows_out,
            cleaning: table.cleaning.clone(),
            thresholds: table.thresholds.clone(),
            policies,
            alerts: table.alert_records()?,
        })
    }

    /// Write the report as pretty-printed JSON next to the exported data.
    ///
    /// Returns the path of the written file.
    pub fn write_report_to_file(
        report: &SurveillanceReport,
        output_dir: &Path,
        stem: &str,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("{}_report.json", stem));
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}

/// Export a table view as CSV with headers, column names unchanged.
pub fn write_table_csv(frame: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    let mut frame = frame.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)?;
    info!("Exported {} rows to {}", frame.height(), path.display());
    Ok(())
}
