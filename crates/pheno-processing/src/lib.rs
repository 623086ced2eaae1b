//! Weekly Phenotype Surveillance Preparation Library
//!
//! Turns a raw spreadsheet export of weekly resistance-phenotype counts
//! (`MRSA`, `VRSA`, `Wild`, `Other`) into an enriched, alert-flagged table
//! ready for charting, filtering and export.
//!
//! # Overview
//!
//! One pass over the raw table runs four stages:
//!
//! - **Cleaning**: header normalization, week-date parsing (bad rows are
//!   dropped and counted), numeric coercion of the count columns (bad
//!   values become missing, never fatal)
//! - **Enrichment**: `month` key, per-row `total`, per-category percentages
//! - **Thresholds**: per-category outlier thresholds over the full dataset,
//!   either a Tukey fence or a fixed configured value
//! - **Alerts**: one Boolean flag per monitored category and row
//!
//! The output is immutable; month/category filtering and CSV export are
//! views over it and never trigger recomputation. Repeating a run on
//! unchanged input is answered from a content-fingerprint cache.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pheno_processing::{Pipeline, PipelineConfig, Phenotype, ThresholdPolicy};
//! use polars::prelude::*;
//!
//! let raw = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("weekly_counts.csv".into()))?
//!     .finish()?;
//!
//! let pipeline = Pipeline::builder()
//!     .config(
//!         PipelineConfig::builder()
//!             .category_policy(Phenotype::Vrsa, ThresholdPolicy::Fixed(2.5))
//!             .build()?,
//!     )
//!     .build()?;
//!
//! let table = pipeline.prepare(&raw)?;
//! for alert in table.alert_records()? {
//!     println!("{} {}: {} > {}", alert.week, alert.category, alert.count, alert.threshold);
//! }
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod reporting;
pub mod types;
pub mod utils;
pub mod view;

// Re-exports for convenient access
pub use cleaner::TableCleaner;
pub use config::{
    ConfigValidationError, MissingCountPolicy, PipelineConfig, PipelineConfigBuilder,
    ThresholdPolicy,
};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use pipeline::{AlertFlagger, Enricher, Pipeline, PipelineBuilder, ThresholdCalculator};
pub use reporting::{ReportGenerator, SurveillanceReport};
pub use types::{
    AlertRecord, CleaningReport, Observation, Phenotype, PreparedTable, MONTH_COL, TOTAL_COL,
    WEEK_COL,
};
pub use view::{filter_months, select_series};
