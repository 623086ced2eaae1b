//! CLI entry point for the surveillance preparation pipeline.

use anyhow::{anyhow, bail, Result};
use clap::{Parser, ValueEnum};
use pheno_processing::{
    filter_months, select_series, MissingCountPolicy, Phenotype, Pipeline, PipelineConfig,
    ReportGenerator, ThresholdPolicy,
};
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// CLI-compatible threshold policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPolicy {
    /// Tukey fence computed from the dataset (Q3 + k*IQR)
    Tukey,
    /// Fixed thresholds supplied via --fixed-threshold
    Fixed,
}

/// CLI-compatible missing-count policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMissingPolicy {
    /// Sum the counts that are present
    Zero,
    /// Any missing count makes the row total missing
    Propagate,
}

impl From<CliMissingPolicy> for MissingCountPolicy {
    fn from(cli: CliMissingPolicy) -> Self {
        match cli {
            CliMissingPolicy::Zero => MissingCountPolicy::TreatAsZero,
            CliMissingPolicy::Propagate => MissingCountPolicy::Propagate,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Pheno Watch Team",
    version,
    about = "Weekly phenotype surveillance preparation",
    long_about = "Cleans a weekly phenotype count table, derives totals and\n\
                  percentages, computes outlier thresholds and flags alerts.\n\n\
                  EXAMPLES:\n  \
                  # Tukey-fence thresholds on MRSA and VRSA (default)\n  \
                  pheno-processing -i weekly_counts.csv\n\n  \
                  # Frozen thresholds from a previous campaign\n  \
                  pheno-processing -i weekly_counts.csv --policy fixed \\\n      \
                  --fixed-threshold MRSA=31.875 --fixed-threshold VRSA=2.5\n\n  \
                  # Export only the selected months as CSV\n  \
                  pheno-processing -i weekly_counts.csv --months 2024-01,2024-02"
)]
struct Args {
    /// Path to the CSV file with weekly counts
    #[arg(short, long)]
    input: String,

    /// Output directory for the prepared table and reports
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Month keys (YYYY-MM, comma-separated) to keep in the exported view
    ///
    /// Filtering applies to the export only; thresholds always come from
    /// the full dataset.
    #[arg(long, value_delimiter = ',')]
    months: Vec<String>,

    /// Categories to monitor for alerts (default: MRSA,VRSA)
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Categories whose series are kept in the exported view (default: all)
    #[arg(long, value_delimiter = ',')]
    series: Vec<String>,

    /// Threshold policy for monitored categories
    #[arg(long, value_enum, default_value = "tukey")]
    policy: CliPolicy,

    /// Fixed threshold for one category, as CATEGORY=VALUE (repeatable)
    #[arg(long)]
    fixed_threshold: Vec<String>,

    /// Fence multiplier for the Tukey policy
    #[arg(long, default_value = "1.5")]
    tukey_k: f64,

    /// How a missing count participates in the row total
    #[arg(long, value_enum, default_value = "zero")]
    missing_policy: CliMissingPolicy,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write a detailed JSON report to the output directory
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Skip writing the prepared CSV
    #[arg(long)]
    no_export: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and the final summary)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading dataset from: {}", args.input);
    let raw = load_csv_with_fallbacks(&args.input)?;
    info!("Dataset loaded: {:?}", raw.shape());

    let config = build_config(&args)?;
    let pipeline = Pipeline::builder()
        .config(config.clone())
        .build()
        .map_err(|e| anyhow!("{}", e))?;

    let table = match pipeline.prepare(&raw) {
        Ok(table) => table,
        Err(e) => {
            error!("Preparation failed: {}", e);
            return Err(anyhow!("Preparation failed: {}", e));
        }
    };

    let report = ReportGenerator::build_report(Some(&args.input), &table, &config)
        .map_err(|e| anyhow!("{}", e))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let output_dir = PathBuf::from(&args.output);
    let stem = extract_file_stem(&args.input);

    if !args.no_export {
        let view = build_export_view(&table.frame, &args)?;
        let export_path = output_dir.join(format!("{}_prepared.csv", stem));
        pheno_processing::reporting::write_table_csv(&view, &export_path)
            .map_err(|e| anyhow!("{}", e))?;
    }

    if args.emit_report {
        ReportGenerator::write_report_to_file(&report, &output_dir, &stem)
            .map_err(|e| anyhow!("{}", e))?;
    }

    print_human_readable_summary(&report, &args);
    Ok(())
}

/// Translate CLI flags into a validated pipeline configuration.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let monitored = if args.categories.is_empty() {
        vec![Phenotype::Mrsa, Phenotype::Vrsa]
    } else {
        parse_categories(&args.categories)?
    };

    let fixed = parse_fixed_thresholds(&args.fixed_threshold)?;

    let mut builder = PipelineConfig::builder()
        .monitored(monitored.clone())
        .missing_counts(args.missing_policy.into());

    match args.policy {
        CliPolicy::Tukey => {
            builder = builder.default_policy(ThresholdPolicy::TukeyFence { k: args.tukey_k });
        }
        CliPolicy::Fixed => {
            // Fixed mode needs an explicit value for every monitored category.
            for category in &monitored {
                if !fixed.iter().any(|(c, _)| c == category) {
                    bail!(
                        "--policy fixed requires --fixed-threshold {}=<value>",
                        category
                    );
                }
            }
        }
    }

    for (category, value) in fixed {
        builder = builder.category_policy(category, ThresholdPolicy::Fixed(value));
    }

    builder.build().map_err(|e| anyhow!("{}", e))
}

/// Parse a list of category names, rejecting unknown ones.
fn parse_categories(names: &[String]) -> Result<Vec<Phenotype>> {
    names
        .iter()
        .map(|name| {
            Phenotype::parse(name)
                .ok_or_else(|| anyhow!("Unknown category '{}' (expected MRSA, VRSA, Wild or Other)", name))
        })
        .collect()
}

/// Parse repeatable `CATEGORY=VALUE` threshold arguments.
fn parse_fixed_thresholds(entries: &[String]) -> Result<Vec<(Phenotype, f64)>> {
    entries
        .iter()
        .map(|entry| {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected CATEGORY=VALUE, got '{}'", entry))?;
            let category = Phenotype::parse(name)
                .ok_or_else(|| anyhow!("Unknown category '{}' in '{}'", name, entry))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid threshold value in '{}'", entry))?;
            Ok((category, value))
        })
        .collect()
}

/// Apply the view filters chosen on the command line.
fn build_export_view(frame: &DataFrame, args: &Args) -> Result<DataFrame> {
    let mut view = filter_months(frame, &args.months).map_err(|e| anyhow!("{}", e))?;

    if !args.series.is_empty() {
        let categories = parse_categories(&args.series)?;
        view = select_series(&view, &categories).map_err(|e| anyhow!("{}", e))?;
    }

    debug!("Export view: {} rows x {} columns", view.height(), view.width());
    Ok(view)
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

/// Print a human-readable summary of the run.
///
/// This uses `println!` intentionally: it is the primary output of the
/// tool and should be visible regardless of log level settings.
fn print_human_readable_summary(report: &pheno_processing::SurveillanceReport, args: &Args) {
    println!();
    println!("{}", "=".repeat(72));
    println!("SURVEILLANCE PREPARATION COMPLETE");
    println!("{}", "=".repeat(72));
    println!();

    println!(
        "Input:  {} ({} rows, {} kept)",
        args.input, report.rows_before, report.rows_after
    );
    if report.cleaning.dropped_dates > 0 {
        println!(
            "        {} row(s) dropped for unparseable week dates",
            report.cleaning.dropped_dates
        );
    }
    if report.cleaning.dropped_duplicate_weeks > 0 {
        println!(
            "        {} duplicate week row(s) dropped",
            report.cleaning.dropped_duplicate_weeks
        );
    }
    for (column, count) in &report.cleaning.coerced_missing {
        println!("        {} value(s) in '{}' coerced to missing", count, column);
    }
    println!();

    println!("Thresholds:");
    for (category, threshold) in &report.thresholds {
        let policy = report
            .policies
            .get(category)
            .map(String::as_str)
            .unwrap_or("?");
        println!("  {:<6} {:>10.3}   ({})", category.to_string(), threshold, policy);
    }
    println!();

    if report.alerts.is_empty() {
        println!("No alerts raised.");
    } else {
        println!("Alerts ({}):", report.alerts.len());
        for alert in &report.alerts {
            println!(
                "  {}  {:<6} count {:>8.1} > threshold {:.3}",
                alert.week, alert.category.to_string(), alert.count, alert.threshold
            );
        }
    }
    println!();

    if !args.no_export {
        println!(
            "Prepared table: {}/{}_prepared.csv",
            args.output,
            extract_file_stem(&args.input)
        );
    }
    if args.emit_report {
        println!(
            "Report:         {}/{}_report.json",
            args.output,
            extract_file_stem(&args.input)
        );
    }
    println!("{}", "=".repeat(72));
}

/// Load CSV with multiple fallback strategies
fn load_csv_with_fallbacks(path: &str) -> Result<DataFrame> {
    // Strategy 1: standard loading with quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(frame) => return Ok(frame),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Strategy 2: semicolon-separated exports (common from spreadsheets)
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_separator(b';'))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(frame) => return Ok(frame),
        Err(e) => {
            debug!("Semicolon-separated loading failed: {}", e);
        }
    }

    // Strategy 3: pre-clean stray quotes and empty lines
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cleaned = clean_csv_content(&content);
            use std::io::Cursor;
            let cursor = Cursor::new(cleaned);

            CsvReadOptions::default()
                .with_infer_schema_length(Some(100))
                .with_has_header(true)
                .into_reader_with_file_handle(cursor)
                .finish()
                .map_err(|e| e.into())
        }
        Err(e) => {
            error!("Could not read file: {}", e);
            Err(e.into())
        }
    }
}

/// Clean CSV content
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
