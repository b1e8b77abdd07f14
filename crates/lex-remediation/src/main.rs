//! CLI entry point for the data remediation pipeline.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use lex_remediation::{
    AnomalyMethod, ArtifactWriter, Contamination, OutlierTreatment, Pipeline, RemediationConfig,
    RemediationReport, StageToggles, VoteRule,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde_json::json;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// CLI-compatible outlier treatment enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierTreatment {
    /// Replace out-of-range values with the nearest IQR bound
    Clip,
    /// Remove rows containing outliers
    Remove,
    /// Keep outliers as-is
    Ignore,
}

impl From<CliOutlierTreatment> for OutlierTreatment {
    fn from(cli: CliOutlierTreatment) -> Self {
        match cli {
            CliOutlierTreatment::Clip => OutlierTreatment::Clip,
            CliOutlierTreatment::Remove => OutlierTreatment::Remove,
            CliOutlierTreatment::Ignore => OutlierTreatment::Ignore,
        }
    }
}

/// CLI-compatible vote rule enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliVoteRule {
    /// Flagged by more than half of the detectors
    Majority,
    /// Flagged by every detector
    Unanimous,
    /// Flagged by any detector
    Any,
}

impl From<CliVoteRule> for VoteRule {
    fn from(cli: CliVoteRule) -> Self {
        match cli {
            CliVoteRule::Majority => VoteRule::Majority,
            CliVoteRule::Unanimous => VoteRule::Unanimous,
            CliVoteRule::Any => VoteRule::Any,
        }
    }
}

/// CLI-compatible anomaly method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliAnomalyMethod {
    /// Local outlier factor
    Density,
    /// Isolation forest
    Isolation,
    /// Robust covariance (Mahalanobis distance)
    Covariance,
}

impl From<CliAnomalyMethod> for AnomalyMethod {
    fn from(cli: CliAnomalyMethod) -> Self {
        match cli {
            CliAnomalyMethod::Density => AnomalyMethod::Density,
            CliAnomalyMethod::Isolation => AnomalyMethod::Isolation,
            CliAnomalyMethod::Covariance => AnomalyMethod::Covariance,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Automated Data Quality Remediation",
    long_about = "Profiles a tabular dataset, scores its quality, plans and applies \
                  remediation, and cross-checks the rows with an anomaly ensemble.\n\n\
                  EXAMPLES:\n  \
                  # Remediate one file\n  \
                  lex-remediation -i data.csv\n\n  \
                  # Every CSV/Parquet file in a directory, 8 at a time\n  \
                  lex-remediation -i data/ --workers 8 -o results/\n\n  \
                  # Preview the plan without touching the data\n  \
                  lex-remediation -i data.csv --dry-run\n\n  \
                  # Machine-readable report\n  \
                  lex-remediation -i data.csv --json | jq .quality.overall_score\n\n  \
                  # Keep every input row and mark the anomalous ones\n  \
                  lex-remediation -i data.csv --flag-anomalies"
)]
struct Args {
    /// CSV or Parquet file, or a directory of them
    #[arg(short, long)]
    input: String,

    /// Output directory for reports and cleaned data
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// JSON configuration file; command-line options override it
    #[arg(short, long)]
    config: Option<String>,

    /// Preview profile, score and plan without executing anything
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the JSON report to stdout instead of a human-readable summary
    ///
    /// Disables all progress logs.
    #[arg(long)]
    json: bool,

    /// Columns with a missing ratio above this are dropped (0.0 - 1.0)
    #[arg(long)]
    missing_drop_threshold: Option<f64>,

    /// Missing ratio separating simple from advanced imputation (0.0 - 1.0)
    #[arg(long)]
    impute_simple_threshold: Option<f64>,

    /// Missing ratio below which nothing is imputed (0.0 - 1.0)
    #[arg(long)]
    impute_floor: Option<f64>,

    /// What to do with values outside the IQR bounds
    #[arg(long, value_enum)]
    outlier_treatment: Option<CliOutlierTreatment>,

    /// Anomaly detectors to run, comma separated
    #[arg(long, value_enum, value_delimiter = ',')]
    anomaly_methods: Option<Vec<CliAnomalyMethod>>,

    /// Expected anomaly rate: "auto" or a number in (0, 0.5]
    #[arg(long)]
    contamination: Option<String>,

    /// How detector flags combine
    #[arg(long, value_enum)]
    anomaly_vote: Option<CliVoteRule>,

    /// Also write the input with an is_anomaly column per row
    #[arg(long)]
    flag_anomalies: bool,

    /// Narrow numeric columns after remediation
    #[arg(long)]
    downcast: bool,

    /// Run anomaly detection after execution instead of alongside it
    #[arg(long)]
    sequential: bool,

    /// Worker threads for directory input
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    no_scoring: bool,

    #[arg(long)]
    no_planning: bool,

    #[arg(long)]
    no_anomaly: bool,

    #[arg(long)]
    no_execution: bool,
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

    let input = Path::new(&args.input);
    if !input.exists() {
        bail!("Input not found: {}", args.input);
    }

    let config = build_config(&args)?;
    let pipeline = Pipeline::builder().config(config).build()?;

    let files = collect_inputs(input)?;
    if files.is_empty() {
        bail!("No CSV or Parquet files found in {}", args.input);
    }

    let mut datasets = Vec::with_capacity(files.len());
    for path in &files {
        info!("Loading dataset from: {}", path.display());
        let df = load_dataset(path)?;
        info!("Dataset loaded successfully: {:?}", df.shape());
        datasets.push((extract_file_stem(path), df));
    }

    // Anomaly verdicts index the input rows, so keep the inputs to mark them.
    let inputs: Vec<Option<DataFrame>> = datasets
        .iter()
        .map(|(_, df)| (args.flag_anomalies && !args.dry_run).then(|| df.clone()))
        .collect();

    let results = if datasets.len() == 1 {
        let (name, df) = datasets.remove(0);
        vec![(name, pipeline.run(df))]
    } else {
        pipeline
            .run_batch(datasets)
            .into_iter()
            .map(|r| (r.name, r.outcome))
            .collect()
    };

    let writer = ArtifactWriter::new(&args.output);
    let mut json_results = Vec::new();
    let mut failures = 0;

    for ((name, outcome), input) in results.into_iter().zip(inputs) {
        match outcome {
            Ok(mut outcome) => {
                if let (Some(input), Some(anomaly)) = (&input, &outcome.report.anomaly) {
                    let path = writer
                        .write_flagged(&name, input, anomaly)
                        .with_context(|| format!("Failed to write flagged rows for {}", name))?;
                    debug!(path = %path.display(), "Flagged rows written");
                }
                if !args.dry_run {
                    let data = outcome
                        .report
                        .execution
                        .is_some()
                        .then_some(&mut outcome.data);
                    let paths = writer
                        .write(&name, &outcome.report, data)
                        .with_context(|| format!("Failed to write artifacts for {}", name))?;
                    debug!(?paths, "Artifacts written");
                }

                if args.json {
                    json_results.push(json!({ "dataset": name, "report": outcome.report }));
                } else if args.dry_run {
                    print_dry_run(&name, &outcome.report);
                } else if !args.quiet {
                    print_human_readable_summary(&name, &outcome.report, &args);
                }
            }
            Err(e) => {
                failures += 1;
                error!("{}: {}", name, e);
                if args.json {
                    json_results.push(json!({ "dataset": name, "error": e }));
                }
            }
        }
    }

    if args.json {
        let output = if json_results.len() == 1 {
            json_results.remove(0)
        } else {
            serde_json::Value::Array(json_results)
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} datasets failed", failures, files.len()));
    }
    Ok(())
}

/// Build the run configuration: file first, then command-line overrides.
fn build_config(args: &Args) -> Result<RemediationConfig> {
    let mut config = match &args.config {
        Some(path) => RemediationConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => RemediationConfig::default(),
    };

    if let Some(v) = args.missing_drop_threshold {
        config.missing_drop_threshold = v;
    }
    if let Some(v) = args.impute_simple_threshold {
        config.impute_simple_threshold = v;
    }
    if let Some(v) = args.impute_floor {
        config.impute_floor = v;
    }
    if let Some(v) = args.outlier_treatment {
        config.outlier_treatment = v.into();
    }
    if let Some(methods) = &args.anomaly_methods {
        config.anomaly_methods = methods.iter().map(|m| AnomalyMethod::from(*m)).collect();
    }
    if let Some(raw) = &args.contamination {
        config.anomaly_contamination = parse_contamination(raw)?;
    }
    if let Some(v) = args.anomaly_vote {
        config.anomaly_vote = v.into();
    }
    if let Some(v) = args.workers {
        config.max_parallel_runs = v;
    }
    config.enable_downcast |= args.downcast;
    config.concurrent_anomaly &= !args.sequential;

    let stages = &mut config.stages;
    stages.scoring &= !args.no_scoring;
    stages.planning &= !args.no_planning;
    stages.anomaly &= !args.no_anomaly;
    stages.execution &= !args.no_execution;

    if args.dry_run {
        config.stages = StageToggles {
            anomaly: false,
            execution: false,
            ..config.stages
        };
    }

    config.validate()?;
    Ok(config)
}

fn parse_contamination(raw: &str) -> Result<Contamination> {
    if raw.eq_ignore_ascii_case("auto") {
        return Ok(Contamination::Auto);
    }
    let rate: f64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("contamination must be \"auto\" or a number, got \"{}\"", raw))?;
    Ok(Contamination::Rate(rate))
}

/// Files to process: the input itself, or the CSV/Parquet files in a directory.
fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "parquet"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn extract_file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

fn load_dataset(path: &Path) -> Result<DataFrame> {
    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));

    if is_parquet {
        let file = File::open(path)?;
        return ParquetReader::new(file)
            .finish()
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    load_csv_with_fallbacks(path)
}

/// Load CSV with multiple fallback strategies
fn load_csv_with_fallbacks(path: &Path) -> Result<DataFrame> {
    // Strategy 1: Standard loading with quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Strategy 2: Read everything as text and let the profiler sort out types
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => {
            warn!("Loaded {} with every column as text", path.display());
            Ok(df)
        }
        Err(e) => {
            error!("Could not read file: {}", e);
            Err(e.into())
        }
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Print the profile and plan for `--dry-run`.
///
/// Uses `println!` intentionally: this is the command's output, not logging.
fn print_dry_run(name: &str, report: &RemediationReport) {
    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - {}", name);
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  Rows: {}", report.rows_before);
    println!("  Columns: {}", report.columns_before);
    println!("  Duplicate rows: {}", report.profile.duplicate_count);
    println!();

    println!("COLUMN PROFILES");
    println!(
        "{:<20} {:<30} {:<10} {:<10} {:<10}",
        "Column", "Semantic Type", "Missing %", "Distinct", "Outliers"
    );
    println!("{}", "-".repeat(80));
    for col in &report.profile.column_profiles {
        println!(
            "{:<20} {:<30} {:<10.1} {:<10} {:<10}",
            truncate_str(&col.name, 19),
            col.inferred_semantic_type.to_string(),
            col.missing_ratio * 100.0,
            col.distinct_count,
            col.outlier_count
        );
    }
    println!();

    if let Some(quality) = &report.quality {
        println!(
            "QUALITY: {:.1} ({}) completeness {:.3}, uniqueness {:.3}, consistency {:.3}",
            quality.overall_score,
            quality.label,
            quality.completeness,
            quality.uniqueness,
            quality.consistency
        );
        for line in &quality.recommendations {
            println!("  - {}", line);
        }
        println!();
    }

    if let Some(plan) = &report.plan {
        println!("PROPOSED ACTIONS ({})", plan.len());
        println!("{}", "-".repeat(40));
        for (i, action) in plan.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, action);
        }
        println!();
    }
    println!("{}", "=".repeat(80));
}

/// Print a human-readable summary of a finished run.
fn print_human_readable_summary(name: &str, report: &RemediationReport, args: &Args) {
    println!();
    println!("{}", "=".repeat(80));
    println!("REMEDIATION COMPLETE - {}", name);
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Rows: {} -> {}   Columns: {} -> {}   Duration: {}ms",
        report.rows_before,
        report.rows_after,
        report.columns_before,
        report.columns_after,
        report.duration_ms
    );

    match (&report.quality, &report.quality_after) {
        (Some(before), Some(after)) => println!(
            "Quality: {:.1} ({}) -> {:.1} ({})",
            before.overall_score, before.label, after.overall_score, after.label
        ),
        (Some(before), None) => println!("Quality: {:.1} ({})", before.overall_score, before.label),
        _ => {}
    }
    println!();

    if let Some(log) = &report.execution {
        println!("Actions ({} applied of {}):", log.applied_count(), log.records.len());
        for record in log.records.iter().take(10) {
            let status = if record.applied { "+" } else { "!" };
            match &record.note {
                Some(note) => println!("  {} {}  [{}]", status, record.action, note),
                None => println!("  {} {}", status, record.action),
            }
        }
        if log.records.len() > 10 {
            println!("  ... and {} more actions", log.records.len() - 10);
        }
        for treatment in &log.outlier_treatments {
            println!(
                "  + {} outliers in {}: {} values [{:.3}, {:.3}]",
                treatment.treatment,
                treatment.column,
                treatment.values_affected,
                treatment.low,
                treatment.high
            );
        }
        println!();
    }

    if let Some(anomaly) = &report.anomaly {
        match &anomaly.reason {
            Some(reason) => println!("Anomalies: not evaluated ({})", reason),
            None => println!(
                "Anomalies: {} rows ({:.2}%) by {} vote of {}",
                anomaly.anomaly_count,
                anomaly.anomaly_percentage,
                anomaly.vote_rule,
                anomaly.detectors.join(", ")
            ),
        }
        for line in &anomaly.recommendations {
            println!("  - {}", line);
        }
        println!();
    }

    println!("Artifacts written to {}", args.output);
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
