//! CLI entry point for the gap-filling workflow.

use anyhow::{Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use gap_fill::{
    Aggregation, BoundaryPolicy, ColumnSelector, Frequency, GapFillConfig, GapFillPipeline,
    GapFillReport, GapFillResult, InterpolationMethod, column_missing, entity_ids, filter_entity,
    load_readings, missing_table, pivot_endpoints, write_report_to_file,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible interpolation method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMethod {
    /// Straight line between neighbours, ignoring time spacing
    Linear,
    /// Straight line weighted by elapsed time
    Time,
    /// Local polynomial of degree --order
    Polynomial,
    /// Interpolating B-spline of degree --order (1-5)
    Spline,
    /// Cubic Hermite matching values and implied slopes
    FromDerivatives,
}

impl CliMethod {
    fn into_method(self, order: Option<usize>) -> Result<InterpolationMethod> {
        let require_order = |name: &str| {
            order.ok_or_else(|| anyhow!("--order is required with --method {}", name))
        };
        Ok(match self {
            CliMethod::Linear => InterpolationMethod::Linear,
            CliMethod::Time => InterpolationMethod::Time,
            CliMethod::Polynomial => InterpolationMethod::Polynomial {
                order: require_order("polynomial")?,
            },
            CliMethod::Spline => InterpolationMethod::Spline {
                order: require_order("spline")?,
            },
            CliMethod::FromDerivatives => InterpolationMethod::FromDerivatives,
        })
    }
}

/// CLI-compatible downsampling reducer enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliReducer {
    Mean,
    Median,
    Min,
    Max,
    Sum,
    First,
    Last,
}

impl From<CliReducer> for Aggregation {
    fn from(cli: CliReducer) -> Self {
        match cli {
            CliReducer::Mean => Aggregation::Mean,
            CliReducer::Median => Aggregation::Median,
            CliReducer::Min => Aggregation::Min,
            CliReducer::Max => Aggregation::Max,
            CliReducer::Sum => Aggregation::Sum,
            CliReducer::First => Aggregation::First,
            CliReducer::Last => Aggregation::Last,
        }
    }
}

/// CLI-compatible boundary policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliBoundary {
    /// Keep leading/trailing gaps missing
    Leave,
    /// Cut leading/trailing gaps off the series
    Drop,
    /// Fill with --boundary-value
    Constant,
    /// Fill with the mean of known values
    Mean,
    /// Fill with the median of known values
    Median,
    /// Repeat the nearest known value
    Nearest,
}

impl CliBoundary {
    fn into_policy(self, value: Option<f64>) -> Result<BoundaryPolicy> {
        Ok(match self {
            CliBoundary::Leave => BoundaryPolicy::Leave,
            CliBoundary::Drop => BoundaryPolicy::Drop,
            CliBoundary::Constant => BoundaryPolicy::Constant(
                value.ok_or_else(|| anyhow!("--boundary-value is required with --boundary constant"))?,
            ),
            CliBoundary::Mean => BoundaryPolicy::Mean,
            CliBoundary::Median => BoundaryPolicy::Median,
            CliBoundary::Nearest => BoundaryPolicy::Nearest,
        })
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Missing-value analysis and gap filling for meter time series",
    long_about = "Downsamples one meter endpoint to a coarse grid, re-expands it to the fine \
                  grid and fills the resulting gaps, reporting how close the fill comes to \
                  the observed readings.\n\n\
                  EXAMPLES:\n  \
                  # Missing-value overview of a file\n  \
                  gap-fill -i readings.csv --summary\n\n  \
                  # Daily means re-expanded to hourly, filled with a cubic spline\n  \
                  gap-fill -i readings.csv -e 1001 --method spline --order 3\n\n  \
                  # Pick an endpoint by name and export the series\n  \
                  gap-fill -i readings.csv -e 1001 --endpoint 2 --export -o results/"
)]
struct Args {
    /// Path to the CSV file of readings
    #[arg(short, long)]
    input: String,

    /// Entity (meter) to analyse
    #[arg(short, long)]
    entity: Option<String>,

    /// Position of the endpoint column after pivoting (0-based)
    #[arg(short, long, conflicts_with = "endpoint")]
    column: Option<usize>,

    /// Endpoint identifier to analyse
    #[arg(long)]
    endpoint: Option<String>,

    /// Coarse grid, e.g. 1D, 6h, 1W
    #[arg(long)]
    coarse: Option<Frequency>,

    /// Fine grid, e.g. 1h, 15min
    #[arg(long)]
    fine: Option<Frequency>,

    /// Interpolation method
    #[arg(short, long, value_enum)]
    method: Option<CliMethod>,

    /// Order for polynomial and spline methods
    #[arg(long)]
    order: Option<usize>,

    /// Reducer used when downsampling
    #[arg(long, value_enum)]
    reducer: Option<CliReducer>,

    /// Treatment of leading/trailing gaps
    #[arg(long, value_enum)]
    boundary: Option<CliBoundary>,

    /// Fill value for --boundary constant
    #[arg(long)]
    boundary_value: Option<f64>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<String>,

    /// Write observed, gapped and filled series as CSV to the output directory
    #[arg(long)]
    export: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write a JSON report to the output directory
    ///
    /// The report will be saved as <entity>_<endpoint>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Output directory for exports and reports
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Rows of the side-by-side table to print
    #[arg(long, default_value = "10")]
    preview_rows: usize,

    /// Only print the missing-value summary
    #[arg(long)]
    summary: bool,
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

    let config = build_config(&args)?;

    if args.summary {
        return run_summary(&args, &config);
    }

    let pipeline = GapFillPipeline::builder().config(config).build()?;
    match pipeline.run_file(&args.input) {
        Ok(result) => handle_pipeline_output(&result, &args),
        Err(e) => {
            error!("Gap filling failed: {}", e);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            }
            Err(anyhow!("Gap filling failed: {}", e))
        }
    }
}

/// Merge the optional config file with command-line overrides.
fn build_config(args: &Args) -> Result<GapFillConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            GapFillConfig::from_json_file(path)?
        }
        None => GapFillConfig::default(),
    };

    if let Some(entity) = &args.entity {
        config.entity_id = Some(entity.clone());
    }
    if let Some(index) = args.column {
        config.column = ColumnSelector::Index(index);
    }
    if let Some(endpoint) = &args.endpoint {
        config.column = ColumnSelector::Endpoint(endpoint.clone());
    }
    if let Some(coarse) = args.coarse {
        config.coarse_frequency = coarse;
    }
    if let Some(fine) = args.fine {
        config.fine_frequency = fine;
    }
    if let Some(method) = args.method {
        config.method = method.into_method(args.order)?;
    } else if args.order.is_some() {
        bail!("--order needs --method polynomial or --method spline");
    }
    if let Some(reducer) = args.reducer {
        config.aggregation = reducer.into();
    }
    if let Some(boundary) = args.boundary {
        config.boundary = boundary.into_policy(args.boundary_value)?;
    }

    config.validate()?;
    Ok(config)
}

/// Print missing counts for the file and, with --entity, per endpoint.
///
/// Uses `println!` on purpose: the tables are the output of this mode.
fn run_summary(args: &Args, config: &GapFillConfig) -> Result<()> {
    let columns = &config.columns;
    let df = load_readings(&args.input, columns)?;

    println!();
    println!("{}", "=".repeat(80));
    println!("MISSING VALUE SUMMARY");
    println!("{}", "=".repeat(80));
    println!("  File: {}", args.input);
    println!("  Rows: {}", df.height());
    println!();
    println!("{}", missing_table(&column_missing(&df))?);

    let entities = entity_ids(&df, columns)?;
    println!();
    println!("Entities ({}): {}", entities.len(), preview_list(&entities, 10));

    if let Some(entity) = &config.entity_id {
        let entity_df = filter_entity(&df, columns, entity)?;
        let pivot = pivot_endpoints(&entity_df, columns)?;

        println!();
        println!(
            "ENTITY {} ({} timestamps x {} endpoints)",
            entity,
            pivot.height(),
            pivot.width()
        );
        println!("{}", "-".repeat(40));
        println!("{}", missing_table(&pivot.missing_by_endpoint()?)?);
    }
    println!("{}", "=".repeat(80));
    Ok(())
}

fn preview_list(items: &[String], max: usize) -> String {
    if items.len() <= max {
        items.join(", ")
    } else {
        format!("{}, ... ({} more)", items[..max].join(", "), items.len() - max)
    }
}

/// Handle pipeline output based on CLI flags.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print JSON to stdout only (no logs)
/// - `--emit-report`: Write JSON report to file
/// - `--export`: Write the side-by-side series as CSV
fn handle_pipeline_output(result: &GapFillResult, args: &Args) -> Result<()> {
    let output_dir = PathBuf::from(&args.output);
    let mut report = GapFillReport::new(result, &args.input, None);

    if args.export {
        std::fs::create_dir_all(&output_dir)?;
        let export_path = output_dir.join(format!("{}_filled.csv", report.base_name()));
        result.write_csv(&export_path)?;
        report.export_file = Some(export_path.display().to_string());
    }

    if args.emit_report {
        let report_path = write_report_to_file(&report, &output_dir)?;
        info!("Report written to: {}", report_path.display());
    }

    if args.json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    print_human_readable_summary(result, &report, args)
}

fn print_human_readable_summary(
    result: &GapFillResult,
    report: &GapFillReport,
    args: &Args,
) -> Result<()> {
    println!();
    println!("{}", "=".repeat(80));
    println!("GAP FILLING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Input:    {}", report.input_file);
    println!(
        "Entity:   {} (endpoint {} of {})",
        report.entity_id,
        report.endpoint,
        report.endpoints.len()
    );
    println!(
        "Grid:     {} -> {} -> {} ({})",
        report.fine_frequency,
        report.coarse_frequency,
        report.fine_frequency,
        report.aggregation.name()
    );
    println!("Method:   {}", describe_method(report.method));
    println!("Boundary: {:?}", report.boundary);
    println!();

    println!("Missing values by column:");
    println!("{}", missing_table(&result.column_missing)?);
    println!();

    println!("Series:");
    for (label, summary) in [
        ("observed", &report.observed),
        ("gapped", &report.gapped),
        ("filled", &report.filled),
    ] {
        println!(
            "  {:<9} {:>6} points, {:>6} missing ({:>5.1}%), longest gap {}",
            label,
            summary.total,
            summary.missing,
            summary.missing_percentage,
            summary.longest_run
        );
    }
    println!();

    match &report.accuracy {
        Some(accuracy) => {
            println!("Fill accuracy over {} removed points:", accuracy.compared);
            println!("  MAE:  {:.4}", accuracy.mae);
            println!("  RMSE: {:.4}", accuracy.rmse);
            println!("  Max:  {:.4}", accuracy.max_abs_error);
        }
        None => println!("Fill accuracy: not scored"),
    }
    println!();

    if args.preview_rows > 0 {
        println!("Preview:");
        println!("{}", result.to_dataframe()?.head(Some(args.preview_rows)));
        println!();
    }

    if let Some(export) = &report.export_file {
        println!("Exported: {}", export);
    }
    println!("Duration: {}ms", report.duration_ms);
    println!();
    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save detailed JSON report");
    println!("{}", "=".repeat(80));
    Ok(())
}

fn describe_method(method: InterpolationMethod) -> String {
    match method.order() {
        Some(order) => format!("{} (order {})", method.name(), order),
        None => method.name().to_string(),
    }
}
