//! Integration tests for the gap-filling workflow.
//!
//! These tests run the loader, pipeline and report against CSV fixtures.

use gap_fill::{
    Aggregation, BoundaryPolicy, DifferenceModel, Frequency, GapFillConfig, GapFillError,
    GapFillPipeline, GapFillReport, InterpolationMethod, MissingSummary, RandomWalkGenerator,
    entity_ids, filter_entity, interpolate, introduce_gaps, load_readings, pivot_endpoints,
    write_report_to_file,
};
use gap_fill::config::ColumnNames;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

/// Mean of the two endpoint 2 readings at 2024-01-01 10:00 in the fixture.
const DUPLICATE_MEAN: f64 = 241.25;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn meter_voltage() -> PathBuf {
    fixtures_path().join("meter_voltage.csv")
}

fn sub_hourly() -> PathBuf {
    fixtures_path().join("sub_hourly.csv")
}

/// Mean of every raw voltage reading of `entity` stamped on `day` (March 2024).
fn raw_daily_mean(entity: &str, day: u32) -> f64 {
    let columns = ColumnNames::default();
    let df = load_readings(sub_hourly(), &columns).unwrap();
    let rows = filter_entity(&df, &columns, entity).unwrap();
    let dates = rows
        .column("sample_date")
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap();
    let voltage = rows.column("voltage").unwrap().clone();
    let start = chrono::NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis();
    let end = start + 86_400_000;
    let in_day: Vec<f64> = dates
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .zip(voltage.as_materialized_series().f64().unwrap())
        .filter_map(|(ts, v)| match (ts, v) {
            (Some(ts), Some(v)) if ts >= start && ts < end => Some(v),
            _ => None,
        })
        .collect();
    in_day.iter().sum::<f64>() / in_day.len() as f64
}

fn run(config: GapFillConfig) -> gap_fill::error::Result<gap_fill::GapFillResult> {
    GapFillPipeline::builder()
        .config(config)
        .build()?
        .run_file(meter_voltage())
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gap_fill_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    dir
}

// ============================================================================
// Loading and Reshaping
// ============================================================================

#[test]
fn test_load_readings_normalises_types() {
    let df = load_readings(meter_voltage(), &ColumnNames::default()).unwrap();

    assert_eq!(df.height(), 253);
    assert!(matches!(
        df.column("sample_date").unwrap().dtype(),
        DataType::Datetime(TimeUnit::Milliseconds, None)
    ));
    assert_eq!(df.column("entity_id").unwrap().dtype(), &DataType::String);
    assert_eq!(df.column("voltage").unwrap().dtype(), &DataType::Float64);

    // three empty cells plus one "ERR"
    assert_eq!(df.column("voltage").unwrap().null_count(), 4);
}

#[test]
fn test_entity_ids() {
    let df = load_readings(meter_voltage(), &ColumnNames::default()).unwrap();
    assert_eq!(entity_ids(&df, &ColumnNames::default()).unwrap(), vec!["1001", "1002"]);
}

#[test]
fn test_unknown_entity_is_no_data() {
    let columns = ColumnNames::default();
    let df = load_readings(meter_voltage(), &columns).unwrap();
    let err = filter_entity(&df, &columns, "4242").unwrap_err();
    assert!(err.is_no_data());
    assert_eq!(err.error_code(), "NO_DATA");
}

#[test]
fn test_pivot_endpoints() {
    let columns = ColumnNames::default();
    let df = load_readings(meter_voltage(), &columns).unwrap();
    let entity = filter_entity(&df, &columns, "1001").unwrap();
    let pivot = pivot_endpoints(&entity, &columns).unwrap();

    assert_eq!(pivot.endpoints(), &["1", "2", "3"]);
    assert_eq!(pivot.height(), 72);

    let missing = pivot.missing_by_endpoint().unwrap();
    let counts: Vec<usize> = missing.iter().map(|m| m.missing).collect();
    assert_eq!(counts, vec![0, 0, 4]);

    // the duplicated reading at 10:00 is averaged
    let endpoint_2 = pivot.select_endpoint("2").unwrap();
    assert!((endpoint_2.values()[10].unwrap() - DUPLICATE_MEAN).abs() < 1e-9);

    let wide = pivot.to_dataframe().unwrap();
    assert_eq!(wide.shape(), (72, 4));
}

#[test]
fn test_column_index_out_of_range() {
    let config = GapFillConfig::builder()
        .entity_id("1001")
        .column_index(5)
        .build()
        .unwrap();
    let err = run(config).unwrap_err();
    match err {
        GapFillError::ColumnIndexOutOfRange { index, len } => {
            assert_eq!(index, 5);
            assert_eq!(len, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_bad_timestamp_fails_fast() {
    let err = load_readings(fixtures_path().join("bad_timestamps.csv"), &ColumnNames::default())
        .unwrap_err();
    match err {
        GapFillError::TimestampParse { column, row, value } => {
            assert_eq!(column, "sample_date");
            assert_eq!(row, 2);
            assert_eq!(value, "not-a-date");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[test]
fn test_pipeline_daily_to_hourly_linear() {
    let config = GapFillConfig::builder().entity_id("1001").build().unwrap();
    let result = run(config).unwrap();

    assert_eq!(result.endpoint, "1");
    assert_eq!(result.observed.len(), 72);
    assert_eq!(result.observed_summary.missing, 0);
    assert_eq!(result.coarse.len(), 3);
    assert_eq!(result.gapped.len(), 49);
    assert_eq!(result.gapped.known_count(), 3);
    assert_eq!(result.filled_summary.missing, 0);

    // known points survive unchanged
    for (ts, value) in result.gapped.known() {
        assert_eq!(result.filled.value_at(ts), Some(Some(value)));
    }

    let accuracy = result.accuracy.expect("accuracy should be scored");
    assert_eq!(accuracy.compared, 46);
    assert!(accuracy.rmse >= accuracy.mae);
    assert!(accuracy.max_abs_error >= accuracy.rmse);
}

#[test]
fn test_every_method_fills_interior() {
    for method in [
        InterpolationMethod::Linear,
        InterpolationMethod::Time,
        InterpolationMethod::Polynomial { order: 2 },
        InterpolationMethod::Spline { order: 2 },
        InterpolationMethod::FromDerivatives,
    ] {
        let config = GapFillConfig::builder()
            .entity_id("1001")
            .endpoint("2")
            .method(method)
            .build()
            .unwrap();
        let result = run(config).unwrap();
        assert_eq!(result.filled_summary.missing, 0, "{}", method.name());
    }
}

#[test]
fn test_order_needs_enough_points() {
    let config = GapFillConfig::builder()
        .entity_id("1001")
        .method(InterpolationMethod::Polynomial { order: 3 })
        .build()
        .unwrap();
    let err = run(config).unwrap_err();
    match err {
        GapFillError::InsufficientPoints {
            required,
            available,
            ..
        } => {
            assert_eq!(required, 4);
            assert_eq!(available, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_six_hour_grid_with_cubic_spline() {
    let config = GapFillConfig::builder()
        .entity_id("1001")
        .coarse_frequency(Frequency::hours(6).unwrap())
        .method(InterpolationMethod::Spline { order: 3 })
        .aggregation(Aggregation::Median)
        .build()
        .unwrap();
    let result = run(config).unwrap();
    assert_eq!(result.gapped.known_count(), 12);
    assert_eq!(result.gapped.len(), 67);
    assert_eq!(result.filled_summary.missing, 0);
}

#[test]
fn test_sparse_entity_boundary_policy() {
    // entity 1002 reports every other hour
    let config = GapFillConfig::builder()
        .entity_id("1002")
        .boundary(BoundaryPolicy::Nearest)
        .build()
        .unwrap();
    let result = run(config).unwrap();
    assert_eq!(result.endpoints, vec!["7"]);
    assert_eq!(result.observed.len(), 71);
    assert_eq!(result.observed_summary.missing, 35);
    assert_eq!(result.filled_summary.missing, 0);
}

#[test]
fn test_half_past_readings_fill_their_buckets() {
    let config = GapFillConfig::builder().entity_id("3001").build().unwrap();
    let result = GapFillPipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .run_file(sub_hourly())
        .unwrap();

    assert_eq!(result.coarse.len(), 2);
    let expected = [raw_daily_mean("3001", 1), raw_daily_mean("3001", 2)];
    assert!((expected[0] - 235.75).abs() < 1e-9);
    for (value, expected) in result.coarse.values().iter().zip(expected) {
        assert!((value.unwrap() - expected).abs() < 1e-9);
    }
    assert_eq!(result.gapped.len(), 25);
    assert_eq!(result.filled_summary.missing, 0);
    assert!(result.accuracy.is_none());
}

#[test]
fn test_quarter_hour_readings_all_enter_the_mean() {
    let config = GapFillConfig::builder().entity_id("3002").build().unwrap();
    let result = GapFillPipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .run_file(sub_hourly())
        .unwrap();

    let expected = [raw_daily_mean("3002", 1), raw_daily_mean("3002", 2)];
    assert!((expected[0] - 234.75).abs() < 1e-9);
    assert!((expected[1] - 244.35).abs() < 1e-9);
    for (value, expected) in result.coarse.values().iter().zip(expected) {
        assert!((value.unwrap() - expected).abs() < 1e-9);
    }

    // on-the-hour readings still score the fill
    assert_eq!(result.observed.len(), 48);
    assert_eq!(result.observed_summary.missing, 0);
    assert_eq!(result.accuracy.unwrap().compared, 23);
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_export_and_report() {
    let config = GapFillConfig::builder()
        .entity_id("1001")
        .endpoint("3")
        .method(InterpolationMethod::Time)
        .build()
        .unwrap();
    let result = run(config).unwrap();
    let dir = scratch_dir("export");

    let export = dir.join("1001_3_filled.csv");
    result.write_csv(&export).unwrap();
    let exported = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(export.clone()))
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(exported.shape(), (72, 4));

    let report = GapFillReport::new(&result, "meter_voltage.csv", Some(export.as_path()));
    let path = write_report_to_file(&report, &dir).unwrap();
    assert_eq!(path, dir.join("1001_3_report.json"));

    let loaded: GapFillReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded.endpoint, "3");
    assert_eq!(loaded.observed.missing, 4);
    assert_eq!(loaded.method, InterpolationMethod::Time);

    std::fs::remove_dir_all(dir).unwrap();
}

// ============================================================================
// Series-level building blocks
// ============================================================================

#[test]
fn test_round_trip_on_fixture_series() {
    let columns = ColumnNames::default();
    let df = load_readings(meter_voltage(), &columns).unwrap();
    let entity = filter_entity(&df, &columns, "1001").unwrap();
    let series = pivot_endpoints(&entity, &columns)
        .unwrap()
        .select_column(0)
        .unwrap();

    let gapped =
        introduce_gaps(&series, Frequency::DAILY, Frequency::HOURLY, Aggregation::Mean).unwrap();
    let summary = MissingSummary::of(&gapped);
    assert_eq!(summary.interior_runs, 2);
    assert_eq!(summary.boundary_runs, 0);
    assert_eq!(summary.longest_run, 23);

    let filled = interpolate(&gapped, InterpolationMethod::Linear).unwrap();
    let first_day = series.values()[..24].iter().flatten().sum::<f64>() / 24.0;
    assert!((filled.values()[0].unwrap() - first_day).abs() < 1e-9);
}

#[test]
fn test_synthetic_walk_from_fixture() {
    let columns = ColumnNames::default();
    let df = load_readings(meter_voltage(), &columns).unwrap();
    let entity = filter_entity(&df, &columns, "1001").unwrap();
    let series = pivot_endpoints(&entity, &columns)
        .unwrap()
        .select_endpoint("3")
        .unwrap();

    let generator = RandomWalkGenerator::fit(&series, DifferenceModel::Laplace)
        .unwrap()
        .with_seed(11);
    let first = generator.continue_series(Frequency::HOURLY, 48).unwrap();
    let second = generator.continue_series(Frequency::HOURLY, 48).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 48);
    assert_eq!(first.name(), "3_synthetic");
    assert_eq!(first.origin(), series.known().last().unwrap().1);
    assert_eq!(
        first.timestamps()[0],
        series.last_timestamp().unwrap() + chrono::TimeDelta::hours(1)
    );
}
