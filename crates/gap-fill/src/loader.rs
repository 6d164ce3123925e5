//! Loading, filtering and reshaping of meter readings.
//!
//! Readings arrive as a long table (`entity, endpoint, timestamp, value`).
//! This module reads that table with polars, normalises the column types,
//! keeps one entity and pivots the endpoints into columns.

use crate::config::{ColumnNames, ColumnSelector};
use crate::error::{GapFillError, Result, ResultExt};
use crate::types::{TimeSeries, timestamp_column};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Date-time layouts tried in order, after RFC 3339.
const DATETIME_FORMATS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts, read as midnight.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Offset-carrying layouts, normalised to UTC.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"];

/// Parse a timestamp cell. Values with an offset are converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Read a CSV file into a DataFrame.
///
/// The file is opened, read and closed inside this call.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(GapFillError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file not found: {}", path.display()),
        )));
    }

    // Strategy 1: standard loading with quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Strategy 2: read everything as text and let the typed steps cast
    CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .context(format!("Reading {}", path.display()))
}

/// Load a readings file and normalise its columns.
pub fn load_readings(path: impl AsRef<Path>, columns: &ColumnNames) -> Result<DataFrame> {
    let path = path.as_ref();
    info!("Loading readings from: {}", path.display());
    let df = load_csv(path)?;
    info!("Loaded {} rows x {} columns", df.height(), df.width());
    prepare_readings(df, columns)
}

/// Check required columns and normalise their types.
///
/// The timestamp column becomes a millisecond `Datetime`, entity and endpoint
/// become text and the value becomes `Float64` (unparseable cells turn null).
/// Fails fast on the first missing or unparseable timestamp.
pub fn prepare_readings(mut df: DataFrame, columns: &ColumnNames) -> Result<DataFrame> {
    for name in columns.all() {
        if df.column(name).is_err() {
            return Err(GapFillError::ColumnNotFound(name.to_string()));
        }
    }

    let timestamps = parse_timestamp_column(&df, &columns.timestamp)?;
    let ts_column = timestamp_column(&columns.timestamp, &timestamps)?;
    df.replace(&columns.timestamp, ts_column.take_materialized_series())?;

    for name in [&columns.entity, &columns.endpoint] {
        let text = df.column(name)?.cast(&DataType::String)?;
        df.replace(name, text.take_materialized_series())?;
    }

    let original_nulls = df.column(&columns.value)?.null_count();
    let values = df.column(&columns.value)?.cast(&DataType::Float64)?;
    let coerced = values.null_count().saturating_sub(original_nulls);
    if coerced > 0 {
        warn!(
            "{} non-numeric cells in '{}' treated as missing",
            coerced, columns.value
        );
    }
    df.replace(&columns.value, values.take_materialized_series())?;

    Ok(df)
}

fn parse_timestamp_column(df: &DataFrame, name: &str) -> Result<Vec<NaiveDateTime>> {
    let column = df
        .column(name)
        .map_err(|_| GapFillError::ColumnNotFound(name.to_string()))?;

    match column.dtype() {
        DataType::Datetime(_, _) | DataType::Date => {
            let parsed = datetime_values(df, name)?;
            parsed
                .into_iter()
                .enumerate()
                .map(|(row, ts)| {
                    ts.ok_or_else(|| GapFillError::TimestampParse {
                        column: name.to_string(),
                        row,
                        value: "<null>".to_string(),
                    })
                })
                .collect()
        }
        _ => {
            let text = column.cast(&DataType::String)?;
            let text = text.as_materialized_series().str()?;
            text.into_iter()
                .enumerate()
                .map(|(row, cell)| {
                    let cell = cell.unwrap_or_default();
                    parse_timestamp(cell).ok_or_else(|| GapFillError::TimestampParse {
                        column: name.to_string(),
                        row,
                        value: if cell.is_empty() {
                            "<null>".to_string()
                        } else {
                            cell.to_string()
                        },
                    })
                })
                .collect()
        }
    }
}

/// Read a temporal column as chrono timestamps.
pub(crate) fn datetime_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let column = df
        .column(name)
        .map_err(|_| GapFillError::ColumnNotFound(name.to_string()))?;

    let column = match column.dtype() {
        DataType::Date => column.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        DataType::Datetime(_, _) => column.clone(),
        other => {
            return Err(GapFillError::InvalidSeries(format!(
                "column '{}' has type {:?}, expected a datetime",
                name, other
            )));
        }
    };

    let unit = match column.dtype() {
        DataType::Datetime(unit, _) => *unit,
        _ => TimeUnit::Milliseconds,
    };

    let raw = column.cast(&DataType::Int64)?;
    let values = raw
        .as_materialized_series()
        .i64()?
        .into_iter()
        .map(|v| {
            v.and_then(|raw| match unit {
                TimeUnit::Milliseconds => DateTime::from_timestamp_millis(raw),
                TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw),
                TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw)),
            })
            .map(|dt| dt.naive_utc())
        })
        .collect();
    Ok(values)
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| GapFillError::ColumnNotFound(name.to_string()))?
        .cast(&DataType::String)?;
    let values = column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect();
    Ok(values)
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| GapFillError::ColumnNotFound(name.to_string()))?
        .cast(&DataType::Float64)?;
    Ok(column.as_materialized_series().f64()?.into_iter().collect())
}

/// Distinct entity identifiers, sorted.
pub fn entity_ids(df: &DataFrame, columns: &ColumnNames) -> Result<Vec<String>> {
    let ids: BTreeSet<String> = string_values(df, &columns.entity)?
        .into_iter()
        .flatten()
        .collect();
    Ok(sort_labels(ids.into_iter().collect()))
}

/// Keep the rows of one entity.
///
/// An empty result is reported as [`GapFillError::NoData`] so callers never
/// go on to reshape or print an empty table.
pub fn filter_entity(df: &DataFrame, columns: &ColumnNames, entity_id: &str) -> Result<DataFrame> {
    let wanted = entity_id.trim();
    let mask: Vec<bool> = string_values(df, &columns.entity)?
        .iter()
        .map(|v| v.as_deref() == Some(wanted))
        .collect();
    let mask = BooleanChunked::from_slice("mask".into(), &mask);
    let filtered = df.filter(&mask)?;

    if filtered.height() == 0 {
        return Err(GapFillError::NoData(format!(
            "no rows with {} = '{}'",
            columns.entity, wanted
        )));
    }

    debug!(
        "Entity '{}' kept {} of {} rows",
        wanted,
        filtered.height(),
        df.height()
    );
    Ok(filtered)
}

/// Numeric-aware ordering: all-integer labels sort by value, others as text.
fn sort_labels(mut labels: Vec<String>) -> Vec<String> {
    if labels.iter().all(|l| l.parse::<i64>().is_ok()) {
        labels.sort_by_key(|l| l.parse::<i64>().unwrap_or_default());
    } else {
        labels.sort();
    }
    labels
}

/// Readings reshaped to one row per timestamp and one column per endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    timestamp_name: String,
    timestamps: Vec<NaiveDateTime>,
    endpoints: Vec<String>,
    /// One vector per endpoint, aligned with `timestamps`.
    columns: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Number of endpoint columns.
    pub fn width(&self) -> usize {
        self.endpoints.len()
    }

    /// Number of timestamp rows.
    pub fn height(&self) -> usize {
        self.timestamps.len()
    }

    /// Endpoint column at `index` as a series.
    pub fn select_column(&self, index: usize) -> Result<TimeSeries> {
        let values = self
            .columns
            .get(index)
            .ok_or(GapFillError::ColumnIndexOutOfRange {
                index,
                len: self.width(),
            })?;
        TimeSeries::new(
            self.endpoints[index].clone(),
            self.timestamps.clone(),
            values.clone(),
        )
    }

    /// Endpoint column by identifier.
    pub fn select_endpoint(&self, endpoint: &str) -> Result<TimeSeries> {
        let index = self
            .endpoints
            .iter()
            .position(|e| e == endpoint.trim())
            .ok_or_else(|| GapFillError::ColumnNotFound(endpoint.to_string()))?;
        self.select_column(index)
    }

    pub fn select(&self, selector: &ColumnSelector) -> Result<TimeSeries> {
        match selector {
            ColumnSelector::Index(index) => self.select_column(*index),
            ColumnSelector::Endpoint(endpoint) => self.select_endpoint(endpoint),
        }
    }

    /// Every endpoint column as a series.
    pub fn series(&self) -> Result<Vec<TimeSeries>> {
        (0..self.width()).map(|i| self.select_column(i)).collect()
    }

    /// Wide DataFrame: the timestamp column followed by one column per endpoint.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.width() + 1);
        columns.push(timestamp_column(&self.timestamp_name, &self.timestamps)?);
        for (endpoint, values) in self.endpoints.iter().zip(&self.columns) {
            columns.push(Column::new(endpoint.as_str().into(), values.clone()));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Pivot endpoints into columns, averaging duplicate readings.
pub fn pivot_endpoints(df: &DataFrame, columns: &ColumnNames) -> Result<PivotTable> {
    if df.height() == 0 {
        return Err(GapFillError::NoData("nothing to reshape".to_string()));
    }

    let timestamps = datetime_values(df, &columns.timestamp)?;
    let endpoints = string_values(df, &columns.endpoint)?;
    let values = float_values(df, &columns.value)?;

    // timestamp -> endpoint -> (sum, count of known values)
    let mut cells: BTreeMap<NaiveDateTime, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
    let mut labels: BTreeSet<String> = BTreeSet::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for ((ts, endpoint), value) in timestamps.into_iter().zip(endpoints).zip(values) {
        let (Some(ts), Some(endpoint)) = (ts, endpoint) else {
            skipped += 1;
            continue;
        };
        labels.insert(endpoint.clone());
        let cell = cells.entry(ts).or_default().entry(endpoint).or_insert((0.0, 0));
        if let Some(v) = value.filter(|v| v.is_finite()) {
            if cell.1 > 0 {
                duplicates += 1;
            }
            cell.0 += v;
            cell.1 += 1;
        }
    }

    if skipped > 0 {
        warn!("Skipped {} rows without timestamp or endpoint", skipped);
    }
    if duplicates > 0 {
        debug!("Averaged {} duplicate readings", duplicates);
    }
    if cells.is_empty() {
        return Err(GapFillError::NoData("no usable rows to reshape".to_string()));
    }

    let endpoints = sort_labels(labels.into_iter().collect());
    let mut table_columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(cells.len()); endpoints.len()];

    for row in cells.values() {
        for (col, endpoint) in endpoints.iter().enumerate() {
            let value = row
                .get(endpoint)
                .filter(|(_, count)| *count > 0)
                .map(|(sum, count)| sum / *count as f64);
            table_columns[col].push(value);
        }
    }

    info!(
        "Reshaped into {} timestamps x {} endpoints",
        cells.len(),
        endpoints.len()
    );

    Ok(PivotTable {
        timestamp_name: columns.timestamp.clone(),
        timestamps: cells.into_keys().collect(),
        endpoints,
        columns: table_columns,
    })
}
