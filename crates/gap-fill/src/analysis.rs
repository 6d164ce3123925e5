//! Missing-value analysis and fill scoring.

use crate::error::{GapFillError, Result};
use crate::loader::PivotTable;
use crate::types::{GapKind, GapRun, TimeSeries};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Null count of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub name: String,
    pub total: usize,
    pub missing: usize,
    pub missing_percentage: f64,
}

impl ColumnMissing {
    fn new(name: impl Into<String>, total: usize, missing: usize) -> Self {
        Self {
            name: name.into(),
            total,
            missing,
            missing_percentage: percentage(missing, total),
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Null count and percentage for every column of `df`.
pub fn column_missing(df: &DataFrame) -> Vec<ColumnMissing> {
    df.get_columns()
        .iter()
        .map(|col| ColumnMissing::new(col.name().as_str(), df.height(), col.null_count()))
        .collect()
}

/// Tabulate missing counts for printing.
pub fn missing_table(rows: &[ColumnMissing]) -> Result<DataFrame> {
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let missing: Vec<u64> = rows.iter().map(|r| r.missing as u64).collect();
    let pct: Vec<f64> = rows.iter().map(|r| r.missing_percentage).collect();
    Ok(DataFrame::new(vec![
        Column::new("column".into(), names),
        Column::new("missing".into(), missing),
        Column::new("missing_pct".into(), pct),
    ])?)
}

impl PivotTable {
    /// Missing counts per endpoint column.
    pub fn missing_by_endpoint(&self) -> Result<Vec<ColumnMissing>> {
        Ok(self
            .series()?
            .iter()
            .map(|s| ColumnMissing::new(s.name(), s.len(), s.missing_count()))
            .collect())
    }
}

/// Shape of the missing values in a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSummary {
    pub name: String,
    pub total: usize,
    pub missing: usize,
    pub missing_percentage: f64,
    pub longest_run: usize,
    pub interior_runs: usize,
    pub boundary_runs: usize,
    pub runs: Vec<GapRun>,
}

impl MissingSummary {
    pub fn of(series: &TimeSeries) -> Self {
        let runs = series.gap_runs();
        let interior_runs = runs
            .iter()
            .filter(|run| run.kind == GapKind::Interior)
            .count();

        Self {
            name: series.name().to_string(),
            total: series.len(),
            missing: series.missing_count(),
            missing_percentage: percentage(series.missing_count(), series.len()),
            longest_run: runs.iter().map(|run| run.len).max().unwrap_or(0),
            interior_runs,
            boundary_runs: runs.len() - interior_runs,
            runs,
        }
    }
}

/// Error of filled values against a reference, over the points the gapped
/// series was missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillAccuracy {
    /// Points scored: missing in the gapped series, known in both others
    pub compared: usize,
    pub mae: f64,
    pub rmse: f64,
    pub max_abs_error: f64,
}

impl FillAccuracy {
    /// Score `filled` against `reference`, matching points by timestamp.
    ///
    /// Returns `NoData` when there is nothing to compare.
    pub fn score(reference: &TimeSeries, gapped: &TimeSeries, filled: &TimeSeries) -> Result<Self> {
        let errors: Vec<f64> = filled
            .known()
            .filter(|(ts, _)| gapped.value_at(*ts) == Some(None))
            .filter_map(|(ts, fill)| reference.value_at(ts).flatten().map(|r| fill - r))
            .collect();

        if errors.is_empty() {
            return Err(GapFillError::NoData(format!(
                "no filled points of '{}' have a reference value",
                filled.name()
            )));
        }

        let n = errors.len() as f64;
        Ok(Self {
            compared: errors.len(),
            mae: errors.iter().map(|e| e.abs()).sum::<f64>() / n,
            rmse: (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt(),
            max_abs_error: errors.iter().map(|e| e.abs()).fold(0.0, f64::max),
        })
    }
}
