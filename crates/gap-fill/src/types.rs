//! Core data types shared across the gap-filling modules.
//!
//! The central type is [`TimeSeries`]: a named, strictly increasing mapping
//! from timestamps to optional values. `None` is the missing sentinel; a
//! series never stores `NaN` or infinities.

use crate::error::{GapFillError, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Frequency
// =============================================================================

// "15min", "1h", "H", "2 D" - count is optional and defaults to one
static FREQUENCY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)?\s*([A-Za-z]+)\s*$").expect("Invalid regex: frequency")
});

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 604_800;

/// A regular grid step, in whole seconds.
///
/// Buckets are aligned to multiples of the step counted from the Unix epoch,
/// so a daily frequency buckets at midnight and an hourly one at the top of
/// the hour. Weekly buckets therefore start on Thursdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    seconds: i64,
}

impl Frequency {
    pub const HOURLY: Frequency = Frequency {
        seconds: SECONDS_PER_HOUR,
    };
    pub const DAILY: Frequency = Frequency {
        seconds: SECONDS_PER_DAY,
    };

    /// Create a frequency from a positive number of seconds.
    pub fn from_seconds(seconds: i64) -> Result<Self> {
        if seconds <= 0 {
            return Err(GapFillError::InvalidFrequency(format!(
                "step must be positive, got {} seconds",
                seconds
            )));
        }
        if TimeDelta::try_seconds(seconds).is_none() {
            return Err(GapFillError::InvalidFrequency(format!(
                "step of {} seconds is too large",
                seconds
            )));
        }
        Ok(Self { seconds })
    }

    pub fn minutes(n: i64) -> Result<Self> {
        Self::from_seconds(n.saturating_mul(SECONDS_PER_MINUTE))
    }

    pub fn hours(n: i64) -> Result<Self> {
        Self::from_seconds(n.saturating_mul(SECONDS_PER_HOUR))
    }

    pub fn days(n: i64) -> Result<Self> {
        Self::from_seconds(n.saturating_mul(SECONDS_PER_DAY))
    }

    /// Step length in seconds.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Whether `other` divides this step exactly.
    pub fn is_multiple_of(&self, other: Frequency) -> bool {
        self.seconds % other.seconds == 0
    }

    /// Start of the bucket containing `ts`. Sub-second precision is dropped.
    pub fn floor(&self, ts: NaiveDateTime) -> Result<NaiveDateTime> {
        let secs = ts.and_utc().timestamp();
        let floored = secs.div_euclid(self.seconds) * self.seconds;
        DateTime::from_timestamp(floored, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| {
                GapFillError::InvalidSeries(format!("timestamp {} out of range", ts))
            })
    }

    /// `ts` advanced by `n` steps.
    pub fn advance(&self, ts: NaiveDateTime, n: i64) -> Result<NaiveDateTime> {
        let delta = TimeDelta::try_seconds(self.seconds.saturating_mul(n)).ok_or_else(|| {
            GapFillError::InvalidFrequency(format!("{} steps of {} overflow", n, self))
        })?;
        ts.checked_add_signed(delta).ok_or_else(|| {
            GapFillError::InvalidSeries(format!("timestamp {} + {} steps out of range", ts, n))
        })
    }

    /// Whether `ts` sits exactly on a bucket boundary.
    pub fn is_aligned(&self, ts: NaiveDateTime) -> bool {
        ts.and_utc().timestamp_subsec_nanos() == 0
            && ts.and_utc().timestamp().rem_euclid(self.seconds) == 0
    }
}

impl FromStr for Frequency {
    type Err = GapFillError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = FREQUENCY_PATTERN
            .captures(s)
            .ok_or_else(|| GapFillError::InvalidFrequency(format!("cannot parse '{}'", s)))?;

        let count: i64 = match caps.get(1) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| GapFillError::InvalidFrequency(format!("bad count in '{}'", s)))?,
            None => 1,
        };

        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let unit_seconds = match unit {
            // pandas offset aliases
            "S" => 1,
            "T" => SECONDS_PER_MINUTE,
            _ => match unit.to_ascii_lowercase().as_str() {
                "s" | "sec" | "secs" | "second" | "seconds" => 1,
                "min" | "mins" | "minute" | "minutes" => SECONDS_PER_MINUTE,
                "h" | "hr" | "hour" | "hours" => SECONDS_PER_HOUR,
                "d" | "day" | "days" => SECONDS_PER_DAY,
                "w" | "week" | "weeks" => SECONDS_PER_WEEK,
                _ => {
                    return Err(GapFillError::InvalidFrequency(format!(
                        "unknown unit '{}' in '{}'",
                        unit, s
                    )));
                }
            },
        };

        Self::from_seconds(count.saturating_mul(unit_seconds))
    }
}

impl TryFrom<String> for Frequency {
    type Error = GapFillError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.to_string()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % SECONDS_PER_WEEK == 0 {
            write!(f, "{}W", s / SECONDS_PER_WEEK)
        } else if s % SECONDS_PER_DAY == 0 {
            write!(f, "{}D", s / SECONDS_PER_DAY)
        } else if s % SECONDS_PER_HOUR == 0 {
            write!(f, "{}h", s / SECONDS_PER_HOUR)
        } else if s % SECONDS_PER_MINUTE == 0 {
            write!(f, "{}min", s / SECONDS_PER_MINUTE)
        } else {
            write!(f, "{}s", s)
        }
    }
}

// =============================================================================
// Time Series
// =============================================================================

/// Ordered mapping from timestamp to value for one (entity, endpoint) pair.
///
/// Timestamps are strictly increasing. Missing observations are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    name: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<Option<f64>>,
}

static_assertions::assert_impl_all!(TimeSeries: Send, Sync);

impl TimeSeries {
    /// Build a series, validating ordering and lengths.
    ///
    /// Non-finite values are stored as missing.
    pub fn new(
        name: impl Into<String>,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        if timestamps.len() != values.len() {
            return Err(GapFillError::InvalidSeries(format!(
                "'{}' has {} timestamps but {} values",
                name,
                timestamps.len(),
                values.len()
            )));
        }

        if let Some(pos) = timestamps.windows(2).position(|w| w[0] >= w[1]) {
            return Err(GapFillError::InvalidSeries(format!(
                "'{}' timestamps not strictly increasing at {} -> {}",
                name,
                timestamps[pos],
                timestamps[pos + 1]
            )));
        }

        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        Ok(Self {
            name,
            timestamps,
            values,
        })
    }

    /// An empty series.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, Option<f64>)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter().copied())
    }

    /// Known `(timestamp, value)` pairs only.
    pub fn known(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.iter().filter_map(|(ts, v)| v.map(|v| (ts, v)))
    }

    pub fn known_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn missing_count(&self) -> usize {
        self.len() - self.known_count()
    }

    /// Value at an exact timestamp: `None` if the timestamp is not on the
    /// series, `Some(None)` if it is but the value is missing.
    pub fn value_at(&self, ts: NaiveDateTime) -> Option<Option<f64>> {
        self.timestamps
            .binary_search(&ts)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Same name and timestamps, new values.
    pub(crate) fn with_values(&self, values: Vec<Option<f64>>) -> Result<Self> {
        Self::new(self.name.clone(), self.timestamps.clone(), values)
    }

    /// Sub-series over `range` of positions.
    pub(crate) fn slice(&self, range: std::ops::Range<usize>) -> Self {
        Self {
            name: self.name.clone(),
            timestamps: self.timestamps[range.clone()].to_vec(),
            values: self.values[range].to_vec(),
        }
    }

    /// Maximal runs of missing values, classified by position.
    pub fn gap_runs(&self) -> Vec<GapRun> {
        let mut runs = Vec::new();
        let n = self.len();
        let mut i = 0;

        while i < n {
            if self.values[i].is_some() {
                i += 1;
                continue;
            }
            let start = i;
            while i < n && self.values[i].is_none() {
                i += 1;
            }
            let kind = match (start == 0, i == n) {
                (true, true) => GapKind::Whole,
                (true, false) => GapKind::Leading,
                (false, true) => GapKind::Trailing,
                (false, false) => GapKind::Interior,
            };
            runs.push(GapRun {
                start_index: start,
                len: i - start,
                start: self.timestamps[start],
                end: self.timestamps[i - 1],
                kind,
            });
        }

        runs
    }

    /// Convert to a two-column DataFrame (`timestamp_col`, series name).
    ///
    /// Timestamps are stored as a millisecond `Datetime` column.
    pub fn to_dataframe(&self, timestamp_col: &str) -> Result<DataFrame> {
        let ts = timestamp_column(timestamp_col, &self.timestamps)?;
        let values = Column::new(self.name.as_str().into(), self.values.clone());
        Ok(DataFrame::new(vec![ts, values])?)
    }
}

/// Millisecond `Datetime` column from chrono timestamps.
pub(crate) fn timestamp_column(name: &str, timestamps: &[NaiveDateTime]) -> Result<Column> {
    let millis: Vec<i64> = timestamps
        .iter()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();
    let column = Column::new(name.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(column)
}

/// Where a missing run sits relative to the known values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Before the first known value
    Leading,
    /// Bracketed by known values on both sides
    Interior,
    /// After the last known value
    Trailing,
    /// The series has no known value at all
    Whole,
}

impl GapKind {
    /// Boundary gaps cannot be filled by interpolation.
    pub fn is_boundary(&self) -> bool {
        !matches!(self, Self::Interior)
    }
}

/// A maximal run of consecutive missing values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRun {
    /// Position of the first missing value
    pub start_index: usize,
    /// Number of missing values in the run
    pub len: usize,
    /// Timestamp of the first missing value
    pub start: NaiveDateTime,
    /// Timestamp of the last missing value
    pub end: NaiveDateTime,
    pub kind: GapKind,
}

impl GapRun {
    /// One past the last missing position.
    pub fn end_index(&self) -> usize {
        self.start_index + self.len
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::{hour, hourly};
    use super::*;

    #[test]
    fn test_frequency_parse_aliases() {
        assert_eq!("1h".parse::<Frequency>().unwrap().seconds(), 3_600);
        assert_eq!("H".parse::<Frequency>().unwrap().seconds(), 3_600);
        assert_eq!("15min".parse::<Frequency>().unwrap().seconds(), 900);
        assert_eq!("15T".parse::<Frequency>().unwrap().seconds(), 900);
        assert_eq!("D".parse::<Frequency>().unwrap().seconds(), 86_400);
        assert_eq!("2 days".parse::<Frequency>().unwrap().seconds(), 172_800);
        assert_eq!("30s".parse::<Frequency>().unwrap().seconds(), 30);
    }

    #[test]
    fn test_frequency_parse_rejects_garbage() {
        assert!("".parse::<Frequency>().is_err());
        assert!("0h".parse::<Frequency>().is_err());
        assert!("3M".parse::<Frequency>().is_err());
        assert!("h1".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_frequency_display() {
        assert_eq!(Frequency::hours(1).unwrap().to_string(), "1h");
        assert_eq!(Frequency::days(1).unwrap().to_string(), "1D");
        assert_eq!(Frequency::minutes(90).unwrap().to_string(), "90min");
        assert_eq!(Frequency::from_seconds(45).unwrap().to_string(), "45s");
    }

    #[test]
    fn test_frequency_serde_as_string() {
        let freq = Frequency::minutes(15).unwrap();
        let json = serde_json::to_string(&freq).unwrap();
        assert_eq!(json, "\"15min\"");
        let back: Frequency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, freq);
    }

    #[test]
    fn test_frequency_floor_daily() {
        let day = Frequency::days(1).unwrap();
        assert_eq!(day.floor(hour(30)).unwrap(), hour(24));
        assert!(day.is_aligned(hour(48)));
        assert!(!day.is_aligned(hour(47)));
    }

    #[test]
    fn test_series_rejects_unordered_timestamps() {
        let result = TimeSeries::new("v", vec![hour(1), hour(0)], vec![Some(1.0), Some(2.0)]);
        assert!(matches!(result, Err(GapFillError::InvalidSeries(_))));

        let result = TimeSeries::new("v", vec![hour(0), hour(0)], vec![Some(1.0), Some(2.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_series_rejects_length_mismatch() {
        let result = TimeSeries::new("v", vec![hour(0)], vec![]);
        assert!(matches!(result, Err(GapFillError::InvalidSeries(_))));
    }

    #[test]
    fn test_series_normalizes_nan_to_missing() {
        let series = hourly("v", &[Some(1.0), Some(f64::NAN), Some(f64::INFINITY)]);
        assert_eq!(series.values(), &[Some(1.0), None, None]);
        assert_eq!(series.missing_count(), 2);
    }

    #[test]
    fn test_gap_runs_classification() {
        let series = hourly(
            "v",
            &[None, Some(1.0), None, None, Some(2.0), None],
        );
        let runs = series.gap_runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].kind, GapKind::Leading);
        assert_eq!(runs[1].kind, GapKind::Interior);
        assert_eq!(runs[1].start_index, 2);
        assert_eq!(runs[1].len, 2);
        assert_eq!(runs[1].end, hour(3));
        assert_eq!(runs[2].kind, GapKind::Trailing);
    }

    #[test]
    fn test_gap_runs_whole() {
        let series = hourly("v", &[None, None]);
        let runs = series.gap_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].kind, GapKind::Whole);
        assert!(runs[0].kind.is_boundary());
    }

    #[test]
    fn test_value_at() {
        let series = hourly("v", &[Some(1.0), None]);
        assert_eq!(series.value_at(hour(0)), Some(Some(1.0)));
        assert_eq!(series.value_at(hour(1)), Some(None));
        assert_eq!(series.value_at(hour(5)), None);
    }

    #[test]
    fn test_to_dataframe() {
        let series = hourly("voltage", &[Some(1.0), None, Some(3.0)]);
        let df = series.to_dataframe("sample_date").unwrap();
        assert_eq!(df.shape(), (3, 2));
        assert_eq!(df.column("voltage").unwrap().null_count(), 1);
        assert!(matches!(
            df.column("sample_date").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, _)
        ));
    }
}
