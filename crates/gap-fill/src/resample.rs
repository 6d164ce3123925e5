//! Resampling between regular time grids.
//!
//! [`downsample`] aggregates a series into coarse buckets and [`upsample`]
//! spreads a coarse series back over a fine grid, leaving every fine point
//! without a coarse counterpart missing. Together they introduce gaps into
//! an otherwise complete series so fill strategies can be compared.

use crate::config::Aggregation;
use crate::error::{GapFillError, Result};
use crate::types::{Frequency, TimeSeries};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Number of grid steps of `freq` from `start` to `end`, inclusive of `start`.
fn grid_len(start: NaiveDateTime, end: NaiveDateTime, freq: Frequency) -> usize {
    let span = (end - start).num_seconds();
    if span < 0 {
        return 0;
    }
    (span / freq.seconds()) as usize + 1
}

fn grid(start: NaiveDateTime, end: NaiveDateTime, freq: Frequency) -> Result<Vec<NaiveDateTime>> {
    (0..grid_len(start, end, freq))
        .map(|i| freq.advance(start, i as i64))
        .collect()
}

/// Aggregate a series into buckets of `coarse`, reducing known values with
/// `reducer`.
///
/// Every bucket between the first and last populated one is present; buckets
/// with no known value are missing.
pub fn downsample(series: &TimeSeries, coarse: Frequency, reducer: Aggregation) -> Result<TimeSeries> {
    let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) else {
        return Err(GapFillError::NoData(format!(
            "cannot downsample empty series '{}'",
            series.name()
        )));
    };

    let mut buckets: BTreeMap<NaiveDateTime, Vec<f64>> = BTreeMap::new();
    for (ts, value) in series.known() {
        buckets.entry(coarse.floor(ts)?).or_default().push(value);
    }

    let labels = grid(coarse.floor(first)?, coarse.floor(last)?, coarse)?;
    let values: Vec<Option<f64>> = labels
        .iter()
        .map(|label| buckets.get(label).and_then(|vals| reducer.reduce(vals)))
        .collect();

    let empty = values.iter().filter(|v| v.is_none()).count();
    debug!(
        "Downsampled '{}' from {} points to {} {} buckets ({} empty) with {}",
        series.name(),
        series.len(),
        labels.len(),
        coarse,
        empty,
        reducer.name()
    );

    TimeSeries::new(series.name(), labels, values)
}

/// Spread a series over a `fine` grid spanning its first to last timestamp.
///
/// A fine timestamp takes the series value when the two coincide and is
/// missing otherwise.
pub fn upsample(series: &TimeSeries, fine: Frequency) -> Result<TimeSeries> {
    let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) else {
        return Err(GapFillError::NoData(format!(
            "cannot upsample empty series '{}'",
            series.name()
        )));
    };

    let timestamps = grid(first, last, fine)?;
    let values: Vec<Option<f64>> = timestamps
        .iter()
        .map(|ts| series.value_at(*ts).flatten())
        .collect();

    let dropped = series.len() - timestamps.iter().filter(|ts| series.value_at(**ts).is_some()).count();
    if dropped > 0 {
        warn!(
            "{} points of '{}' do not fall on the {} grid and were dropped",
            dropped,
            series.name(),
            fine
        );
    }

    TimeSeries::new(series.name(), timestamps, values)
}

/// Place a series on a regular grid of `freq`, making absent grid points
/// explicitly missing.
///
/// The grid starts at the first timestamp floored to `freq`. Points that do
/// not sit on the grid are dropped.
pub fn as_frequency(series: &TimeSeries, freq: Frequency) -> Result<TimeSeries> {
    let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) else {
        return Err(GapFillError::NoData(format!(
            "cannot regularize empty series '{}'",
            series.name()
        )));
    };

    let off_grid = series
        .timestamps()
        .iter()
        .filter(|ts| !freq.is_aligned(**ts))
        .count();
    if off_grid > 0 {
        warn!(
            "{} timestamps of '{}' are not aligned to {} and were dropped",
            off_grid,
            series.name(),
            freq
        );
    }

    let timestamps = grid(freq.floor(first)?, last, freq)?;
    let values = timestamps
        .iter()
        .map(|ts| series.value_at(*ts).flatten())
        .collect();
    TimeSeries::new(series.name(), timestamps, values)
}

/// Fail with [`GapFillError::InvalidFrequency`] unless `coarse` is strictly
/// coarser than `fine` and a whole multiple of it.
pub fn check_frequency_pair(coarse: Frequency, fine: Frequency) -> Result<()> {
    if coarse <= fine || !coarse.is_multiple_of(fine) {
        return Err(GapFillError::InvalidFrequency(format!(
            "coarse {} must be a whole multiple of fine {} and coarser",
            coarse, fine
        )));
    }
    Ok(())
}

/// Downsample to `coarse`, then upsample back to `fine`.
///
/// The result holds exactly one known value per populated coarse bucket (the
/// reduced value, at the bucket start) and is missing everywhere else.
pub fn introduce_gaps(
    series: &TimeSeries,
    coarse: Frequency,
    fine: Frequency,
    reducer: Aggregation,
) -> Result<TimeSeries> {
    check_frequency_pair(coarse, fine)?;
    let coarse_series = downsample(series, coarse, reducer)?;
    upsample(&coarse_series, fine)
}
