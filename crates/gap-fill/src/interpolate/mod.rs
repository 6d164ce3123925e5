//! Interpolation of missing runs.
//!
//! This module provides gap filling strategies including:
//! - Linear and time-weighted interpolation
//! - Local polynomial interpolation
//! - Interpolating B-splines
//! - Cubic Hermite interpolation with implied derivatives
//!
//! Only interior runs (known values on both sides) are filled. Leading and
//! trailing runs are left alone; [`fill_boundary`] handles them explicitly.

mod hermite;
mod polynomial;
mod spline;

use crate::config::{Aggregation, BoundaryPolicy, InterpolationMethod};
use crate::error::{GapFillError, Result};
use crate::types::{GapKind, TimeSeries};
use tracing::{debug, warn};

/// Known points of a series in interpolation coordinates.
pub(crate) struct KnownPoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl KnownPoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }
}

/// Range of `count` known points around the bracket `(left, left + 1)`,
/// balanced across both sides and shifted when one side runs out.
pub(crate) fn window(n_known: usize, left: usize, count: usize) -> std::ops::Range<usize> {
    let count = count.min(n_known);
    let left_take = count.div_ceil(2);
    let start = (left + 1).saturating_sub(left_take).min(n_known - count);
    start..start + count
}

/// Number of known points `method` needs.
fn required_points(method: InterpolationMethod) -> usize {
    match method {
        InterpolationMethod::Polynomial { order } | InterpolationMethod::Spline { order } => {
            order + 1
        }
        _ => 2,
    }
}

/// Fill every interior missing run of `series` with `method`.
///
/// Known values are returned unchanged and boundary runs stay missing.
///
/// # Errors
///
/// Returns [`GapFillError::InvalidConfig`] for an unusable order and
/// [`GapFillError::InsufficientPoints`] when the series has fewer known
/// points than the order requires.
pub fn interpolate(series: &TimeSeries, method: InterpolationMethod) -> Result<TimeSeries> {
    method.validate()?;

    let runs: Vec<_> = series
        .gap_runs()
        .into_iter()
        .filter(|run| run.kind == GapKind::Interior)
        .collect();
    if runs.is_empty() {
        debug!("No interior gaps in '{}'", series.name());
        return Ok(series.clone());
    }

    let known_index: Vec<usize> = series
        .values()
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let required = required_points(method);
    if known_index.len() < required {
        return Err(GapFillError::InsufficientPoints {
            method: method.name().to_string(),
            order: method.order().unwrap_or(1),
            required,
            available: known_index.len(),
        });
    }

    // Linear treats positions as equally spaced; every other method works
    // on elapsed seconds.
    let xs: Vec<f64> = match method {
        InterpolationMethod::Linear => (0..series.len()).map(|i| i as f64).collect(),
        _ => {
            let origin = series.timestamps()[0];
            series
                .timestamps()
                .iter()
                .map(|ts| (*ts - origin).num_milliseconds() as f64 / 1_000.0)
                .collect()
        }
    };

    let known = KnownPoints {
        x: known_index.iter().map(|&i| xs[i]).collect(),
        y: known_index
            .iter()
            .filter_map(|&i| series.values()[i])
            .collect(),
    };

    let mut values = series.values().to_vec();
    let mut filled = 0usize;

    for run in &runs {
        // interior runs always have a known point right before them
        let left = known_index.partition_point(|&i| i < run.start_index) - 1;
        let targets: Vec<f64> = (run.start_index..run.end_index()).map(|i| xs[i]).collect();

        let estimates = match method {
            InterpolationMethod::Linear | InterpolationMethod::Time => {
                linear(&known, left, &targets)
            }
            InterpolationMethod::Polynomial { order } => {
                polynomial::fill(&known, left, order, &targets)
            }
            InterpolationMethod::Spline { order } => spline::fill(&known, left, order, &targets)?,
            InterpolationMethod::FromDerivatives => hermite::fill(&known, left, &targets),
        };

        for (offset, estimate) in estimates.into_iter().enumerate() {
            if !estimate.is_finite() {
                return Err(GapFillError::InvalidSeries(format!(
                    "{} interpolation produced a non-finite value at {}",
                    method.name(),
                    series.timestamps()[run.start_index + offset]
                )));
            }
            values[run.start_index + offset] = Some(estimate);
            filled += 1;
        }
    }

    debug!(
        "Filled {} points in {} interior gaps of '{}' with {}",
        filled,
        runs.len(),
        series.name(),
        method.name()
    );

    series.with_values(values)
}

/// Straight line between the bracketing known points.
fn linear(known: &KnownPoints, left: usize, targets: &[f64]) -> Vec<f64> {
    let (x0, x1) = (known.x[left], known.x[left + 1]);
    let (y0, y1) = (known.y[left], known.y[left + 1]);
    targets
        .iter()
        .map(|&x| y0 + (y1 - y0) * (x - x0) / (x1 - x0))
        .collect()
}

/// Handle leading/trailing missing runs according to `policy`.
pub fn fill_boundary(series: &TimeSeries, policy: BoundaryPolicy) -> Result<TimeSeries> {
    let boundary: Vec<_> = series
        .gap_runs()
        .into_iter()
        .filter(|run| run.kind.is_boundary())
        .collect();
    if boundary.is_empty() || policy == BoundaryPolicy::Leave {
        return Ok(series.clone());
    }

    if policy == BoundaryPolicy::Drop {
        let first = series.values().iter().position(|v| v.is_some());
        let last = series.values().iter().rposition(|v| v.is_some());
        return match (first, last) {
            (Some(first), Some(last)) => Ok(series.slice(first..last + 1)),
            _ => {
                warn!("Dropping boundary of '{}' leaves nothing", series.name());
                Ok(TimeSeries::empty(series.name()))
            }
        };
    }

    let known: Vec<f64> = series.known().map(|(_, v)| v).collect();
    let no_known = || {
        GapFillError::NoData(format!(
            "'{}' has no known values to fill its boundary from",
            series.name()
        ))
    };

    let mut values = series.values().to_vec();
    for run in &boundary {
        let value = match policy {
            BoundaryPolicy::Constant(value) => value,
            BoundaryPolicy::Mean => Aggregation::Mean.reduce(&known).ok_or_else(no_known)?,
            BoundaryPolicy::Median => Aggregation::Median.reduce(&known).ok_or_else(no_known)?,
            BoundaryPolicy::Nearest if run.kind == GapKind::Leading => {
                known.first().copied().ok_or_else(no_known)?
            }
            BoundaryPolicy::Nearest => known.last().copied().ok_or_else(no_known)?,
            BoundaryPolicy::Leave | BoundaryPolicy::Drop => continue,
        };
        for slot in &mut values[run.start_index..run.end_index()] {
            *slot = Some(value);
        }
    }

    debug!(
        "Filled {} boundary runs of '{}' with policy {:?}",
        boundary.len(),
        series.name(),
        policy
    );
    series.with_values(values)
}
