//! Synthetic random-walk data for spans with no observations.
//!
//! [`RandomWalkGenerator`] fits a distribution to the first differences of a
//! series, draws a walk of differences from it and integrates that walk from
//! the last observed value. The output is a [`SyntheticSeries`], never a
//! [`TimeSeries`], so generated values cannot be mistaken for readings.

use crate::config::Aggregation;
use crate::error::{GapFillError, Result};
use crate::types::{Frequency, TimeSeries, timestamp_column};
use chrono::NaiveDateTime;
use polars::prelude::*;
use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Laplace, Normal};
use tracing::{debug, info};

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 42;

/// Distribution fitted to first differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceModel {
    /// Gaussian with the sample mean and standard deviation
    #[default]
    Normal,
    /// Laplace with the median and mean absolute deviation from it
    Laplace,
    /// Resample the observed differences with replacement
    Empirical,
}

impl DifferenceModel {
    pub fn name(&self) -> &'static str {
        match self {
            DifferenceModel::Normal => "normal",
            DifferenceModel::Laplace => "laplace",
            DifferenceModel::Empirical => "empirical",
        }
    }
}

/// Sampler behind a fitted model.
#[derive(Debug, Clone)]
enum StepSampler {
    Normal(Normal),
    Laplace(Laplace),
    Empirical,
}

/// A difference distribution fitted to observed data.
#[derive(Debug, Clone, Serialize)]
pub struct FittedDifferences {
    model: DifferenceModel,
    location: f64,
    scale: f64,
    #[serde(skip)]
    differences: Vec<f64>,
    #[serde(skip)]
    sampler: StepSampler,
}

impl FittedDifferences {
    /// Fit `model` to the differences between consecutive known points.
    ///
    /// Only pairs that are adjacent in the series contribute, so a gap never
    /// turns into one large jump. Normal and Laplace fits need a positive
    /// spread; a series that moves by the same step every time fails with
    /// [`GapFillError::InvalidSeries`].
    pub fn fit(series: &TimeSeries, model: DifferenceModel) -> Result<Self> {
        let differences: Vec<f64> = series
            .values()
            .windows(2)
            .filter_map(|pair| match pair {
                [Some(a), Some(b)] => Some(b - a),
                _ => None,
            })
            .collect();

        if differences.len() < 2 {
            return Err(GapFillError::InsufficientPoints {
                method: format!("{} random walk", model.name()),
                order: 1,
                required: 2,
                available: differences.len(),
            });
        }

        let (location, scale) = match model {
            DifferenceModel::Normal | DifferenceModel::Empirical => {
                let n = differences.len() as f64;
                let mean = differences.iter().sum::<f64>() / n;
                let variance =
                    differences.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
                (mean, variance.sqrt())
            }
            DifferenceModel::Laplace => {
                let median = Aggregation::Median
                    .reduce(&differences)
                    .unwrap_or_default();
                let spread = differences.iter().map(|d| (d - median).abs()).sum::<f64>()
                    / differences.len() as f64;
                (median, spread)
            }
        };

        let unfit = |e: &dyn std::fmt::Display| {
            GapFillError::InvalidSeries(format!(
                "cannot fit {} model to '{}' (location={}, scale={}): {}",
                model.name(),
                series.name(),
                location,
                scale,
                e
            ))
        };
        let sampler = match model {
            DifferenceModel::Normal => {
                StepSampler::Normal(Normal::new(location, scale).map_err(|e| unfit(&e))?)
            }
            DifferenceModel::Laplace => {
                StepSampler::Laplace(Laplace::new(location, scale).map_err(|e| unfit(&e))?)
            }
            DifferenceModel::Empirical => StepSampler::Empirical,
        };

        debug!(
            "Fitted {} model to {} differences of '{}': location={:.4}, scale={:.4}",
            model.name(),
            differences.len(),
            series.name(),
            location,
            scale
        );

        Ok(Self {
            model,
            location,
            scale,
            differences,
            sampler,
        })
    }

    pub fn model(&self) -> DifferenceModel {
        self.model
    }

    /// Mean (normal, empirical) or median (laplace) of the differences.
    pub fn location(&self) -> f64 {
        self.location
    }

    /// Standard deviation (normal, empirical) or mean absolute deviation
    /// (laplace).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn sample_count(&self) -> usize {
        self.differences.len()
    }

    fn draw(&self, rng: &mut StdRng) -> f64 {
        match &self.sampler {
            StepSampler::Normal(dist) => dist.sample(rng),
            StepSampler::Laplace(dist) => dist.sample(rng),
            StepSampler::Empirical => self
                .differences
                .choose(rng)
                .copied()
                .unwrap_or(self.location),
        }
    }
}

/// Generated values, kept apart from observed series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticSeries {
    name: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
    model: DifferenceModel,
    seed: u64,
    origin: f64,
}

impl SyntheticSeries {
    /// Always suffixed with `_synthetic`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn model(&self) -> DifferenceModel {
        self.model
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Value the walk was integrated from.
    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Timestamp, value and a constant `source = "synthetic"` column.
    pub fn to_dataframe(&self, timestamp_col: &str) -> Result<DataFrame> {
        let ts = timestamp_column(timestamp_col, &self.timestamps)?;
        let values = Column::new(self.name.as_str().into(), self.values.clone());
        let source = Column::new("source".into(), vec!["synthetic"; self.values.len()]);
        Ok(DataFrame::new(vec![ts, values, source])?)
    }
}

/// Random-walk generator fitted to one observed series.
#[derive(Debug, Clone)]
pub struct RandomWalkGenerator {
    name: String,
    fitted: FittedDifferences,
    origin: f64,
    last_observed: NaiveDateTime,
    seed: u64,
}

impl RandomWalkGenerator {
    /// Fit to `series`, integrating from its last known value.
    pub fn fit(series: &TimeSeries, model: DifferenceModel) -> Result<Self> {
        let fitted = FittedDifferences::fit(series, model)?;
        let (last_observed, origin) = series.known().last().ok_or_else(|| {
            GapFillError::NoData(format!("'{}' has no known values", series.name()))
        })?;

        Ok(Self {
            name: format!("{}_synthetic", series.name()),
            fitted,
            origin,
            last_observed,
            seed: DEFAULT_SEED,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fitted(&self) -> &FittedDifferences {
        &self.fitted
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Timestamp of the value the walk starts from.
    pub fn last_observed(&self) -> NaiveDateTime {
        self.last_observed
    }

    /// Generate `periods` values on the `freq` grid starting at `start`.
    ///
    /// The first value is one drawn step away from the origin.
    pub fn generate(
        &self,
        start: NaiveDateTime,
        freq: Frequency,
        periods: usize,
    ) -> Result<SyntheticSeries> {
        let timestamps = (0..periods)
            .map(|i| freq.advance(start, i as i64))
            .collect::<Result<Vec<_>>>()?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut level = self.origin;
        let values: Vec<f64> = (0..periods)
            .map(|_| {
                level += self.fitted.draw(&mut rng);
                level
            })
            .collect();

        info!(
            "Generated {} synthetic values for '{}' ({} model, seed {})",
            periods,
            self.name,
            self.fitted.model.name(),
            self.seed
        );

        Ok(SyntheticSeries {
            name: self.name.clone(),
            timestamps,
            values,
            model: self.fitted.model,
            seed: self.seed,
            origin: self.origin,
        })
    }

    /// Generate `periods` values continuing right after the last observation.
    pub fn continue_series(&self, freq: Frequency, periods: usize) -> Result<SyntheticSeries> {
        let start = freq.advance(self.last_observed, 1)?;
        self.generate(start, freq, periods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::{hour, hourly};
    use pretty_assertions::assert_eq;

    fn observed() -> TimeSeries {
        hourly(
            "voltage",
            &[
                Some(240.0),
                Some(241.0),
                None,
                Some(239.5),
                Some(240.5),
                Some(242.0),
                Some(241.0),
            ],
        )
    }

    #[test]
    fn test_differences_skip_gaps() {
        let fitted = FittedDifferences::fit(&observed(), DifferenceModel::Empirical).unwrap();
        // 1.0, 1.0, 1.5, -1.0
        assert_eq!(fitted.sample_count(), 4);
        assert!((fitted.location() - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_laplace_uses_median() {
        let fitted = FittedDifferences::fit(&observed(), DifferenceModel::Laplace).unwrap();
        assert!((fitted.location() - 1.0).abs() < 1e-12);
        // |0| + |0| + |0.5| + |-2| over 4
        assert!((fitted.scale() - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_differences() {
        let series = hourly("v", &[Some(1.0), Some(2.0), None, Some(4.0)]);
        let err = RandomWalkGenerator::fit(&series, DifferenceModel::Normal).unwrap_err();
        assert!(matches!(
            err,
            GapFillError::InsufficientPoints { available: 1, .. }
        ));
    }

    #[test]
    fn test_deterministic_per_seed() {
        for model in [
            DifferenceModel::Normal,
            DifferenceModel::Laplace,
            DifferenceModel::Empirical,
        ] {
            let generator = RandomWalkGenerator::fit(&observed(), model).unwrap();
            let a = generator.generate(hour(10), Frequency::HOURLY, 24).unwrap();
            let b = generator.generate(hour(10), Frequency::HOURLY, 24).unwrap();
            assert_eq!(a, b);

            let c = generator
                .clone()
                .with_seed(7)
                .generate(hour(10), Frequency::HOURLY, 24)
                .unwrap();
            assert_ne!(a.values(), c.values(), "{}", model.name());
        }
    }

    #[test]
    fn test_continues_from_last_observation() {
        let generator = RandomWalkGenerator::fit(&observed(), DifferenceModel::Empirical).unwrap();
        assert_eq!(generator.origin(), 241.0);
        assert_eq!(generator.last_observed(), hour(6));

        let walk = generator.continue_series(Frequency::HOURLY, 3).unwrap();
        assert_eq!(walk.timestamps(), &[hour(7), hour(8), hour(9)]);
        assert_eq!(walk.name(), "voltage_synthetic");

        // every empirical step is one of the observed differences
        let allowed = [1.0, 1.5, -1.0];
        let mut previous = walk.origin();
        for value in walk.values() {
            let step = value - previous;
            assert!(allowed.iter().any(|d| (d - step).abs() < 1e-9), "step {step}");
            previous = *value;
        }
    }

    #[test]
    fn test_normal_steps_follow_fit() {
        let fitted = FittedDifferences::fit(&observed(), DifferenceModel::Normal).unwrap();
        let mut rng = StdRng::seed_from_u64(DEFAULT_SEED);
        let n = 20_000;
        let steps: Vec<f64> = (0..n).map(|_| fitted.draw(&mut rng)).collect();
        let mean = steps.iter().sum::<f64>() / n as f64;
        let sd = (steps.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();
        assert!((mean - fitted.location()).abs() < 0.05, "mean {mean}");
        assert!((sd - fitted.scale()).abs() < 0.05, "sd {sd}");
    }

    #[test]
    fn test_laplace_steps_centre_on_median() {
        let fitted = FittedDifferences::fit(&observed(), DifferenceModel::Laplace).unwrap();
        let mut rng = StdRng::seed_from_u64(DEFAULT_SEED);
        let mut steps: Vec<f64> = (0..20_000).map(|_| fitted.draw(&mut rng)).collect();
        steps.sort_by(|a, b| a.total_cmp(b));
        let median = steps[steps.len() / 2];
        // mean absolute deviation about the location equals the scale
        let mad = steps.iter().map(|s| (s - fitted.location()).abs()).sum::<f64>()
            / steps.len() as f64;
        assert!((median - fitted.location()).abs() < 0.05, "median {median}");
        assert!((mad - fitted.scale()).abs() < 0.05, "mad {mad}");
    }

    #[test]
    fn test_constant_steps_cannot_fit_parametric_model() {
        let series = hourly("flat", &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        for model in [DifferenceModel::Normal, DifferenceModel::Laplace] {
            let err = FittedDifferences::fit(&series, model).unwrap_err();
            assert!(matches!(err, GapFillError::InvalidSeries(_)), "{}", model.name());
        }
        // resampling observed steps needs no spread
        let fitted = FittedDifferences::fit(&series, DifferenceModel::Empirical).unwrap();
        assert_eq!(fitted.scale(), 0.0);
    }

    #[test]
    fn test_to_dataframe_labels_source() {
        let generator = RandomWalkGenerator::fit(&observed(), DifferenceModel::Normal).unwrap();
        let walk = generator.generate(hour(20), Frequency::HOURLY, 5).unwrap();
        let df = walk.to_dataframe("sample_date").unwrap();
        assert_eq!(df.shape(), (5, 3));
        let source = df
            .column("source")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap();
        assert_eq!(source.get(0), Some("synthetic"));
    }
}
