//! Configuration types for the gap-filling workflow.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic workflow setup.

use crate::error::{GapFillError, Result};
use crate::types::Frequency;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest spline degree accepted by [`InterpolationMethod::Spline`].
pub const MAX_SPLINE_ORDER: usize = 5;

/// Reducer applied to the values of one coarse bucket when downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Arithmetic mean of the known values
    #[default]
    Mean,
    /// Median of the known values
    Median,
    /// Smallest known value
    Min,
    /// Largest known value
    Max,
    /// Sum of the known values
    Sum,
    /// First known value in the bucket
    First,
    /// Last known value in the bucket
    Last,
}

impl Aggregation {
    /// Reduce the known values of a bucket. Returns `None` for an empty bucket.
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let reduced = match self {
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Sum => values.iter().sum(),
            Self::First => values[0],
            Self::Last => values[values.len() - 1],
        };
        Some(reduced)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

/// Strategy for filling interior missing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// Straight line between neighbours, positions treated as equally spaced
    #[default]
    Linear,
    /// Straight line weighted by elapsed time
    Time,
    /// Degree-`order` polynomial through the nearest `order + 1` known points
    Polynomial { order: usize },
    /// Interpolating B-spline of degree `order` through surrounding known points
    Spline { order: usize },
    /// Cubic Hermite pieces matching values and implied derivatives at knots
    FromDerivatives,
}

impl InterpolationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Time => "time",
            Self::Polynomial { .. } => "polynomial",
            Self::Spline { .. } => "spline",
            Self::FromDerivatives => "from_derivatives",
        }
    }

    /// Order parameter, for the methods that take one.
    pub fn order(&self) -> Option<usize> {
        match self {
            Self::Polynomial { order } | Self::Spline { order } => Some(*order),
            _ => None,
        }
    }

    /// Check the static order parameter.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        match *self {
            Self::Polynomial { order } if order == 0 => Err(ConfigValidationError::InvalidOrder {
                method: self.name().to_string(),
                order,
                max: None,
            }),
            Self::Spline { order } if order == 0 || order > MAX_SPLINE_ORDER => {
                Err(ConfigValidationError::InvalidOrder {
                    method: self.name().to_string(),
                    order,
                    max: Some(MAX_SPLINE_ORDER),
                })
            }
            _ => Ok(()),
        }
    }
}

/// What to do with leading/trailing missing runs after interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Leave boundary gaps missing
    #[default]
    Leave,
    /// Remove leading and trailing missing points from the series
    Drop,
    /// Fill with a fixed value
    Constant(f64),
    /// Fill with the mean of the known values
    Mean,
    /// Fill with the median of the known values
    Median,
    /// Carry the nearest known value outward
    Nearest,
}

/// How the working series is picked from the reshaped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSelector {
    /// Zero-based position among the endpoint columns
    Index(usize),
    /// Endpoint identifier
    Endpoint(String),
}

impl Default for ColumnSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

/// Names of the input columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub entity: String,
    pub endpoint: String,
    pub timestamp: String,
    pub value: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            entity: "entity_id".to_string(),
            endpoint: "endpoint_id".to_string(),
            timestamp: "sample_date".to_string(),
            value: "voltage".to_string(),
        }
    }
}

impl ColumnNames {
    fn as_pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("entity", self.entity.as_str()),
            ("endpoint", self.endpoint.as_str()),
            ("timestamp", self.timestamp.as_str()),
            ("value", self.value.as_str()),
        ]
    }

    /// All four column names, in declaration order.
    pub fn all(&self) -> [&str; 4] {
        [
            self.entity.as_str(),
            self.endpoint.as_str(),
            self.timestamp.as_str(),
            self.value.as_str(),
        ]
    }
}

/// Configuration for the gap-filling workflow.
///
/// Use [`GapFillConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use gap_fill::config::{GapFillConfig, InterpolationMethod};
///
/// let config = GapFillConfig::builder()
///     .entity_id("M-1001")
///     .coarse_frequency("1D".parse()?)
///     .method(InterpolationMethod::Spline { order: 3 })
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillConfig {
    /// Input column names.
    pub columns: ColumnNames,

    /// Entity to keep when filtering. Required to run the workflow.
    pub entity_id: Option<String>,

    /// Which endpoint column becomes the working series.
    /// Default: first column
    pub column: ColumnSelector,

    /// Grid of the working series and of the re-expanded series.
    /// Default: 1h
    pub fine_frequency: Frequency,

    /// Grid the series is aggregated to.
    /// Default: 1D
    pub coarse_frequency: Frequency,

    /// Reducer used when downsampling.
    /// Default: Mean
    pub aggregation: Aggregation,

    /// Interpolation strategy.
    /// Default: Linear
    pub method: InterpolationMethod,

    /// Treatment of leading/trailing gaps.
    /// Default: Leave
    pub boundary: BoundaryPolicy,

    /// Whether to score the fill against the observed series.
    /// Default: true
    pub score_fill: bool,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            entity_id: None,
            column: ColumnSelector::default(),
            fine_frequency: default_fine_frequency(),
            coarse_frequency: default_coarse_frequency(),
            aggregation: Aggregation::default(),
            method: InterpolationMethod::default(),
            boundary: BoundaryPolicy::default(),
            score_fill: true,
        }
    }
}

fn default_fine_frequency() -> Frequency {
    Frequency::HOURLY
}

fn default_coarse_frequency() -> Frequency {
    Frequency::DAILY
}

impl GapFillConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GapFillConfigBuilder {
        GapFillConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GapFillError::Io(e).with_context(format!("Reading config {}", path.display()))
        })?;
        let config: GapFillConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        for (field, name) in self.columns.as_pairs() {
            if name.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
        }

        let names = self.columns.all();
        for (i, name) in names.iter().enumerate() {
            if names[i + 1..].contains(name) {
                return Err(ConfigValidationError::DuplicateColumnName(name.to_string()));
            }
        }

        if self.coarse_frequency <= self.fine_frequency
            || !self.coarse_frequency.is_multiple_of(self.fine_frequency)
        {
            return Err(ConfigValidationError::InvalidFrequencyPair {
                fine: self.fine_frequency.to_string(),
                coarse: self.coarse_frequency.to_string(),
            });
        }

        self.method.validate()?;

        if let BoundaryPolicy::Constant(value) = self.boundary
            && !value.is_finite()
        {
            return Err(ConfigValidationError::NonFiniteBoundaryValue(value));
        }

        if let Some(entity) = &self.entity_id
            && entity.trim().is_empty()
        {
            return Err(ConfigValidationError::EmptyEntityId);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(String),

    #[error("Column '{0}' is mapped to more than one role")]
    DuplicateColumnName(String),

    #[error("Entity id must not be empty")]
    EmptyEntityId,

    #[error(
        "Coarse frequency {coarse} must be strictly coarser than and a whole multiple of fine frequency {fine}"
    )]
    InvalidFrequencyPair { fine: String, coarse: String },

    #[error("Invalid order {order} for {method} interpolation ({})", order_bounds(.max))]
    InvalidOrder {
        method: String,
        order: usize,
        max: Option<usize>,
    },

    #[error("Boundary fill value must be finite, got {0}")]
    NonFiniteBoundaryValue(f64),
}

fn order_bounds(max: &Option<usize>) -> String {
    match max {
        Some(max) => format!("must be 1..={}", max),
        None => "must be at least 1".to_string(),
    }
}

/// Builder for [`GapFillConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct GapFillConfigBuilder {
    columns: Option<ColumnNames>,
    entity_id: Option<String>,
    column: Option<ColumnSelector>,
    fine_frequency: Option<Frequency>,
    coarse_frequency: Option<Frequency>,
    aggregation: Option<Aggregation>,
    method: Option<InterpolationMethod>,
    boundary: Option<BoundaryPolicy>,
    score_fill: Option<bool>,
}

impl GapFillConfigBuilder {
    /// Set all input column names at once.
    pub fn columns(mut self, columns: ColumnNames) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Set the entity to filter on.
    pub fn entity_id(mut self, entity: impl Into<String>) -> Self {
        self.entity_id = Some(entity.into());
        self
    }

    /// Pick the working series by position among endpoint columns.
    pub fn column_index(mut self, index: usize) -> Self {
        self.column = Some(ColumnSelector::Index(index));
        self
    }

    /// Pick the working series by endpoint identifier.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.column = Some(ColumnSelector::Endpoint(endpoint.into()));
        self
    }

    pub fn fine_frequency(mut self, freq: Frequency) -> Self {
        self.fine_frequency = Some(freq);
        self
    }

    pub fn coarse_frequency(mut self, freq: Frequency) -> Self {
        self.coarse_frequency = Some(freq);
        self
    }

    /// Set the downsampling reducer.
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Set the interpolation strategy.
    pub fn method(mut self, method: InterpolationMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the treatment of leading/trailing gaps.
    pub fn boundary(mut self, policy: BoundaryPolicy) -> Self {
        self.boundary = Some(policy);
        self
    }

    /// Enable or disable scoring the fill against the observed series.
    pub fn score_fill(mut self, score: bool) -> Self {
        self.score_fill = Some(score);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `GapFillConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<GapFillConfig, ConfigValidationError> {
        let config = GapFillConfig {
            columns: self.columns.unwrap_or_default(),
            entity_id: self.entity_id,
            column: self.column.unwrap_or_default(),
            fine_frequency: self.fine_frequency.unwrap_or_else(default_fine_frequency),
            coarse_frequency: self
                .coarse_frequency
                .unwrap_or_else(default_coarse_frequency),
            aggregation: self.aggregation.unwrap_or_default(),
            method: self.method.unwrap_or_default(),
            boundary: self.boundary.unwrap_or_default(),
            score_fill: self.score_fill.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
