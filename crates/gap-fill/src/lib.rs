//! Gap-filling for meter time series
//!
//! A small library built on Polars for studying missing values in utility
//! meter readings and comparing the ways they can be filled.
//!
//! # Overview
//!
//! - **Loading**: CSV readings with tolerant timestamp parsing
//! - **Reshaping**: per-entity filtering and an endpoint pivot
//! - **Resampling**: downsample to a coarse grid, upsample back with gaps
//! - **Interpolation**: linear, time-weighted, polynomial, spline and
//!   derivative-matching fills, plus explicit boundary policies
//! - **Analysis**: missing-value summaries and fill accuracy
//! - **Synthetic data**: seeded random walks fitted to observed differences
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gap_fill::{GapFillConfig, GapFillPipeline, InterpolationMethod};
//!
//! let config = GapFillConfig::builder()
//!     .entity_id("1001")
//!     .endpoint("2")
//!     .coarse_frequency("1D".parse()?)
//!     .method(InterpolationMethod::Spline { order: 3 })
//!     .build()?;
//!
//! let result = GapFillPipeline::builder()
//!     .config(config)
//!     .build()?
//!     .run_file("readings.csv")?;
//!
//! println!("{}", result.to_dataframe()?);
//! if let Some(accuracy) = &result.accuracy {
//!     println!("MAE: {:.4}", accuracy.mae);
//! }
//! ```
//!
//! # Working with series directly
//!
//! Every step is a plain function over [`TimeSeries`]:
//!
//! ```rust,ignore
//! use gap_fill::{Aggregation, Frequency, InterpolationMethod, interpolate, introduce_gaps};
//!
//! let gapped = introduce_gaps(&series, Frequency::DAILY, Frequency::HOURLY, Aggregation::Mean)?;
//! let filled = interpolate(&gapped, InterpolationMethod::Polynomial { order: 2 })?;
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod resample;
pub mod synthetic;
pub mod types;

// Re-exports for convenient access
pub use analysis::{ColumnMissing, FillAccuracy, MissingSummary, column_missing, missing_table};
pub use config::{
    Aggregation, BoundaryPolicy, ColumnNames, ColumnSelector, ConfigValidationError,
    GapFillConfig, GapFillConfigBuilder, InterpolationMethod, MAX_SPLINE_ORDER,
};
pub use error::{GapFillError, ResultExt};
pub use interpolate::{fill_boundary, interpolate};
pub use loader::{
    PivotTable, entity_ids, filter_entity, load_csv, load_readings, parse_timestamp,
    pivot_endpoints, prepare_readings,
};
pub use pipeline::{GapFillPipeline, GapFillPipelineBuilder, GapFillResult};
pub use report::{GapFillReport, write_report_to_file};
pub use resample::{as_frequency, check_frequency_pair, downsample, introduce_gaps, upsample};
pub use synthetic::{
    DEFAULT_SEED, DifferenceModel, FittedDifferences, RandomWalkGenerator, SyntheticSeries,
};
pub use types::{Frequency, GapKind, GapRun, TimeSeries};
