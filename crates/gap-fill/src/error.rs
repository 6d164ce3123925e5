//! Error types for the gap-filling workflow.
//!
//! Every failure mode of the workflow maps to one variant so callers can
//! react to, say, an empty entity selection without string matching.
//!
//! Errors serialize as `{ code, message }` so the CLI can emit them inside
//! its JSON output.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the gap-filling library.
#[derive(Error, Debug)]
pub enum GapFillError {
    /// A filter or reshape step produced nothing to work with.
    #[error("No data: {0}")]
    NoData(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A positional column selection fell outside the reshaped table.
    #[error("Column index {index} out of range for table with {len} columns")]
    ColumnIndexOutOfRange { index: usize, len: usize },

    /// A timestamp cell could not be parsed.
    #[error("Failed to parse timestamp in column '{column}' at row {row}: '{value}'")]
    TimestampParse {
        column: String,
        row: usize,
        value: String,
    },

    /// The requested interpolation order needs more known points than exist.
    #[error(
        "Insufficient points for {method} of order {order}: requires {required}, found {available}"
    )]
    InsufficientPoints {
        method: String,
        order: usize,
        required: usize,
        available: usize,
    },

    /// Frequency string or frequency pairing is not usable.
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Series violates its structural invariants.
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GapFillError>,
    },
}

impl GapFillError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GapFillError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, preserved through [`GapFillError::with_context`].
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoData(_) => "NO_DATA",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::ColumnIndexOutOfRange { .. } => "COLUMN_INDEX_OUT_OF_RANGE",
            Self::TimestampParse { .. } => "TIMESTAMP_PARSE",
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Self::InvalidFrequency(_) => "INVALID_FREQUENCY",
            Self::InvalidSeries(_) => "INVALID_SERIES",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means the selection was empty.
    pub fn is_no_data(&self) -> bool {
        match self {
            Self::NoData(_) => true,
            Self::WithContext { source, .. } => source.is_no_data(),
            _ => false,
        }
    }

    /// Check if this error is caused by user input rather than the data or IO.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::InvalidConfig(_)
            | Self::InvalidFrequency(_)
            | Self::ColumnIndexOutOfRange { .. }
            | Self::ColumnNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_user_error(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for GapFillError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        GapFillError::InvalidConfig(err.to_string())
    }
}

impl Serialize for GapFillError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("GapFillError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for gap-filling operations.
pub type Result<T> = std::result::Result<T, GapFillError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| GapFillError::Polars(e).with_context(context))
    }
}
