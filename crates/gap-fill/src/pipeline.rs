//! End-to-end gap-filling workflow.
//!
//! [`GapFillPipeline`] ties the library together: filter one entity, pivot
//! its endpoints, pick the working series, knock gaps into it by resampling,
//! fill them and score the result against what was observed.

use crate::analysis::{ColumnMissing, FillAccuracy, MissingSummary};
use crate::config::GapFillConfig;
use crate::error::{GapFillError, Result, ResultExt};
use crate::interpolate::{fill_boundary, interpolate};
use crate::loader::{filter_entity, load_csv, pivot_endpoints, prepare_readings};
use crate::resample::{as_frequency, check_frequency_pair, downsample, upsample};
use crate::types::{TimeSeries, timestamp_column};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// The gap-filling pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use gap_fill::{GapFillConfig, GapFillPipeline, InterpolationMethod};
///
/// let result = GapFillPipeline::builder()
///     .config(
///         GapFillConfig::builder()
///             .entity_id("1001")
///             .method(InterpolationMethod::Time)
///             .build()?,
///     )
///     .build()?
///     .run_file("readings.csv")?;
///
/// println!("{}", result.to_dataframe()?);
/// ```
#[derive(Debug, Clone)]
pub struct GapFillPipeline {
    config: GapFillConfig,
    entity_id: String,
}

static_assertions::assert_impl_all!(GapFillPipeline: Send, Sync);

impl GapFillPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> GapFillPipelineBuilder {
        GapFillPipelineBuilder::default()
    }

    pub fn config(&self) -> &GapFillConfig {
        &self.config
    }

    /// Load a CSV file and run the workflow on it.
    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<GapFillResult> {
        let path = path.as_ref();
        info!("Loading readings from: {}", path.display());
        let df = load_csv(path)?;
        info!("Loaded {} rows x {} columns", df.height(), df.width());
        self.run(df)
    }

    /// Run the workflow on a readings DataFrame.
    pub fn run(&self, df: DataFrame) -> Result<GapFillResult> {
        self.run_internal(df).inspect_err(|e| error!("Pipeline error: {}", e))
    }

    fn run_internal(&self, df: DataFrame) -> Result<GapFillResult> {
        let start_time = Instant::now();
        let config = &self.config;
        let columns = &config.columns;

        info!("Step 1: Normalising readings...");
        let df = prepare_readings(df, columns)?;

        info!("Step 2: Filtering entity '{}'...", self.entity_id);
        let entity_df = filter_entity(&df, columns, &self.entity_id)?;
        let column_missing = crate::analysis::column_missing(&entity_df);

        info!("Step 3: Pivoting endpoints...");
        let pivot = pivot_endpoints(&entity_df, columns)?;
        info!(
            "Pivoted to {} timestamps x {} endpoints",
            pivot.height(),
            pivot.width()
        );

        info!("Step 4: Selecting column {:?}...", config.column);
        let selected = pivot.select(&config.column)?;
        if selected.known_count() == 0 {
            return Err(GapFillError::NoData(format!(
                "endpoint '{}' has no readings for entity '{}'",
                selected.name(),
                self.entity_id
            )));
        }
        check_frequency_pair(config.coarse_frequency, config.fine_frequency)?;
        // reference for scoring; readings off the fine grid are not in it
        let observed = as_frequency(&selected, config.fine_frequency)
            .context(format!("Regularising '{}'", selected.name()))?;

        info!(
            "Step 5: Downsampling {} readings to {} with {}...",
            selected.known_count(),
            config.coarse_frequency,
            config.aggregation.name()
        );
        let coarse = downsample(&selected, config.coarse_frequency, config.aggregation)?;

        info!("Step 6: Upsampling back to {}...", config.fine_frequency);
        let gapped = upsample(&coarse, config.fine_frequency)?;

        info!("Step 7: Interpolating with {}...", config.method.name());
        let interpolated = interpolate(&gapped, config.method)?;

        info!("Step 8: Applying boundary policy {:?}...", config.boundary);
        let filled = fill_boundary(&interpolated, config.boundary)?;

        let accuracy = if config.score_fill {
            info!("Step 9: Scoring fill against observed values...");
            match FillAccuracy::score(&observed, &gapped, &filled) {
                Ok(accuracy) => {
                    info!(
                        "Scored {} points: MAE={:.4}, RMSE={:.4}, max={:.4}",
                        accuracy.compared, accuracy.mae, accuracy.rmse, accuracy.max_abs_error
                    );
                    Some(accuracy)
                }
                Err(e) if e.is_no_data() => {
                    warn!("Nothing to score: {}", e);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            info!("Step 9: Skipping fill scoring (disabled)");
            None
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Pipeline completed in {}ms", duration_ms);

        Ok(GapFillResult {
            entity_id: self.entity_id.clone(),
            endpoint: observed.name().to_string(),
            endpoints: pivot.endpoints().to_vec(),
            timestamp_name: columns.timestamp.clone(),
            config: config.clone(),
            column_missing,
            observed_summary: MissingSummary::of(&observed),
            gapped_summary: MissingSummary::of(&gapped),
            filled_summary: MissingSummary::of(&filled),
            observed,
            coarse,
            gapped,
            filled,
            accuracy,
            duration_ms,
        })
    }
}

/// Builder for [`GapFillPipeline`].
#[derive(Debug, Default)]
pub struct GapFillPipelineBuilder {
    config: Option<GapFillConfig>,
}

impl GapFillPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: GapFillConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the pipeline.
    ///
    /// Fails with [`GapFillError::InvalidConfig`] if the configuration is
    /// invalid or names no entity.
    pub fn build(self) -> Result<GapFillPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let entity_id = config
            .entity_id
            .clone()
            .ok_or_else(|| GapFillError::InvalidConfig("entity_id is required".to_string()))?;
        Ok(GapFillPipeline { config, entity_id })
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone)]
pub struct GapFillResult {
    pub entity_id: String,
    /// Endpoint of the working series
    pub endpoint: String,
    /// Every endpoint found for the entity
    pub endpoints: Vec<String>,
    pub timestamp_name: String,
    pub config: GapFillConfig,
    /// Null counts of the entity's rows before pivoting
    pub column_missing: Vec<ColumnMissing>,
    /// Working series on the fine grid, readings off that grid left out
    pub observed: TimeSeries,
    /// Bucket values reduced from every reading of the working series
    pub coarse: TimeSeries,
    pub gapped: TimeSeries,
    pub filled: TimeSeries,
    pub observed_summary: MissingSummary,
    pub gapped_summary: MissingSummary,
    pub filled_summary: MissingSummary,
    pub accuracy: Option<FillAccuracy>,
    pub duration_ms: u64,
}

impl GapFillResult {
    /// Observed, gapped and filled values side by side on the fine grid.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let timestamps: Vec<NaiveDateTime> = self.observed.timestamps().to_vec();
        let aligned = |series: &TimeSeries| -> Vec<Option<f64>> {
            timestamps
                .iter()
                .map(|ts| series.value_at(*ts).flatten())
                .collect()
        };

        let filled_name = format!("filled_{}", self.config.method.name());
        Ok(DataFrame::new(vec![
            timestamp_column(&self.timestamp_name, &timestamps)?,
            Column::new("observed".into(), aligned(&self.observed)),
            Column::new("gapped".into(), aligned(&self.gapped)),
            Column::new(filled_name.into(), aligned(&self.filled)),
        ])?)
    }

    /// Export [`Self::to_dataframe`] as CSV.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut df = self.to_dataframe()?;
        let mut file = std::fs::File::create(path).map_err(|e| {
            GapFillError::Io(e).with_context(format!("Creating {}", path.display()))
        })?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .context(format!("Writing {}", path.display()))?;
        info!("Exported {} rows to {}", df.height(), path.display());
        Ok(())
    }
}
