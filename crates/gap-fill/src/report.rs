//! JSON report of a pipeline run.

use crate::analysis::{ColumnMissing, FillAccuracy, MissingSummary};
use crate::config::{Aggregation, BoundaryPolicy, InterpolationMethod};
use crate::error::{GapFillError, Result};
use crate::pipeline::GapFillResult;
use crate::types::Frequency;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Summary of one run, used for both `--json` output and `--emit-report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapFillReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Path to the input file
    pub input_file: String,
    /// CSV export written alongside, if any
    pub export_file: Option<String>,

    pub entity_id: String,
    pub endpoint: String,
    pub endpoints: Vec<String>,

    pub fine_frequency: Frequency,
    pub coarse_frequency: Frequency,
    pub aggregation: Aggregation,
    pub method: InterpolationMethod,
    pub boundary: BoundaryPolicy,

    pub column_missing: Vec<ColumnMissing>,
    pub observed: MissingSummary,
    pub gapped: MissingSummary,
    pub filled: MissingSummary,
    pub accuracy: Option<FillAccuracy>,

    pub duration_ms: u64,
}

impl GapFillReport {
    pub fn new(result: &GapFillResult, input_file: &str, export_file: Option<&Path>) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.to_string(),
            export_file: export_file.map(|p| p.display().to_string()),
            entity_id: result.entity_id.clone(),
            endpoint: result.endpoint.clone(),
            endpoints: result.endpoints.clone(),
            fine_frequency: result.config.fine_frequency,
            coarse_frequency: result.config.coarse_frequency,
            aggregation: result.config.aggregation,
            method: result.config.method,
            boundary: result.config.boundary,
            column_missing: result.column_missing.clone(),
            observed: result.observed_summary.clone(),
            gapped: result.gapped_summary.clone(),
            filled: result.filled_summary.clone(),
            accuracy: result.accuracy.clone(),
            duration_ms: result.duration_ms,
        }
    }

    /// `<entity>_<endpoint>`, with path-hostile characters replaced.
    pub fn base_name(&self) -> String {
        format!("{}_{}", self.entity_id, self.endpoint)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write `report` to `<output_dir>/<entity>_<endpoint>_report.json`.
pub fn write_report_to_file(report: &GapFillReport, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| {
        GapFillError::Io(e).with_context(format!("Creating {}", output_dir.display()))
    })?;

    let report_path = output_dir.join(format!("{}_report.json", report.base_name()));
    let mut file = File::create(&report_path)?;
    file.write_all(report.to_json()?.as_bytes())?;

    info!("Report saved: {}", report_path.display());

    Ok(report_path)
}
