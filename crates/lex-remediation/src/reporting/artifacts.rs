use super::RemediationReport;
use crate::anomaly::mark_anomalies;
use crate::error::{Result, ResultExt};
use crate::types::AnomalyReport;
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths written for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactPaths {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_report: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_plan: Option<PathBuf>,
    pub remediation_report: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_data: Option<PathBuf>,
}

/// Writes run artifacts under one output directory.
///
/// For a dataset stem `sales` the files are:
/// - `sales_dq_report.json`: the quality report
/// - `sales_clean_plan.json`: the execution records
/// - `sales_remediation_report.json`: the full report
/// - `sales_cleaned.csv`: the remediated data
/// - `sales_flagged.csv`: the input with an `is_anomaly` column, on request
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the JSON artifacts, and the cleaned CSV when `data` is given.
    ///
    /// Artifacts for stages that did not run are not written.
    pub fn write(
        &self,
        stem: &str,
        report: &RemediationReport,
        data: Option<&mut DataFrame>,
    ) -> Result<ArtifactPaths> {
        fs::create_dir_all(&self.output_dir)
            .map_err(crate::error::RemediationError::from)
            .context(format!("Failed to create {}", self.output_dir.display()))?;

        let quality_report = report
            .quality
            .as_ref()
            .map(|quality| self.write_json(&format!("{}_dq_report.json", stem), quality))
            .transpose()?;

        let clean_plan = report
            .execution
            .as_ref()
            .map(|log| self.write_json(&format!("{}_clean_plan.json", stem), &log.records))
            .transpose()?;

        let remediation_report =
            self.write_json(&format!("{}_remediation_report.json", stem), report)?;

        let cleaned_data = data
            .map(|df| self.write_csv(&format!("{}_cleaned.csv", stem), df))
            .transpose()?;

        Ok(ArtifactPaths {
            quality_report,
            clean_plan,
            remediation_report,
            cleaned_data,
        })
    }

    /// Write the frame the anomaly report was computed on, with each row's
    /// verdict in an `is_anomaly` column.
    pub fn write_flagged(
        &self,
        stem: &str,
        input: &DataFrame,
        anomaly: &AnomalyReport,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .map_err(crate::error::RemediationError::from)
            .context(format!("Failed to create {}", self.output_dir.display()))?;
        let mut marked = mark_anomalies(input, anomaly).context("Failed to mark anomalies")?;
        self.write_csv(&format!("{}_flagged.csv", stem), &mut marked)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }

    fn write_csv(&self, file_name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let mut file = File::create(&path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)
            .context(format!("Failed to write {}", path.display()))?;

        info!("Dataset saved: {}", path.display());
        Ok(path)
    }
}
