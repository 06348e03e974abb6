use crate::config::EtlConfig;
use crate::error::Result;
use crate::kpi::KpiReport;
use crate::pipeline::{PipelineRun, PipelineStage, StageResult};
use crate::types::{RowCounts, rejection_counts};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the report written by `--emit-report`.
pub const REPORT_FILE_NAME: &str = "pipeline_report.json";

/// The failure that stopped a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub stage: Option<PipelineStage>,
    pub code: String,
    pub message: String,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    // Metadata
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub source_location: String,
    pub raw_table: String,
    pub destination: String,

    // Outcome
    pub success: bool,
    pub elapsed_secs: f64,
    pub stages: Vec<StageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,

    // Transform results, absent when Transform did not succeed
    pub row_counts: Option<RowCounts>,
    /// Dropped rows per rejection kind
    pub rejection_counts: BTreeMap<String, usize>,
    pub kpis: Option<KpiReport>,
}

impl RunReport {
    pub fn from_run(config: &EtlConfig, run: &PipelineRun) -> Self {
        let error = run.error.as_ref().map(|e| ErrorReport {
            stage: run.failed_stage(),
            code: e.error_code().to_string(),
            message: e.to_string(),
        });

        let transform = run.transform.as_ref();

        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source_location: config.source_location.display().to_string(),
            raw_table: config.raw_table.to_string(),
            destination: config.destination.to_string(),
            success: run.is_success(),
            elapsed_secs: run.elapsed.as_secs_f64(),
            stages: run.stages.clone(),
            error,
            row_counts: transform.map(|t| t.counts),
            rejection_counts: transform
                .map(|t| rejection_counts(&t.rejected))
                .unwrap_or_default(),
            kpis: transform.map(|t| t.kpis.clone()),
        }
    }
}

/// Write `report` as pretty JSON to `<dir>/pipeline_report.json`.
pub fn write_report_to_file(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let report_path = dir.join(REPORT_FILE_NAME);
    let mut file = File::create(&report_path)?;
    file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

    info!("Report saved: {}", report_path.display());
    Ok(report_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::pipeline::StageStatus;
    use crate::transform::TransformOutcome;
    use crate::types::{RejectedRow, RejectionReason};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn stage(stage: PipelineStage, status: StageStatus) -> StageResult {
        StageResult {
            stage,
            status,
            duration_ms: 5,
            rows: None,
        }
    }

    #[test]
    fn test_report_from_failed_run() {
        let run = PipelineRun {
            stages: vec![
                stage(PipelineStage::Ingest, StageStatus::Succeeded),
                stage(PipelineStage::Transform, StageStatus::Failed),
                stage(PipelineStage::Publish, StageStatus::Skipped),
            ],
            transform: None,
            error: Some(EtlError::EmptySurvivors { rows_in: 3 }),
            elapsed: Duration::from_millis(1500),
        };

        let report = RunReport::from_run(&EtlConfig::default(), &run);
        assert!(!report.success);
        assert_eq!(report.elapsed_secs, 1.5);
        assert_eq!(report.destination, "production.sales_data");
        assert_eq!(
            report.error,
            Some(ErrorReport {
                stage: Some(PipelineStage::Transform),
                code: "EMPTY_SURVIVORS".to_string(),
                message: EtlError::EmptySurvivors { rows_in: 3 }.to_string(),
            })
        );
        assert!(report.kpis.is_none());
        assert!(report.rejection_counts.is_empty());
    }

    #[test]
    fn test_report_counts_rejections() {
        let outcome = TransformOutcome {
            rejected: vec![
                RejectedRow::new(1, RejectionReason::ShipBeforeOrder),
                RejectedRow::new(4, RejectionReason::Duplicate { first_row: 0 }),
                RejectedRow::new(6, RejectionReason::ShipBeforeOrder),
            ],
            ..TransformOutcome::default()
        };
        let run = PipelineRun {
            stages: vec![stage(PipelineStage::Transform, StageStatus::Succeeded)],
            transform: Some(outcome),
            error: None,
            elapsed: Duration::ZERO,
        };

        let report = RunReport::from_run(&EtlConfig::default(), &run);
        assert!(report.success);
        assert_eq!(report.rejection_counts.get("ship_before_order"), Some(&2));
        assert_eq!(report.rejection_counts.get("duplicate"), Some(&1));
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = PipelineRun {
            stages: Vec::new(),
            transform: None,
            error: None,
            elapsed: Duration::ZERO,
        };
        let report = RunReport::from_run(&EtlConfig::default(), &run);

        let path = write_report_to_file(&report, &dir.path().join("reports")).unwrap();
        assert_eq!(path.file_name().unwrap(), REPORT_FILE_NAME);

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["success"], serde_json::Value::Bool(true));
        assert_eq!(parsed["raw_table"], "public.raw_sales");
    }
}
