//! Run reports.
//!
//! A [`RunReport`] summarises one pipeline run: per-stage status and timing,
//! Transform's row counts and rejections, and the KPIs. The same value backs
//! `--json` output on stdout and the `--emit-report` file.
//!
//! # Example
//!
//! ```rust,ignore
//! use sales_etl::reporting::{RunReport, write_report_to_file};
//!
//! let report = RunReport::from_run(&config, &run);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! write_report_to_file(&report, Path::new("reports"))?;
//! ```

mod generator;

pub use generator::{ErrorReport, REPORT_FILE_NAME, RunReport, write_report_to_file};
