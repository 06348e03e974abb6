//! Sales ETL Library
//!
//! A three-stage batch pipeline for flat-file sales records, built on Polars.
//!
//! # Overview
//!
//! - **Ingest**: reads a CSV file with every column as text, normalizes the
//!   headers and replaces the raw staging table
//! - **Transform**: removes exact duplicates, parses dates and numbers,
//!   drops rows that fail validation, derives `Order_Year`, `Days_to_Ship`
//!   and `Delivery_Speed`, logs summary KPIs and replaces the production table
//! - **Publish**: replaces a spreadsheet (local CSV or Google Sheets) with the
//!   production table
//!
//! Tables live in a [`TableStore`]: one Parquet file per table, replaced
//! atomically on every write.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sales_etl::{EtlConfig, Pipeline};
//!
//! let config = EtlConfig::builder()
//!     .source_location("data/100000 Sales Records.csv")
//!     .store_root("warehouse")
//!     .destination("production.sales_data")
//!     .build()?;
//!
//! let run = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run();
//!
//! if let Some(kpis) = run.transform.as_ref().map(|t| &t.kpis) {
//!     println!("{:?}", kpis.top_item_type_by_revenue);
//! }
//! ```
//!
//! # Transform Only
//!
//! [`transform_dataset`] is the pure core of the Transform stage and works
//! on any in-memory frame:
//!
//! ```rust,ignore
//! let (production, outcome) = sales_etl::transform_dataset(raw_df, "raw_sales")?;
//! println!("kept {} of {} rows", outcome.counts.survivors(), outcome.counts.raw);
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod kpi;
pub mod pipeline;
pub mod publish;
pub mod reporting;
pub mod store;
pub mod transform;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{CleanOutput, SalesCleaner};
pub use config::{ConfigValidationError, EtlConfig, EtlConfigBuilder, PublishTarget};
pub use error::{EtlError, Result as EtlResult, ResultExt};
pub use features::add_derived_columns;
pub use ingest::IngestStage;
pub use kpi::{GroupLeader, KpiReport};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineRun, PipelineStage,
    ProgressReporter, ProgressUpdate, Stage, StageReport, StageStatus,
};
pub use publish::{CsvSheet, PublishStage, SheetSink};
#[cfg(feature = "sheets")]
pub use publish::GoogleSheet;
pub use reporting::{RunReport, write_report_to_file};
pub use store::TableStore;
pub use transform::{TransformOutcome, TransformStage, transform_dataset};
pub use types::{
    DeliverySpeed, RejectedRow, RejectionReason, RowCounts, TableRef, rejection_counts,
};
