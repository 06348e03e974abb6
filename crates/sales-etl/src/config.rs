//! Configuration types for the ETL pipeline.
//!
//! One [`EtlConfig`] value is built up front and passed to every stage, so
//! no stage reads process-wide state on its own. Use
//! [`EtlConfig::builder()`] for the fluent API.

use crate::error::EtlError;
use crate::types::TableRef;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the flat source file.
pub const DEFAULT_SOURCE_LOCATION: &str = "data/100000 Sales Records.csv";

/// Default root directory of the table store.
pub const DEFAULT_STORE_ROOT: &str = "warehouse";

/// Default raw staging table name.
pub const DEFAULT_RAW_TABLE: &str = "raw_sales";

/// Default production table name.
pub const DEFAULT_DESTINATION_TABLE: &str = "sales_data";

/// Default local spreadsheet export.
pub const DEFAULT_SHEET_PATH: &str = "output/sales_dashboard.csv";

/// Default worksheet range written by the Google Sheets sink.
pub const DEFAULT_WORKSHEET: &str = "Sheet1";

/// Where Publish pushes the production dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishTarget {
    /// A CSV file standing in for the spreadsheet.
    Csv { path: PathBuf },
    /// A Google Sheets worksheet, authorized by a static credential file.
    GoogleSheet {
        spreadsheet_id: String,
        worksheet: String,
        credentials_path: PathBuf,
    },
}

impl Default for PublishTarget {
    fn default() -> Self {
        PublishTarget::Csv {
            path: PathBuf::from(DEFAULT_SHEET_PATH),
        }
    }
}

/// Configuration shared by the Ingest, Transform and Publish stages.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::config::EtlConfig;
///
/// let config = EtlConfig::builder()
///     .source_location("data/sales.csv")
///     .destination("production.sales_data")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Flat CSV file read by Ingest.
    pub source_location: PathBuf,

    /// Root directory of the table store.
    /// Default: "warehouse"
    pub store_root: PathBuf,

    /// Raw staging table written by Ingest and read by Transform.
    /// Default: public.raw_sales
    pub raw_table: TableRef,

    /// Production table written by Transform and read by Publish.
    /// Default: production.sales_data
    pub destination: TableRef,

    /// Spreadsheet sink used by Publish.
    pub publish_target: PublishTarget,

    /// Upload at most this many rows. `None` uploads everything.
    pub publish_row_limit: Option<usize>,

    /// Directory for the JSON run report. `None` disables the report file.
    pub report_dir: Option<PathBuf>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source_location: PathBuf::from(DEFAULT_SOURCE_LOCATION),
            store_root: PathBuf::from(DEFAULT_STORE_ROOT),
            raw_table: TableRef::raw(DEFAULT_RAW_TABLE),
            destination: TableRef::production(DEFAULT_DESTINATION_TABLE),
            publish_target: PublishTarget::default(),
            publish_row_limit: None,
            report_dir: None,
        }
    }
}

impl EtlConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EtlConfigBuilder {
        EtlConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.source_location.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyValue("source_location"));
        }

        if self.store_root.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyValue("store_root"));
        }

        if self.raw_table == self.destination {
            return Err(ConfigValidationError::SameTable(self.destination.to_string()));
        }

        if self.publish_row_limit == Some(0) {
            return Err(ConfigValidationError::InvalidRowLimit);
        }

        match &self.publish_target {
            PublishTarget::Csv { path } if path.as_os_str().is_empty() => {
                return Err(ConfigValidationError::EmptyValue("publish_target.path"));
            }
            PublishTarget::GoogleSheet {
                spreadsheet_id,
                worksheet,
                ..
            } => {
                if spreadsheet_id.trim().is_empty() {
                    return Err(ConfigValidationError::EmptyValue("spreadsheet_id"));
                }
                if worksheet.trim().is_empty() {
                    return Err(ConfigValidationError::EmptyValue("worksheet"));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("'{0}' must not be empty")]
    EmptyValue(&'static str),

    #[error("Invalid table identifier '{0}' (expected 'namespace.table' or 'table')")]
    InvalidTableIdentifier(String),

    #[error("Raw and production tables must differ (both are '{0}')")]
    SameTable(String),

    #[error("Publish row limit must be at least 1")]
    InvalidRowLimit,
}

impl From<ConfigValidationError> for EtlError {
    fn from(err: ConfigValidationError) -> Self {
        EtlError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`EtlConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EtlConfigBuilder {
    source_location: Option<PathBuf>,
    store_root: Option<PathBuf>,
    raw_table: Option<String>,
    destination: Option<String>,
    publish_target: Option<PublishTarget>,
    publish_row_limit: Option<usize>,
    report_dir: Option<PathBuf>,
}

impl EtlConfigBuilder {
    /// Set the CSV file read by Ingest.
    pub fn source_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_location = Some(path.into());
        self
    }

    /// Set the table store root directory.
    pub fn store_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_root = Some(path.into());
        self
    }

    /// Set the raw table, as `namespace.table` or a bare name in `public`.
    pub fn raw_table(mut self, identifier: impl Into<String>) -> Self {
        self.raw_table = Some(identifier.into());
        self
    }

    /// Set the production table, as `namespace.table` or a bare name in `production`.
    pub fn destination(mut self, identifier: impl Into<String>) -> Self {
        self.destination = Some(identifier.into());
        self
    }

    /// Set the spreadsheet sink.
    pub fn publish_target(mut self, target: PublishTarget) -> Self {
        self.publish_target = Some(target);
        self
    }

    /// Cap the number of rows uploaded by Publish.
    pub fn publish_row_limit(mut self, limit: usize) -> Self {
        self.publish_row_limit = Some(limit);
        self
    }

    /// Write a JSON run report into this directory.
    pub fn report_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(path.into());
        self
    }

    /// Build the configuration, validating it.
    pub fn build(self) -> Result<EtlConfig, ConfigValidationError> {
        let defaults = EtlConfig::default();

        let raw_table = match self.raw_table {
            Some(id) => TableRef::parse(&id, crate::types::RAW_NAMESPACE)
                .ok_or(ConfigValidationError::InvalidTableIdentifier(id))?,
            None => defaults.raw_table,
        };

        let destination = match self.destination {
            Some(id) => TableRef::parse(&id, crate::types::PRODUCTION_NAMESPACE)
                .ok_or(ConfigValidationError::InvalidTableIdentifier(id))?,
            None => defaults.destination,
        };

        let config = EtlConfig {
            source_location: self.source_location.unwrap_or(defaults.source_location),
            store_root: self.store_root.unwrap_or(defaults.store_root),
            raw_table,
            destination,
            publish_target: self.publish_target.unwrap_or(defaults.publish_target),
            publish_row_limit: self.publish_row_limit.or(defaults.publish_row_limit),
            report_dir: self.report_dir.or(defaults.report_dir),
        };

        config.validate()?;
        Ok(config)
    }
}
