//! Error types for the sales ETL stages.
//!
//! Every stage failure maps to one [`EtlError`] variant. Row-level problems
//! found while cleaning are never errors; they are reported as
//! [`RejectedRow`](crate::types::RejectedRow) diagnostics instead.
//!
//! Errors serialize as `{ code, message }` so a run report can carry them.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the ETL pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// The input dataset (file or table) is missing or unreadable.
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The input dataset has no rows.
    #[error("No rows found in '{0}'")]
    EmptyInput(String),

    /// Every row was filtered out during cleaning.
    #[error("All {rows_in} rows were rejected during cleaning; nothing to persist")]
    EmptySurvivors { rows_in: usize },

    /// Writing a destination table or file failed.
    #[error("Failed to persist '{destination}': {reason}")]
    Persistence { destination: String, reason: String },

    /// The dataset does not have the expected columns.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The spreadsheet sink rejected the upload.
    #[error("Publish to '{sink}' failed: {reason}")]
    PublishFailed { sink: String, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with the "sheets" feature).
    #[cfg(feature = "sheets")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EtlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(destination: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::Persistence {
            destination: destination.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable, upper-snake error code for logs and reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            Self::EmptyInput(_) => "EMPTY_INPUT",
            Self::EmptySurvivors { .. } => "EMPTY_SURVIVORS",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::PublishFailed { .. } => "PUBLISH_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "sheets")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, with all context layers peeled off.
    pub fn root(&self) -> &EtlError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is a configuration problem rather than a data or IO failure.
    pub fn is_config_error(&self) -> bool {
        matches!(self.root(), Self::InvalidConfig(_))
    }
}

impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;

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
        self.map_err(|e| EtlError::Polars(e).with_context(context))
    }
}
