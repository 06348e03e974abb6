//! Ingest stage: flat CSV file in, raw staging table out.
//!
//! Every column is read as text. Typing is Transform's job, and a raw table
//! that already coerced `"N/A"` to null would hide rejections from it.

use crate::config::EtlConfig;
use crate::error::{EtlError, Result, ResultExt};
use crate::store::TableStore;
use crate::types::TableRef;
use crate::utils::normalize_column_name;
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load a CSV file with every column typed as `String`.
///
/// Tries standard quoting first, then no quoting, then a pass over
/// pre-cleaned file content.
///
/// # Errors
///
/// [`EtlError::SourceUnavailable`] if the file is missing or no loader can parse it.
pub fn load_raw_csv(path: &Path) -> Result<DataFrame> {
    let source_name = path.display().to_string();
    if !path.is_file() {
        return Err(EtlError::source_unavailable(source_name, "file not found"));
    }

    let quoted = CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish());
    match quoted {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    let unquoted = CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(None))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish());
    match unquoted {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Loading without quotes failed: {}", e),
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| EtlError::source_unavailable(source_name.clone(), e))?;
    CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(clean_csv_content(&content)))
        .finish()
        .map_err(|e| EtlError::source_unavailable(source_name, e))
}

/// Collapse doubled quotes and drop blank lines.
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rename every column with [`normalize_column_name`].
///
/// # Errors
///
/// [`EtlError::InvalidSchema`] if two columns normalize to the same name.
pub fn normalize_columns(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| normalize_column_name(name.as_str()))
        .collect();

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(EtlError::InvalidSchema(format!(
                "duplicate column '{}' after normalizing headers",
                name
            )));
        }
    }

    df.set_column_names(names).context("Failed to rename columns")?;
    Ok(())
}

/// Reads the source file and replaces the raw staging table.
#[derive(Debug, Clone)]
pub struct IngestStage {
    source: PathBuf,
    store: TableStore,
    table: TableRef,
}

impl IngestStage {
    pub fn new(source: impl Into<PathBuf>, store: TableStore, table: TableRef) -> Self {
        Self {
            source: source.into(),
            store,
            table,
        }
    }

    pub fn from_config(config: &EtlConfig) -> Self {
        Self::new(
            &config.source_location,
            TableStore::new(&config.store_root),
            config.raw_table.clone(),
        )
    }

    /// Run the stage. Returns the number of rows written.
    pub fn run(&self) -> Result<usize> {
        info!("Starting Ingestion...");
        info!("Loading dataset from: {}", self.source.display());

        let mut df = load_raw_csv(&self.source)?;
        normalize_columns(&mut df)?;
        info!("Read {} rows, {} columns", df.height(), df.width());

        self.store.write_table(&self.table, &mut df)?;
        info!("Ingestion Complete: {} rows written to {}", df.height(), self.table);
        Ok(df.height())
    }
}
