//! Local CSV file standing in for a spreadsheet.

use super::SheetSink;
use crate::error::{EtlError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes the published grid to a CSV file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct CsvSheet {
    path: PathBuf,
    name: String,
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("csv:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sheet.csv".to_string());
        self.path
            .with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()))
    }

    /// Write `df` to the staging file, then rename it over the target.
    fn replace_with(&self, df: &mut DataFrame) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let staging = self.staging_path();
        let written = File::create(&staging)
            .map_err(EtlError::from)
            .and_then(|mut file| {
                CsvWriter::new(&mut file).include_header(true).finish(df)?;
                file.sync_all()?;
                Ok(())
            })
            .and_then(|()| fs::rename(&staging, &self.path).map_err(EtlError::from));

        if written.is_err() && staging.exists() {
            let _ = fs::remove_file(&staging);
        }
        written
    }
}

/// Turn a header-first grid into a frame of string columns. Empty cells
/// become nulls so the writer leaves the field bare.
fn grid_to_frame(values: &[Vec<String>]) -> Result<DataFrame> {
    let Some((header, rows)) = values.split_first() else {
        return Ok(DataFrame::empty());
    };

    let columns = header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let cells: Vec<Option<&str>> = rows
                .iter()
                .map(|row| row.get(i).map(String::as_str).filter(|c| !c.is_empty()))
                .collect();
            Column::new(name.as_str().into(), cells)
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

impl SheetSink for CsvSheet {
    fn name(&self) -> &str {
        &self.name
    }

    /// No-op: [`update`](SheetSink::update) swaps the whole file in one
    /// rename, so the previous sheet stays readable until the new one lands.
    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn update(&self, values: &[Vec<String>]) -> Result<()> {
        let mut df = grid_to_frame(values)?;
        self.replace_with(&mut df)?;
        debug!("Wrote {} rows to {}", df.height(), self.path.display());
        Ok(())
    }
}
