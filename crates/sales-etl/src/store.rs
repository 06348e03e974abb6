//! Directory-backed table store.
//!
//! Each table is one Parquet file at `<root>/<namespace>/<name>.parquet`.
//! Writes are full replacements: the new contents go to a hidden temp file in
//! the same directory, which is synced and then renamed over the target. A
//! failed write never leaves a partially written table behind.

use crate::error::{EtlError, Result};
use crate::types::TableRef;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extension of stored tables.
const TABLE_EXTENSION: &str = "parquet";

/// A store of named tables grouped into namespaces.
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the file backing `table`.
    pub fn table_path(&self, table: &TableRef) -> PathBuf {
        self.root
            .join(&table.namespace)
            .join(format!("{}.{}", table.name, TABLE_EXTENSION))
    }

    fn staging_path(&self, table: &TableRef) -> PathBuf {
        self.root.join(&table.namespace).join(format!(
            ".{}.{}.tmp-{}",
            table.name,
            TABLE_EXTENSION,
            std::process::id()
        ))
    }

    pub fn table_exists(&self, table: &TableRef) -> bool {
        self.table_path(table).is_file()
    }

    /// Read a whole table into memory.
    ///
    /// # Errors
    ///
    /// [`EtlError::SourceUnavailable`] if the table does not exist or cannot be decoded.
    pub fn read_table(&self, table: &TableRef) -> Result<DataFrame> {
        let path = self.table_path(table);
        debug!("Reading table {} from {}", table, path.display());

        let file = File::open(&path).map_err(|e| {
            EtlError::source_unavailable(table.to_string(), format!("{} ({})", e, path.display()))
        })?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| EtlError::source_unavailable(table.to_string(), e))
    }

    /// Replace the contents of `table` with `df`.
    ///
    /// The namespace directory is created if needed. On error the previous
    /// contents of the table are left as they were.
    ///
    /// # Errors
    ///
    /// [`EtlError::Persistence`] if any part of the write fails.
    pub fn write_table(&self, table: &TableRef, df: &mut DataFrame) -> Result<()> {
        let target = self.table_path(table);
        let staging = self.staging_path(table);

        let result = self.write_staged(&target, &staging, df);
        if let Err(e) = &result {
            warn!("Write of table {} failed: {}", table, e);
            if staging.exists() {
                let _ = fs::remove_file(&staging);
            }
        }

        result.map_err(|e| EtlError::persistence(table.to_string(), e))?;
        debug!("Wrote {} rows to table {}", df.height(), table);
        Ok(())
    }

    fn write_staged(
        &self,
        target: &Path,
        staging: &Path,
        df: &mut DataFrame,
    ) -> std::result::Result<(), String> {
        let dir = target
            .parent()
            .ok_or_else(|| format!("no parent directory for {}", target.display()))?;
        fs::create_dir_all(dir).map_err(|e| format!("create {}: {}", dir.display(), e))?;

        let mut file =
            File::create(staging).map_err(|e| format!("create {}: {}", staging.display(), e))?;
        ParquetWriter::new(&mut file)
            .finish(df)
            .map_err(|e| format!("encode parquet: {}", e))?;
        file.sync_all()
            .map_err(|e| format!("sync {}: {}", staging.display(), e))?;
        drop(file);

        fs::rename(staging, target).map_err(|e| format!("rename into place: {}", e))
    }

    /// Remove a table. Returns `false` if it did not exist.
    pub fn drop_table(&self, table: &TableRef) -> Result<bool> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| EtlError::persistence(table.to_string(), e))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_df() -> DataFrame {
        df!(
            "Country" => &["Chad", "Peru"],
            "Units_Sold" => &[10i64, 20],
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::production("sales_data");

        let mut df = sample_df();
        store.write_table(&table, &mut df).unwrap();

        assert!(store.table_exists(&table));
        let loaded = store.read_table(&table).unwrap();
        assert!(loaded.equals(&df));
    }

    #[test]
    fn test_write_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::raw("raw_sales");

        store.write_table(&table, &mut sample_df()).unwrap();
        let mut smaller = df!("Country" => &["Togo"]).unwrap();
        store.write_table(&table, &mut smaller).unwrap();

        let loaded = store.read_table(&table).unwrap();
        assert_eq!(loaded.shape(), (1, 1));
    }

    #[test]
    fn test_no_staging_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::production("sales_data");
        store.write_table(&table, &mut sample_df()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("production"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_read_missing_table_is_source_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        let err = store.read_table(&TableRef::raw("nope")).unwrap_err();
        assert!(matches!(err, EtlError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_failed_write_keeps_previous_table() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::production("sales_data");
        store.write_table(&table, &mut sample_df()).unwrap();

        // A directory squatting on the staging path makes the write fail.
        fs::create_dir_all(store.staging_path(&table)).unwrap();
        let err = store
            .write_table(&table, &mut df!("Country" => &["Togo"]).unwrap())
            .unwrap_err();
        assert!(matches!(err, EtlError::Persistence { .. }));

        let loaded = store.read_table(&table).unwrap();
        assert_eq!(loaded.height(), 2);
    }

    #[test]
    fn test_drop_table() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::raw("raw_sales");
        assert!(!store.drop_table(&table).unwrap());
        store.write_table(&table, &mut sample_df()).unwrap();
        assert!(store.drop_table(&table).unwrap());
        assert!(!store.table_exists(&table));
    }
}
