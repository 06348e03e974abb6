//! Publish stage: production table in, spreadsheet out.
//!
//! The production table is stringified into a grid (header row first) and
//! handed to a [`SheetSink`], which clears the target and writes the grid.
//!
//! # Implementing a New Sink
//!
//! 1. Create a new file in `src/publish/`
//! 2. Implement [`SheetSink`] for your sink struct
//! 3. Export it here and add a [`PublishTarget`] variant for it

mod csv_sheet;
#[cfg(feature = "sheets")]
mod google;

pub use csv_sheet::CsvSheet;
#[cfg(feature = "sheets")]
pub use google::{GOOGLE_SHEETS_API_BASE, GoogleSheet};

use crate::config::{EtlConfig, PublishTarget};
use crate::error::{EtlError, Result};
use crate::store::TableStore;
use crate::types::TableRef;
use crate::utils::{epoch_day_values, epoch_days_to_date, text_values};
use polars::prelude::*;
use tracing::{debug, info};

/// A spreadsheet-like destination that is fully replaced on every publish.
///
/// Implementations must be `Send + Sync` so a stage can be handed to another
/// thread.
pub trait SheetSink: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Remove all existing content. A sink whose `update` already replaces
    /// everything may leave this empty.
    fn clear(&self) -> Result<()>;

    /// Write `values` starting at the top-left cell. The first row is the header.
    fn update(&self, values: &[Vec<String>]) -> Result<()>;
}

/// Render a frame as rows of text, header first.
///
/// `Date` columns render as `YYYY-MM-DD` and nulls as empty strings. At most
/// `row_limit` data rows are included.
pub fn frame_to_grid(df: &DataFrame, row_limit: Option<usize>) -> Result<Vec<Vec<String>>> {
    let height = row_limit.map_or(df.height(), |limit| limit.min(df.height()));
    let df = df.head(Some(height));

    let mut columns: Vec<Vec<String>> = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let name = column.name().as_str();
        let cells = if column.dtype() == &DataType::Date {
            epoch_day_values(&df, name)?
                .into_iter()
                .map(|days| {
                    days.and_then(epoch_days_to_date)
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default()
                })
                .collect()
        } else {
            text_values(&df, name)?
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect()
        };
        columns.push(cells);
    }

    let mut grid = Vec::with_capacity(height + 1);
    grid.push(
        df.get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect(),
    );
    for row in 0..height {
        grid.push(columns.iter().map(|cells| cells[row].clone()).collect());
    }
    Ok(grid)
}

/// Build the sink described by a [`PublishTarget`].
///
/// # Errors
///
/// [`EtlError::InvalidConfig`] for a Google Sheets target in a build without
/// the `sheets` feature; credential errors from [`GoogleSheet`] otherwise.
pub fn sink_for_target(target: &PublishTarget) -> Result<Box<dyn SheetSink>> {
    match target {
        PublishTarget::Csv { path } => Ok(Box::new(CsvSheet::new(path))),
        #[cfg(feature = "sheets")]
        PublishTarget::GoogleSheet {
            spreadsheet_id,
            worksheet,
            credentials_path,
        } => Ok(Box::new(GoogleSheet::from_credentials_file(
            spreadsheet_id,
            worksheet,
            credentials_path,
        )?)),
        #[cfg(not(feature = "sheets"))]
        PublishTarget::GoogleSheet { .. } => Err(EtlError::InvalidConfig(
            "Google Sheets publishing requires the 'sheets' feature".to_string(),
        )),
    }
}

/// Reads the production table and replaces the spreadsheet contents.
pub struct PublishStage {
    store: TableStore,
    source: TableRef,
    sink: Box<dyn SheetSink>,
    row_limit: Option<usize>,
}

static_assertions::assert_impl_all!(PublishStage: Send);

impl PublishStage {
    pub fn new(store: TableStore, source: TableRef, sink: Box<dyn SheetSink>) -> Self {
        Self {
            store,
            source,
            sink,
            row_limit: None,
        }
    }

    /// Upload at most `limit` data rows.
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    pub fn from_config(config: &EtlConfig) -> Result<Self> {
        let sink = sink_for_target(&config.publish_target)?;
        Ok(Self::new(
            TableStore::new(&config.store_root),
            config.destination.clone(),
            sink,
        )
        .with_row_limit(config.publish_row_limit))
    }

    /// Run the stage. Returns the number of data rows uploaded.
    ///
    /// # Errors
    ///
    /// - [`EtlError::SourceUnavailable`] if the production table is missing
    /// - [`EtlError::EmptyInput`] if it has no rows
    /// - [`EtlError::PublishFailed`] if the sink rejects the upload
    pub fn run(&self) -> Result<usize> {
        info!("Starting Publish...");

        let df = self.store.read_table(&self.source)?;
        if df.height() == 0 {
            return Err(EtlError::EmptyInput(self.source.to_string()));
        }

        let grid = frame_to_grid(&df, self.row_limit)?;
        let rows = grid.len() - 1;
        debug!("Prepared {} rows x {} columns for {}", rows, df.width(), self.sink.name());

        self.sink.clear().map_err(|e| self.publish_failed(e))?;
        self.sink.update(&grid).map_err(|e| self.publish_failed(e))?;

        info!("Publish Complete: {} rows sent to {}", rows, self.sink.name());
        Ok(rows)
    }

    fn publish_failed(&self, err: EtlError) -> EtlError {
        match err {
            EtlError::PublishFailed { .. } => err,
            other => EtlError::PublishFailed {
                sink: self.sink.name().to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ORDER_DATE, UNITS_SOLD};
    use crate::utils::date_to_epoch_days;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
        grid: Mutex<Vec<Vec<String>>>,
        fail_update: bool,
    }

    impl SheetSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn clear(&self) -> Result<()> {
            self.calls.lock().unwrap().push("clear".into());
            Ok(())
        }

        fn update(&self, values: &[Vec<String>]) -> Result<()> {
            self.calls.lock().unwrap().push("update".into());
            if self.fail_update {
                return Err(EtlError::Io(std::io::Error::other("quota exceeded")));
            }
            *self.grid.lock().unwrap() = values.to_vec();
            Ok(())
        }
    }

    impl SheetSink for Arc<RecordingSink> {
        fn name(&self) -> &str {
            self.as_ref().name()
        }

        fn clear(&self) -> Result<()> {
            self.as_ref().clear()
        }

        fn update(&self, values: &[Vec<String>]) -> Result<()> {
            self.as_ref().update(values)
        }
    }

    fn dated_frame() -> DataFrame {
        let day = |y, m, d| date_to_epoch_days(NaiveDate::from_ymd_opt(y, m, d).unwrap());
        let dates = Series::new(ORDER_DATE.into(), vec![Some(day(2020, 1, 5)), None, Some(day(2021, 12, 31))])
            .cast(&DataType::Date)
            .unwrap();
        let units = Series::new(UNITS_SOLD.into(), vec![Some(3i64), Some(4), None]);
        DataFrame::new(vec![dates.into(), units.into()]).unwrap()
    }

    #[test]
    fn test_frame_to_grid() {
        let grid = frame_to_grid(&dated_frame(), None).unwrap();
        assert_eq!(
            grid,
            vec![
                vec![ORDER_DATE.to_string(), UNITS_SOLD.to_string()],
                vec!["2020-01-05".to_string(), "3".to_string()],
                vec!["".to_string(), "4".to_string()],
                vec!["2021-12-31".to_string(), "".to_string()],
            ]
        );
    }

    #[test]
    fn test_frame_to_grid_row_limit() {
        let grid = frame_to_grid(&dated_frame(), Some(1)).unwrap();
        assert_eq!(grid.len(), 2);

        let grid = frame_to_grid(&dated_frame(), Some(100)).unwrap();
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_stage_clears_then_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::production("sales_data");
        store.write_table(&table, &mut dated_frame()).unwrap();

        let sink = Arc::new(RecordingSink::default());

        let rows = PublishStage::new(store, table, Box::new(sink.clone()))
            .run()
            .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(*sink.calls.lock().unwrap(), vec!["clear", "update"]);
        assert_eq!(sink.grid.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_empty_table_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::production("sales_data");
        let mut empty = dated_frame().head(Some(0));
        store.write_table(&table, &mut empty).unwrap();

        let err = PublishStage::new(store, table, Box::new(RecordingSink::default()))
            .run()
            .unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_INPUT");
    }

    #[test]
    fn test_sink_failure_is_publish_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let table = TableRef::production("sales_data");
        store.write_table(&table, &mut dated_frame()).unwrap();

        let sink = RecordingSink {
            fail_update: true,
            ..RecordingSink::default()
        };
        let err = PublishStage::new(store, table, Box::new(sink)).run().unwrap_err();
        assert!(matches!(err, EtlError::PublishFailed { ref sink, .. } if sink == "recording"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_missing_table_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = PublishStage::new(
            TableStore::new(dir.path()),
            TableRef::production("absent"),
            Box::new(RecordingSink::default()),
        )
        .run()
        .unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_UNAVAILABLE");
    }
}
