//! Data cleansing for raw sales records.
//!
//! Cleaning is a fixed sequence of pure steps, each operating on the
//! survivors of the previous one:
//!
//! 1. Exact-duplicate removal (first occurrence wins)
//! 2. Date parsing (`Order_Date`, `Ship_Date`)
//! 3. Date-validity filter
//! 4. Chronology filter (`Ship_Date >= Order_Date`)
//! 5. Numeric parsing (`Units_Sold`, `Unit_Price`, `Total_Revenue`, `Total_Profit`)
//! 6. Numeric-validity filter
//!
//! Every dropped row is reported as a [`RejectedRow`] with its raw position.

mod converters;
mod dedup;
mod filters;
mod frame;

pub use converters::{parse_dates, parse_numbers};
pub use dedup::remove_exact_duplicates;
pub use filters::{drop_ship_before_order, drop_unparsed};
pub use frame::{ParsedFrame, StepFrame, StepOutput};

use crate::error::Result;
use crate::types::{REQUIRED_COLUMNS, RejectedRow, RowCounts};
use crate::utils::ensure_columns;
use polars::prelude::*;
use tracing::{debug, info};

/// Survivors of the cleaning steps plus everything that was dropped.
#[derive(Debug, Clone)]
pub struct CleanOutput {
    pub frame: StepFrame,
    pub counts: RowCounts,
    pub rejected: Vec<RejectedRow>,
}

/// Runs the cleaning steps in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SalesCleaner;

impl SalesCleaner {
    /// Clean a raw dataset.
    ///
    /// # Errors
    ///
    /// [`EtlError::InvalidSchema`](crate::error::EtlError::InvalidSchema) if a
    /// required column is missing. Bad rows are never errors.
    pub fn clean(&self, df: DataFrame) -> Result<CleanOutput> {
        ensure_columns(&df, &REQUIRED_COLUMNS)?;

        info!("Cleaning data...");
        let mut counts = RowCounts {
            raw: df.height(),
            ..RowCounts::default()
        };
        let mut rejected = Vec::new();

        let step = remove_exact_duplicates(StepFrame::new(df))?;
        counts.after_dedup = step.frame.height();
        rejected.extend(step.rejected);

        let step = drop_unparsed(parse_dates(step.frame)?)?;
        counts.after_date_filter = step.frame.height();
        rejected.extend(step.rejected);

        let step = drop_ship_before_order(step.frame)?;
        counts.after_chronology_filter = step.frame.height();
        rejected.extend(step.rejected);

        let step = drop_unparsed(parse_numbers(step.frame)?)?;
        counts.after_numeric_filter = step.frame.height();
        rejected.extend(step.rejected);

        debug!("Row counts: {:?}", counts);
        info!(
            "Cleaning kept {} of {} rows ({} duplicates, {} bad dates, {} shipped before ordered, {} bad numbers)",
            counts.after_numeric_filter,
            counts.raw,
            counts.raw - counts.after_dedup,
            counts.after_dedup - counts.after_date_filter,
            counts.after_date_filter - counts.after_chronology_filter,
            counts.after_chronology_filter - counts.after_numeric_filter,
        );

        Ok(CleanOutput {
            frame: step.frame,
            counts,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::types::*;

    fn raw_df() -> DataFrame {
        df!(
            ITEM_TYPE => &["Cereal", "Snacks", "Fruits", "Fruits", "Meat"],
            COUNTRY => &["Chad", "Peru", "Togo", "Togo", "Fiji"],
            SALES_CHANNEL => &["Online", "Offline", "Online", "Online", "Offline"],
            ORDER_DATE => &["2020-01-10", "2020-01-01", "2020-02-01", "2020-02-01", "bad"],
            SHIP_DATE => &["2020-01-05", "2020-01-03", "2020-02-03", "2020-02-03", "2020-02-03"],
            UNITS_SOLD => &["1", "2", "3", "3", "4"],
            UNIT_PRICE => &["1.0", "2.0", "3.0", "3.0", "4.0"],
            TOTAL_REVENUE => &["1.0", "N/A", "9.0", "9.0", "16.0"],
            TOTAL_PROFIT => &["0.5", "1.0", "1.5", "1.5", "2.0"],
        )
        .unwrap()
    }

    #[test]
    fn test_clean_counts_are_monotonic() {
        let out = SalesCleaner.clean(raw_df()).unwrap();
        let c = out.counts;

        assert_eq!(c.raw, 5);
        assert_eq!(c.after_dedup, 4);
        assert_eq!(c.after_date_filter, 3);
        assert_eq!(c.after_chronology_filter, 2);
        assert_eq!(c.after_numeric_filter, 1);
        assert_eq!(out.frame.source_rows, vec![2]);
        assert_eq!(out.rejected.len(), c.dropped());
    }

    #[test]
    fn test_rejection_reasons_in_step_order() {
        let out = SalesCleaner.clean(raw_df()).unwrap();
        let kinds: Vec<(usize, &str)> = out
            .rejected
            .iter()
            .map(|r| (r.row, r.reason.kind()))
            .collect();

        assert_eq!(
            kinds,
            vec![
                (3, "duplicate"),
                (4, "invalid_date"),
                (0, "ship_before_order"),
                (1, "invalid_number"),
            ]
        );
    }

    #[test]
    fn test_extra_columns_pass_through() {
        let mut df = raw_df();
        df.with_column(Series::new("Region".into(), &["A", "B", "C", "C", "D"]))
            .unwrap();

        let out = SalesCleaner.clean(df).unwrap();
        let region = out.frame.df.column("Region").unwrap();
        assert_eq!(region.dtype(), &DataType::String);
        assert_eq!(region.get(0).unwrap(), AnyValue::String("C"));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = raw_df().drop(SHIP_DATE).unwrap();
        let err = SalesCleaner.clean(df).unwrap_err();
        assert!(matches!(err, EtlError::InvalidSchema(msg) if msg.contains(SHIP_DATE)));
    }
}
