//! Typed parsing of the temporal and numeric sales columns.
//!
//! Parsing never drops rows. A cell that fails to parse becomes null in the
//! converted column and its row is marked in [`ParsedFrame::invalid`]; the
//! matching filter in `filters` does the dropping.

use super::frame::{ParsedFrame, StepFrame};
use crate::error::Result;
use crate::types::{DATE_COLUMNS, NUMERIC_COLUMNS, RejectionReason, UNITS_SOLD};
use crate::utils::{date_to_epoch_days, parse_decimal, parse_sales_date, text_values, whole_number};
use polars::prelude::*;

/// Convert `Order_Date` and `Ship_Date` to the polars `Date` type.
pub fn parse_dates(frame: StepFrame) -> Result<ParsedFrame> {
    let mut frame = frame;
    let mut invalid: Vec<Option<RejectionReason>> = vec![None; frame.height()];

    for column in DATE_COLUMNS {
        let raw = text_values(&frame.df, column)?;
        let mut days: Vec<Option<i32>> = Vec::with_capacity(raw.len());

        for (i, value) in raw.into_iter().enumerate() {
            let parsed = value.as_deref().and_then(parse_sales_date);
            match parsed {
                Some(date) => days.push(Some(date_to_epoch_days(date))),
                None => {
                    days.push(None);
                    if invalid[i].is_none() {
                        invalid[i] = Some(RejectionReason::InvalidDate {
                            column: column.to_string(),
                            value,
                        });
                    }
                }
            }
        }

        let dates = Series::new(column.into(), days).cast(&DataType::Date)?;
        frame.df.replace(column, dates)?;
    }

    Ok(ParsedFrame { frame, invalid })
}

/// Convert the four numeric columns to `Float64`.
///
/// `Units_Sold` is narrowed to `Int64` when every value on a row that
/// survives parsing is whole; a single fractional count keeps it `Float64`.
pub fn parse_numbers(frame: StepFrame) -> Result<ParsedFrame> {
    let mut frame = frame;
    let mut invalid: Vec<Option<RejectionReason>> = vec![None; frame.height()];
    let mut units: Option<Vec<Option<f64>>> = None;

    for column in NUMERIC_COLUMNS {
        let raw = text_values(&frame.df, column)?;
        let values: Vec<Option<f64>> = raw
            .iter()
            .map(|v| v.as_deref().and_then(parse_decimal))
            .collect();
        mark_failures(&mut invalid, column, &raw, values.iter().map(Option::is_none));

        if column == UNITS_SOLD {
            units = Some(values.clone());
        }
        frame.df.replace(column, Series::new(column.into(), values))?;
    }

    if let Some(counts) = units.and_then(|units| whole_counts(&units, &invalid)) {
        frame.df.replace(UNITS_SOLD, Series::new(UNITS_SOLD.into(), counts))?;
    }

    Ok(ParsedFrame { frame, invalid })
}

/// Integer view of `values`, or `None` if a valid row holds a fraction.
/// Rows already marked invalid become null.
fn whole_counts(
    values: &[Option<f64>],
    invalid: &[Option<RejectionReason>],
) -> Option<Vec<Option<i64>>> {
    values
        .iter()
        .zip(invalid)
        .map(|(value, reason)| match (value, reason) {
            (_, Some(_)) | (None, None) => Some(None),
            (Some(v), None) => whole_number(*v).map(Some),
        })
        .collect()
}

fn mark_failures(
    invalid: &mut [Option<RejectionReason>],
    column: &str,
    raw: &[Option<String>],
    failed: impl Iterator<Item = bool>,
) {
    for (i, failed) in failed.enumerate() {
        if failed && invalid[i].is_none() {
            invalid[i] = Some(RejectionReason::InvalidNumber {
                column: column.to_string(),
                value: raw[i].clone(),
            });
        }
    }
}
