//! Shared utilities for the ETL stages.
//!
//! Value parsing, column-name normalization, and small conversions between
//! chrono dates and the day counts polars stores for its `Date` type.

use crate::error::{EtlError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

// =============================================================================
// Column Names
// =============================================================================

/// Normalize a source column header: trim it, then replace every run of
/// whitespace with a single underscore.
///
/// ```rust,ignore
/// assert_eq!(normalize_column_name(" Order Date "), "Order_Date");
/// ```
pub fn normalize_column_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Names of `required` columns that `df` does not have.
pub fn missing_columns(df: &DataFrame, required: &[&str]) -> Vec<String> {
    let present: Vec<&str> = df.get_column_names().into_iter().map(|s| s.as_str()).collect();
    required
        .iter()
        .filter(|name| !present.contains(*name))
        .map(|name| name.to_string())
        .collect()
}

/// Fail with [`EtlError::InvalidSchema`] if any `required` column is absent.
pub fn ensure_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let missing = missing_columns(df, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EtlError::InvalidSchema(format!(
            "missing required columns: {}",
            missing.join(", ")
        )))
    }
}

// =============================================================================
// Date Parsing
// =============================================================================

/// Date-only layouts accepted in the temporal columns, tried in order.
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Date-time layouts accepted in the temporal columns; the time is discarded.
pub const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Parse a calendar date from a raw cell.
///
/// Returns `None` for empty, malformed, or impossible dates (e.g. `2021-02-30`).
pub fn parse_sales_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// `num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Inverse of [`date_to_epoch_days`].
pub fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

// =============================================================================
// Numeric Parsing
// =============================================================================

/// Parse a decimal number. Surrounding whitespace is ignored; anything else
/// that is not a finite number (including `NaN` and `inf`) is rejected.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integral value of `v` if it has no fractional part and fits in an `i64`.
pub fn whole_number(v: f64) -> Option<i64> {
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

// =============================================================================
// Column Access
// =============================================================================

/// Read a column as text, one entry per row. Non-string columns are cast.
pub fn text_values(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(column)?.as_materialized_series().cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Read a numeric column as `f64`, one entry per row.
pub fn float_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(column)?.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Read a `Date` column as days since the Unix epoch.
pub fn epoch_day_values(df: &DataFrame, column: &str) -> Result<Vec<Option<i32>>> {
    let series = df.column(column)?.as_materialized_series().cast(&DataType::Int32)?;
    Ok(series.i32()?.into_iter().collect())
}

// =============================================================================
// Formatting
// =============================================================================

/// Format with two decimals and comma thousands separators, e.g. `1,234,567.89`.
pub fn format_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
