//! Derived columns added to cleaned sales records.
//!
//! - `Order_Year`: calendar year of `Order_Date` (Int32)
//! - `Days_to_Ship`: `Ship_Date - Order_Date` in whole days (Int64)
//! - `Delivery_Speed`: [`DeliverySpeed`] bucket of `Days_to_Ship` (String)

use crate::error::Result;
use crate::types::{DAYS_TO_SHIP, DELIVERY_SPEED, DeliverySpeed, ORDER_DATE, ORDER_YEAR, SHIP_DATE};
use crate::utils::{epoch_day_values, epoch_days_to_date};
use chrono::Datelike;
use polars::prelude::*;
use tracing::info;

/// Append the three derived columns to a cleaned frame.
///
/// Expects parsed, null-free `Order_Date` and `Ship_Date` columns; a null in
/// either yields nulls in every derived column for that row.
pub fn add_derived_columns(df: &mut DataFrame) -> Result<()> {
    info!("Creating derived features...");

    let order = epoch_day_values(df, ORDER_DATE)?;
    let ship = epoch_day_values(df, SHIP_DATE)?;

    let years: Vec<Option<i32>> = order
        .iter()
        .map(|days| days.and_then(epoch_days_to_date).map(|d| d.year()))
        .collect();

    let lead_times: Vec<Option<i64>> = order
        .iter()
        .zip(&ship)
        .map(|(order, ship)| match (order, ship) {
            (Some(order), Some(ship)) => Some(i64::from(*ship) - i64::from(*order)),
            _ => None,
        })
        .collect();

    let speeds: Vec<Option<&str>> = lead_times
        .iter()
        .map(|days| days.map(|d| DeliverySpeed::from_days(d).as_str()))
        .collect();

    df.with_column(Series::new(ORDER_YEAR.into(), years))?;
    df.with_column(Series::new(DAYS_TO_SHIP.into(), lead_times))?;
    df.with_column(Series::new(DELIVERY_SPEED.into(), speeds))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::{StepFrame, parse_dates};

    fn derive(order: &[&str], ship: &[&str]) -> DataFrame {
        let df = df!(ORDER_DATE => order, SHIP_DATE => ship).unwrap();
        let mut df = parse_dates(StepFrame::new(df)).unwrap().frame.df;
        add_derived_columns(&mut df).unwrap();
        df
    }

    fn speeds(df: &DataFrame) -> Vec<String> {
        df.column(DELIVERY_SPEED)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_derived_columns_appended_in_order() {
        let df = derive(&["2020-01-10"], &["2020-01-12"]);
        let names: Vec<&str> = df.get_column_names().into_iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec![ORDER_DATE, SHIP_DATE, ORDER_YEAR, DAYS_TO_SHIP, DELIVERY_SPEED]);
    }

    #[test]
    fn test_year_and_lead_time() {
        let df = derive(&["2019-12-30"], &["2020-01-02"]);
        let year = df.column(ORDER_YEAR).unwrap().as_materialized_series().i32().unwrap().get(0);
        let days = df.column(DAYS_TO_SHIP).unwrap().as_materialized_series().i64().unwrap().get(0);
        assert_eq!(year, Some(2019));
        assert_eq!(days, Some(3));
    }

    #[test]
    fn test_delivery_speed_boundaries() {
        let df = derive(
            &["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01"],
            &["2020-01-01", "2020-01-04", "2020-01-05", "2020-01-08", "2020-01-09"],
        );
        let days: Vec<Option<i64>> = df.column(DAYS_TO_SHIP).unwrap().as_materialized_series().i64().unwrap().into_iter().collect();
        assert_eq!(days, vec![Some(0), Some(3), Some(4), Some(7), Some(8)]);
        assert_eq!(speeds(&df), vec!["Fast", "Fast", "Normal", "Normal", "Slow"]);
    }

    #[test]
    fn test_lead_time_across_leap_day() {
        let df = derive(&["2020-02-27"], &["2020-03-02"]);
        let days = df.column(DAYS_TO_SHIP).unwrap().as_materialized_series().i64().unwrap().get(0);
        assert_eq!(days, Some(4));
        assert_eq!(speeds(&df), vec!["Normal"]);
    }
}
