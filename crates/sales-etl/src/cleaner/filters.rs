//! Row filters applied after parsing.

use super::frame::{ParsedFrame, StepFrame, StepOutput};
use crate::error::Result;
use crate::types::{ORDER_DATE, RejectionReason, SHIP_DATE};
use crate::utils::epoch_day_values;

/// Drop every row that failed to parse.
pub fn drop_unparsed(parsed: ParsedFrame) -> Result<StepOutput> {
    parsed.frame.reject(parsed.invalid)
}

/// Drop rows shipped before they were ordered. Same-day shipping is kept.
///
/// Expects both date columns to be parsed and null-free.
pub fn drop_ship_before_order(frame: StepFrame) -> Result<StepOutput> {
    let order = epoch_day_values(&frame.df, ORDER_DATE)?;
    let ship = epoch_day_values(&frame.df, SHIP_DATE)?;

    let reasons = order
        .iter()
        .zip(&ship)
        .map(|(order, ship)| match (order, ship) {
            (Some(order), Some(ship)) if ship >= order => None,
            _ => Some(RejectionReason::ShipBeforeOrder),
        })
        .collect();

    frame.reject(reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::converters::parse_dates;
    use polars::prelude::*;

    #[test]
    fn test_chronology_filter() {
        let df = df!(
            ORDER_DATE => &["2020-01-10", "2020-01-10", "2020-01-10"],
            SHIP_DATE => &["2020-01-05", "2020-01-10", "2020-01-11"],
        )
        .unwrap();
        let parsed = parse_dates(StepFrame::new(df)).unwrap();
        let valid = drop_unparsed(parsed).unwrap();
        assert!(valid.rejected.is_empty());

        let out = drop_ship_before_order(valid.frame).unwrap();
        assert_eq!(out.frame.source_rows, vec![1, 2]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].row, 0);
        assert_eq!(out.rejected[0].reason, RejectionReason::ShipBeforeOrder);
    }

    #[test]
    fn test_drop_unparsed() {
        let df = df!(
            ORDER_DATE => &["2020-01-10", "??"],
            SHIP_DATE => &["2020-01-12", "2020-01-12"],
        )
        .unwrap();
        let out = drop_unparsed(parse_dates(StepFrame::new(df)).unwrap()).unwrap();
        assert_eq!(out.frame.height(), 1);
        assert_eq!(out.rejected[0].row, 1);
        assert_eq!(out.rejected[0].reason.kind(), "invalid_date");
    }
}
