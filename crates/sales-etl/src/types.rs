//! Core data types shared by the ETL stages.
//!
//! This module contains the column vocabulary of a sales record, the table
//! addressing type used by the store, and the diagnostics produced while
//! cleaning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Column names
// ============================================================================

pub const ITEM_TYPE: &str = "Item_Type";
pub const COUNTRY: &str = "Country";
pub const SALES_CHANNEL: &str = "Sales_Channel";
pub const ORDER_DATE: &str = "Order_Date";
pub const SHIP_DATE: &str = "Ship_Date";
pub const UNITS_SOLD: &str = "Units_Sold";
pub const UNIT_PRICE: &str = "Unit_Price";
pub const TOTAL_REVENUE: &str = "Total_Revenue";
pub const TOTAL_PROFIT: &str = "Total_Profit";

pub const ORDER_YEAR: &str = "Order_Year";
pub const DAYS_TO_SHIP: &str = "Days_to_Ship";
pub const DELIVERY_SPEED: &str = "Delivery_Speed";

/// Temporal columns, in the order they are parsed.
pub const DATE_COLUMNS: [&str; 2] = [ORDER_DATE, SHIP_DATE];

/// Numeric columns, in the order they are parsed.
pub const NUMERIC_COLUMNS: [&str; 4] = [UNITS_SOLD, UNIT_PRICE, TOTAL_REVENUE, TOTAL_PROFIT];

/// Every column a raw dataset must carry. Extra columns pass through.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    ITEM_TYPE,
    COUNTRY,
    SALES_CHANNEL,
    ORDER_DATE,
    SHIP_DATE,
    UNITS_SOLD,
    UNIT_PRICE,
    TOTAL_REVENUE,
    TOTAL_PROFIT,
];

// ============================================================================
// Table addressing
// ============================================================================

/// Namespace holding ingested, uncleaned tables.
pub const RAW_NAMESPACE: &str = "public";

/// Namespace holding curated tables consumed by Publish.
pub const PRODUCTION_NAMESPACE: &str = "production";

/// A named table inside a namespace of the [`TableStore`](crate::store::TableStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub namespace: String,
    pub name: String,
}

impl TableRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// A table in the raw namespace.
    pub fn raw(name: impl Into<String>) -> Self {
        Self::new(RAW_NAMESPACE, name)
    }

    /// A table in the production namespace.
    pub fn production(name: impl Into<String>) -> Self {
        Self::new(PRODUCTION_NAMESPACE, name)
    }

    /// Parse `namespace.table`, or a bare `table` placed in `default_namespace`.
    ///
    /// Returns `None` for empty parts or more than one dot.
    pub fn parse(identifier: &str, default_namespace: &str) -> Option<Self> {
        let identifier = identifier.trim();
        let mut parts = identifier.split('.');
        let first = parts.next()?;
        let second = parts.next();
        if parts.next().is_some() {
            return None;
        }

        let (namespace, name) = match second {
            Some(name) => (first, name),
            None => (default_namespace, first),
        };

        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

// ============================================================================
// Derived attributes
// ============================================================================

/// Shipping lead-time bucket derived from `Days_to_Ship`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliverySpeed {
    Fast,
    Normal,
    Slow,
}

impl DeliverySpeed {
    /// Upper bound (inclusive) of the `Fast` bucket, in days.
    pub const FAST_MAX_DAYS: i64 = 3;
    /// Upper bound (inclusive) of the `Normal` bucket, in days.
    pub const NORMAL_MAX_DAYS: i64 = 7;

    /// Bucket a shipping lead time. Boundary values belong to the lower bucket.
    pub fn from_days(days: i64) -> Self {
        if days <= Self::FAST_MAX_DAYS {
            Self::Fast
        } else if days <= Self::NORMAL_MAX_DAYS {
            Self::Normal
        } else {
            Self::Slow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "Fast",
            Self::Normal => "Normal",
            Self::Slow => "Slow",
        }
    }
}

impl fmt::Display for DeliverySpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Cleaning diagnostics
// ============================================================================

/// Why a raw row did not make it into the production dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Identical across every column to an earlier row.
    Duplicate { first_row: usize },
    /// A date column failed to parse.
    InvalidDate {
        column: String,
        value: Option<String>,
    },
    /// `Ship_Date` precedes `Order_Date`.
    ShipBeforeOrder,
    /// A numeric column failed to parse.
    InvalidNumber {
        column: String,
        value: Option<String>,
    },
}

impl RejectionReason {
    /// Short, stable name of the reason kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Duplicate { .. } => "duplicate",
            Self::InvalidDate { .. } => "invalid_date",
            Self::ShipBeforeOrder => "ship_before_order",
            Self::InvalidNumber { .. } => "invalid_number",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { first_row } => write!(f, "duplicate of row {}", first_row),
            Self::InvalidDate { column, value } => {
                write!(f, "invalid date in {}: {:?}", column, value.as_deref().unwrap_or(""))
            }
            Self::ShipBeforeOrder => f.write_str("ship date before order date"),
            Self::InvalidNumber { column, value } => {
                write!(f, "non-numeric {}: {:?}", column, value.as_deref().unwrap_or(""))
            }
        }
    }
}

/// A dropped raw row. `row` is the 0-based position in the raw dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row: usize,
    pub reason: RejectionReason,
}

impl RejectedRow {
    pub fn new(row: usize, reason: RejectionReason) -> Self {
        Self { row, reason }
    }
}

/// Count rejections per reason kind.
pub fn rejection_counts(rejected: &[RejectedRow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for rejection in rejected {
        *counts.entry(rejection.reason.kind().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Surviving row counts after each cleaning step.
///
/// Each count is at most the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub raw: usize,
    pub after_dedup: usize,
    pub after_date_filter: usize,
    pub after_chronology_filter: usize,
    pub after_numeric_filter: usize,
}

impl RowCounts {
    /// Rows written to production.
    pub fn survivors(&self) -> usize {
        self.after_numeric_filter
    }

    pub fn dropped(&self) -> usize {
        self.raw.saturating_sub(self.survivors())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_speed_boundaries() {
        assert_eq!(DeliverySpeed::from_days(0), DeliverySpeed::Fast);
        assert_eq!(DeliverySpeed::from_days(3), DeliverySpeed::Fast);
        assert_eq!(DeliverySpeed::from_days(4), DeliverySpeed::Normal);
        assert_eq!(DeliverySpeed::from_days(7), DeliverySpeed::Normal);
        assert_eq!(DeliverySpeed::from_days(8), DeliverySpeed::Slow);
        assert_eq!(DeliverySpeed::from_days(50), DeliverySpeed::Slow);
    }

    #[test]
    fn test_table_ref_parse() {
        assert_eq!(
            TableRef::parse("production.sales_data", "public"),
            Some(TableRef::production("sales_data"))
        );
        assert_eq!(
            TableRef::parse("sales_data", PRODUCTION_NAMESPACE),
            Some(TableRef::production("sales_data"))
        );
        assert_eq!(TableRef::parse("a.b.c", "public"), None);
        assert_eq!(TableRef::parse(".table", "public"), None);
        assert_eq!(TableRef::parse("", "public"), None);
    }

    #[test]
    fn test_table_ref_display() {
        assert_eq!(TableRef::raw("raw_sales").to_string(), "public.raw_sales");
    }

    #[test]
    fn test_rejection_counts() {
        let rejected = vec![
            RejectedRow::new(1, RejectionReason::Duplicate { first_row: 0 }),
            RejectedRow::new(2, RejectionReason::ShipBeforeOrder),
            RejectedRow::new(3, RejectionReason::Duplicate { first_row: 0 }),
        ];
        let counts = rejection_counts(&rejected);
        assert_eq!(counts.get("duplicate"), Some(&2));
        assert_eq!(counts.get("ship_before_order"), Some(&1));
        assert_eq!(counts.get("invalid_date"), None);
    }

    #[test]
    fn test_rejection_reason_serializes_with_kind_tag() {
        let reason = RejectionReason::InvalidNumber {
            column: TOTAL_REVENUE.to_string(),
            value: Some("N/A".to_string()),
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "invalid_number");
        assert_eq!(json["column"], "Total_Revenue");
    }
}
