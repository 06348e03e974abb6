//! Summary KPIs computed over the production dataset.
//!
//! KPIs are read-only: they are logged for the operator and included in the
//! run report, never written back into the dataset.
//!
//! Ties in the "top" groupings resolve to the lexicographically smallest key.

use crate::error::Result;
use crate::types::{COUNTRY, DAYS_TO_SHIP, ITEM_TYPE, SALES_CHANNEL, TOTAL_PROFIT, TOTAL_REVENUE};
use crate::utils::{float_values, format_thousands, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// The winning group of a "top" KPI and its aggregate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupLeader {
    pub key: String,
    pub value: f64,
}

/// KPIs reported after cleaning and enrichment.
///
/// Every field is `None` when no row contributes to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    /// Item type with the largest total revenue.
    pub top_item_type_by_revenue: Option<GroupLeader>,
    /// Country with the largest total revenue.
    pub top_country_by_revenue: Option<GroupLeader>,
    /// Sales channel with the largest total profit.
    pub top_channel_by_profit: Option<GroupLeader>,
    /// Country with the largest mean revenue per order.
    pub top_country_by_mean_revenue: Option<GroupLeader>,
    /// Pearson correlation between `Days_to_Ship` and `Total_Revenue`.
    pub days_to_ship_revenue_correlation: Option<f64>,
}

impl KpiReport {
    /// Compute all KPIs from an enriched frame.
    pub fn compute(df: &DataFrame) -> Result<Self> {
        let revenue = float_values(df, TOTAL_REVENUE)?;
        let profit = float_values(df, TOTAL_PROFIT)?;
        let days = float_values(df, DAYS_TO_SHIP)?;
        let item_types = text_values(df, ITEM_TYPE)?;
        let countries = text_values(df, COUNTRY)?;
        let channels = text_values(df, SALES_CHANNEL)?;

        Ok(Self {
            top_item_type_by_revenue: top_by_sum(&item_types, &revenue),
            top_country_by_revenue: top_by_sum(&countries, &revenue),
            top_channel_by_profit: top_by_sum(&channels, &profit),
            top_country_by_mean_revenue: top_by_mean(&countries, &revenue),
            days_to_ship_revenue_correlation: pearson(&days, &revenue),
        })
    }

    /// Emit the KPI summary as log lines.
    pub fn log(&self) {
        info!("{}", "=".repeat(50));
        info!("PRELIMINARY KPI INSIGHTS");
        info!("{}", "=".repeat(50));

        match &self.top_item_type_by_revenue {
            Some(top) => info!(
                "Top Item Type: {} (Total Revenue: {})",
                top.key,
                format_thousands(top.value)
            ),
            None => info!("Top Item Type: n/a"),
        }
        info!("Top Country (Sales): {}", leader_key(&self.top_country_by_revenue));
        info!("Top Sales Channel (Profit): {}", leader_key(&self.top_channel_by_profit));
        info!("Top Country (Avg Sales): {}", leader_key(&self.top_country_by_mean_revenue));
        match self.days_to_ship_revenue_correlation {
            Some(r) => info!("Correlation (Days vs Revenue): {:.4}", r),
            None => info!("Correlation (Days vs Revenue): n/a"),
        }

        info!("{}", "=".repeat(50));
    }
}

fn leader_key(leader: &Option<GroupLeader>) -> &str {
    leader.as_ref().map(|l| l.key.as_str()).unwrap_or("n/a")
}

/// Sum and count per key. Rows with a null key or value are skipped.
fn group_totals(keys: &[Option<String>], values: &[Option<f64>]) -> BTreeMap<String, (f64, usize)> {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (key, value) in keys.iter().zip(values) {
        if let (Some(key), Some(value)) = (key, value) {
            let entry = groups.entry(key.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    groups
}

/// First maximum in key order, so ties go to the smallest key.
fn first_max(aggregates: impl Iterator<Item = (String, f64)>) -> Option<GroupLeader> {
    let mut best: Option<GroupLeader> = None;
    for (key, value) in aggregates {
        match &best {
            Some(current) if value <= current.value => {}
            _ => best = Some(GroupLeader { key, value }),
        }
    }
    best
}

/// Group with the largest sum of `values`.
pub fn top_by_sum(keys: &[Option<String>], values: &[Option<f64>]) -> Option<GroupLeader> {
    first_max(
        group_totals(keys, values)
            .into_iter()
            .map(|(key, (sum, _))| (key, sum)),
    )
}

/// Group with the largest mean of `values`.
pub fn top_by_mean(keys: &[Option<String>], values: &[Option<f64>]) -> Option<GroupLeader> {
    first_max(
        group_totals(keys, values)
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64)),
    )
}

/// Pearson correlation over rows where both values are present.
///
/// `None` with fewer than two such rows or when either side is constant.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}
