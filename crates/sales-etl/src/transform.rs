//! Transform stage: raw table in, cleaned and enriched production table out.
//!
//! The whole raw table is loaded, cleaned, enriched and summarised in memory.
//! The production table is only touched once everything else succeeded, and
//! then with a single full replacement.

use crate::cleaner::SalesCleaner;
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::features::add_derived_columns;
use crate::kpi::KpiReport;
use crate::store::TableStore;
use crate::types::{RejectedRow, RowCounts, TableRef};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// What a successful transform produced besides the table itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformOutcome {
    pub counts: RowCounts,
    pub kpis: KpiReport,
    pub rejected: Vec<RejectedRow>,
}

/// Clean, enrich and summarise a raw dataset without touching any store.
///
/// # Errors
///
/// - [`EtlError::EmptyInput`] if `df` has no rows
/// - [`EtlError::InvalidSchema`] if a required column is missing
/// - [`EtlError::EmptySurvivors`] if every row is rejected
pub fn transform_dataset(df: DataFrame, source_name: &str) -> Result<(DataFrame, TransformOutcome)> {
    if df.height() == 0 {
        return Err(EtlError::EmptyInput(source_name.to_string()));
    }

    let cleaned = SalesCleaner.clean(df)?;
    let counts = cleaned.counts;

    if counts.survivors() == 0 {
        return Err(EtlError::EmptySurvivors { rows_in: counts.raw });
    }

    let mut df = cleaned.frame.df;
    add_derived_columns(&mut df)?;

    let kpis = KpiReport::compute(&df)?;

    Ok((
        df,
        TransformOutcome {
            counts,
            kpis,
            rejected: cleaned.rejected,
        },
    ))
}

/// Reads the raw table, transforms it and replaces the production table.
#[derive(Debug, Clone)]
pub struct TransformStage {
    store: TableStore,
    source: TableRef,
    destination: TableRef,
}

impl TransformStage {
    pub fn new(store: TableStore, source: TableRef, destination: TableRef) -> Self {
        Self {
            store,
            source,
            destination,
        }
    }

    pub fn from_config(config: &EtlConfig) -> Self {
        Self::new(
            TableStore::new(&config.store_root),
            config.raw_table.clone(),
            config.destination.clone(),
        )
    }

    /// Run the stage end to end.
    ///
    /// On any error the production table keeps its previous contents.
    pub fn run(&self) -> Result<TransformOutcome> {
        let start = Instant::now();
        info!("Starting Transformation...");

        let raw = self.store.read_table(&self.source)?;
        info!("Loaded {} rows from {}", raw.height(), self.source);

        let (mut df, outcome) = transform_dataset(raw, &self.source.to_string())?;
        log_counts(&outcome.counts);
        outcome.kpis.log();

        info!("Saving cleaned data to {}...", self.destination);
        self.store.write_table(&self.destination, &mut df)?;

        debug!("Transform finished in {:?}", start.elapsed());
        info!(
            "Transformation Complete. Rows reduced from {} to {}",
            outcome.counts.raw,
            outcome.counts.survivors()
        );
        Ok(outcome)
    }
}

fn log_counts(counts: &RowCounts) {
    info!("Raw rows: {}", counts.raw);
    info!("After dedup: {}", counts.after_dedup);
    info!("After date filter: {}", counts.after_date_filter);
    info!("After chronology filter: {}", counts.after_chronology_filter);
    info!("After numeric filter: {}", counts.after_numeric_filter);
}
