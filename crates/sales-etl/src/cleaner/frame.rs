//! The frame passed between cleaning steps.

use crate::error::Result;
use crate::types::{RejectedRow, RejectionReason};
use polars::prelude::*;

/// A `DataFrame` plus, for every row, its 0-based position in the raw dataset.
#[derive(Debug, Clone)]
pub struct StepFrame {
    pub df: DataFrame,
    pub source_rows: Vec<usize>,
}

impl StepFrame {
    /// Wrap a raw dataset; row `i` maps to raw row `i`.
    pub fn new(df: DataFrame) -> Self {
        let source_rows = (0..df.height()).collect();
        Self { df, source_rows }
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Keep rows whose `keep` entry is true.
    pub fn retain(self, keep: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        let df = self.df.filter(&mask)?;
        let source_rows = self
            .source_rows
            .into_iter()
            .zip(keep)
            .filter_map(|(row, &k)| k.then_some(row))
            .collect();
        Ok(Self { df, source_rows })
    }

    /// Drop every row with a rejection and return the rejections,
    /// tagged with raw row positions.
    pub fn reject(self, reasons: Vec<Option<RejectionReason>>) -> Result<StepOutput> {
        let keep: Vec<bool> = reasons.iter().map(|r| r.is_none()).collect();
        let rejected = self
            .source_rows
            .iter()
            .zip(reasons)
            .filter_map(|(&row, reason)| reason.map(|r| RejectedRow::new(row, r)))
            .collect();
        let frame = self.retain(&keep)?;
        Ok(StepOutput { frame, rejected })
    }
}

/// Result of one filtering step: survivors plus the rows it dropped.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub frame: StepFrame,
    pub rejected: Vec<RejectedRow>,
}

/// A frame whose typed columns were parsed but not yet filtered.
///
/// `invalid[i]` is the first parse failure of row `i`, if any. Failed cells
/// hold nulls in the parsed columns.
#[derive(Debug, Clone)]
pub struct ParsedFrame {
    pub frame: StepFrame,
    pub invalid: Vec<Option<RejectionReason>>,
}
