//! Exact-duplicate removal.

use super::frame::{StepFrame, StepOutput};
use crate::error::Result;
use crate::types::RejectionReason;
use crate::utils::text_values;
use std::collections::HashMap;
use tracing::debug;

/// Collapse rows that are identical across every column to their first
/// occurrence. Survivor order is unchanged.
pub fn remove_exact_duplicates(frame: StepFrame) -> Result<StepOutput> {
    let height = frame.height();
    let column_names: Vec<String> = frame
        .df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let mut columns = Vec::with_capacity(column_names.len());
    for name in &column_names {
        columns.push(text_values(&frame.df, name)?);
    }

    let mut first_seen: HashMap<Vec<Option<&str>>, usize> = HashMap::with_capacity(height);
    let mut reasons = Vec::with_capacity(height);

    for i in 0..height {
        let key: Vec<Option<&str>> = columns.iter().map(|col| col[i].as_deref()).collect();
        match first_seen.get(&key) {
            Some(&first) => reasons.push(Some(RejectionReason::Duplicate {
                first_row: frame.source_rows[first],
            })),
            None => {
                first_seen.insert(key, i);
                reasons.push(None);
            }
        }
    }

    let out = frame.reject(reasons)?;
    debug!("Removed {} duplicate rows", out.rejected.len());
    Ok(out)
}
