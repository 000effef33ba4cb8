//! Greedy single-pass record selection.
//!
//! Records are visited in caller order. A record is taken as soon as it holds
//! any asset that is still outstanding, and the scan stops once every target
//! asset is covered. The result is not minimal; it is deterministic for a
//! given input order and linear in the number of records.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::SelectionError;
use crate::types::{AssetId, Record, Value};

/// Selects records from `records` until `target` is covered.
///
/// Records carrying a reference script are never selected.
///
/// # Errors
///
/// Returns [`SelectionError::InsufficientFunds`] with the uncovered remainder
/// if the records cannot cover `target`.
pub fn select_records<'a>(
    records: &'a [Record],
    target: &Value,
) -> Result<Vec<&'a Record>, SelectionError> {
    let mut outstanding: BTreeMap<AssetId, u64> = target
        .iter()
        .map(|(asset, amount)| (asset.clone(), amount))
        .collect();
    let mut selected = Vec::new();

    for record in records {
        if outstanding.is_empty() {
            break;
        }
        if record.reference_script {
            continue;
        }

        let mut contributes = false;
        outstanding.retain(|asset, required| {
            if !record.value.contains(asset) {
                return true;
            }
            contributes = true;

            let available = record.value.get(asset);
            if available >= *required {
                false
            } else {
                *required -= available;
                true
            }
        });

        if contributes {
            debug!(record = %record.id, remaining = outstanding.len(), "selected record");
            selected.push(record);
        }
    }

    if !outstanding.is_empty() {
        return Err(SelectionError::InsufficientFunds {
            shortfall: outstanding.into_iter().collect(),
        });
    }

    Ok(selected)
}
