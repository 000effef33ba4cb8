//! Input positions as the validator sees them.
//!
//! The ledger orders transaction inputs by `(origin, position)`. Redeemers
//! point at inputs by their index in that order, so every index handed to a
//! redeemer is computed here from the full input set.

use std::collections::{BTreeSet, HashMap};

use crate::types::RecordId;

/// Canonical ledger order of a set of inputs, duplicates removed.
#[must_use]
pub fn canonical_order<I>(inputs: I) -> Vec<RecordId>
where
    I: IntoIterator,
    I::Item: AsRef<RecordId>,
{
    inputs
        .into_iter()
        .map(|input| *input.as_ref())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Index of each `selected` input within the sorted union of `selected` and
/// `other_inputs`.
///
/// The result has one entry per selected input, in the order given. An id
/// that appears in both slices counts once, as it does on the ledger.
#[must_use]
pub fn resolve_indices<S, O>(selected: &[S], other_inputs: &[O]) -> Vec<u64>
where
    S: AsRef<RecordId>,
    O: AsRef<RecordId>,
{
    let ordered = canonical_order(
        selected
            .iter()
            .map(AsRef::<RecordId>::as_ref)
            .chain(other_inputs.iter().map(AsRef::<RecordId>::as_ref)),
    );

    let positions: HashMap<RecordId, u64> = ordered.into_iter().zip(0u64..).collect();

    selected
        .iter()
        .filter_map(|input| positions.get(input.as_ref()).copied())
        .collect()
}

/// Index of a single input within `all_inputs`.
#[must_use]
pub fn resolve_index<O: AsRef<RecordId>>(input: &RecordId, all_inputs: &[O]) -> Option<u64> {
    resolve_indices(std::slice::from_ref(input), all_inputs)
        .first()
        .copied()
}
