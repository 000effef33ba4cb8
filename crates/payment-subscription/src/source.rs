use std::collections::BTreeMap;

use crate::types::{Address, AssetId, Record, RecordId};

/// Read access to the current set of unspent records.
///
/// Implementations wrap a chain indexer or wallet backend. Every call is a
/// snapshot; the planners never assume two calls observe the same state.
pub trait RecordSource {
    /// Records currently held at `address`.
    fn records_at(&self, address: &Address) -> Vec<Record>;

    /// The record holding `asset`, for assets with a supply of one.
    fn record_by_asset(&self, asset: &AssetId) -> Option<Record>;
}

impl<S: RecordSource + ?Sized> RecordSource for &S {
    fn records_at(&self, address: &Address) -> Vec<Record> {
        (**self).records_at(address)
    }

    fn record_by_asset(&self, asset: &AssetId) -> Option<Record> {
        (**self).record_by_asset(asset)
    }
}

/// Record set held in memory, keyed by record id.
///
/// Iteration follows record id order, which keeps planning deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: BTreeMap<RecordId, Record>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&mut self, record: Record) -> &mut Self {
        self.records.insert(record.id, record);
        self
    }

    /// Removes a record, as if it had been spent.
    pub fn spend(&mut self, id: &RecordId) -> Option<Record> {
        self.records.remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<Record> for MemorySource {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut source = Self::new();
        for record in iter {
            source.insert(record);
        }
        source
    }
}

impl RecordSource for MemorySource {
    fn records_at(&self, address: &Address) -> Vec<Record> {
        self.records
            .values()
            .filter(|record| &record.address == address)
            .cloned()
            .collect()
    }

    fn record_by_asset(&self, asset: &AssetId) -> Option<Record> {
        self.records
            .values()
            .find(|record| record.value.contains(asset))
            .cloned()
    }
}
