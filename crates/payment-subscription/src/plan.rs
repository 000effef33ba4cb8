//! Unsigned description of a transaction.
//!
//! A [`TransactionPlan`] lists what to consume, what to read, what to pay and
//! what to mint. Balancing, fee estimation, change outputs and signing belong to
//! the transaction builder that receives the plan.
//!
//! Each redeemer index field is bound to the record it pointed at when the
//! redeemer was attached. Adding inputs or reference inputs later re-resolves
//! those fields against the new ordering, so records added while balancing
//! never leave a redeemer pointing at the wrong input.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::indices::{canonical_order, resolve_index};
use crate::lifecycle::SubscriptionState;
use crate::redeemer::{IndexTarget, Redeemer};
use crate::types::{Address, AssetId, Record, RecordId, Timestamp, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedInput {
    pub record: Record,
    /// Present for script-locked inputs.
    pub redeemer: Option<Redeemer>,
    #[serde(skip)]
    bindings: Bindings,
}

/// Record each index slot of a redeemer points at.
type Bindings = Vec<Option<RecordId>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOutput {
    pub address: Address,
    pub value: Value,
    /// Inline datum bytes.
    #[serde(with = "crate::types::hex_option")]
    pub datum: Option<Vec<u8>>,
}

/// Validity interval bounds in POSIX milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidityWindow {
    pub valid_from: Option<Timestamp>,
    pub valid_to: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionPlan {
    inputs: Vec<PlannedInput>,
    reference_inputs: Vec<Record>,
    outputs: Vec<PlannedOutput>,
    mint: BTreeMap<AssetId, i64>,
    mint_redeemer: Option<Redeemer>,
    #[serde(skip)]
    mint_bindings: Bindings,
    validity: ValidityWindow,
}

impl TransactionPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record` to the inputs. A record already present is kept once.
    pub fn consume(&mut self, record: Record) -> &mut Self {
        if self.inputs.iter().all(|input| input.record.id != record.id) {
            self.inputs.push(PlannedInput {
                record,
                redeemer: None,
                bindings: Vec::new(),
            });
            self.reindex();
        }
        self
    }

    pub fn consume_all<I: IntoIterator<Item = Record>>(&mut self, records: I) -> &mut Self {
        for record in records {
            self.consume(record);
        }
        self
    }

    /// Attaches a spend redeemer to an input that is already part of the plan.
    ///
    /// Returns `false` if no input has the given id.
    pub fn attach_redeemer(&mut self, id: &RecordId, redeemer: impl Into<Redeemer>) -> bool {
        let mut redeemer = redeemer.into();
        let bindings = self.bind(&mut redeemer);

        match self.inputs.iter_mut().find(|input| &input.record.id == id) {
            Some(input) => {
                input.redeemer = Some(redeemer);
                input.bindings = bindings;
                true
            }
            None => false,
        }
    }

    /// Adds a reference input.
    pub fn read(&mut self, record: Record) -> &mut Self {
        if self.reference_inputs.iter().all(|existing| existing.id != record.id) {
            self.reference_inputs.push(record);
            self.reindex();
        }
        self
    }

    /// Appends an output and returns its index.
    pub fn pay(&mut self, address: Address, value: Value, datum: Option<Vec<u8>>) -> u64 {
        debug!(%address, %value, has_datum = datum.is_some(), "planned output");
        self.outputs.push(PlannedOutput {
            address,
            value,
            datum,
        });
        (self.outputs.len() - 1) as u64
    }

    /// Mints (`amount > 0`) or burns (`amount < 0`) `asset`.
    pub fn mint(&mut self, asset: AssetId, amount: i64, redeemer: impl Into<Redeemer>) -> &mut Self {
        let entry = self.mint.entry(asset).or_insert(0);
        *entry += amount;
        if *entry == 0 {
            self.mint.retain(|_, amount| *amount != 0);
        }
        let mut redeemer = redeemer.into();
        self.mint_bindings = self.bind(&mut redeemer);
        self.mint_redeemer = Some(redeemer);
        self
    }

    pub fn valid_from(&mut self, time: Timestamp) -> &mut Self {
        self.validity.valid_from = Some(time);
        self
    }

    pub fn valid_to(&mut self, time: Timestamp) -> &mut Self {
        self.validity.valid_to = Some(time);
        self
    }

    #[must_use]
    pub fn inputs(&self) -> &[PlannedInput] {
        &self.inputs
    }

    #[must_use]
    pub fn reference_inputs(&self) -> &[Record] {
        &self.reference_inputs
    }

    #[must_use]
    pub fn outputs(&self) -> &[PlannedOutput] {
        &self.outputs
    }

    #[must_use]
    pub const fn minted(&self) -> &BTreeMap<AssetId, i64> {
        &self.mint
    }

    #[must_use]
    pub const fn mint_redeemer(&self) -> Option<&Redeemer> {
        self.mint_redeemer.as_ref()
    }

    #[must_use]
    pub const fn validity(&self) -> ValidityWindow {
        self.validity
    }

    /// Input ids in ledger order.
    #[must_use]
    pub fn input_order(&self) -> Vec<RecordId> {
        canonical_order(self.inputs.iter().map(|input| &input.record))
    }

    /// Ledger index of the input with id `id`.
    #[must_use]
    pub fn input_index(&self, id: &RecordId) -> Option<u64> {
        let records: Vec<&Record> = self.inputs.iter().map(|input| &input.record).collect();
        resolve_index(id, &records).filter(|_| records.iter().any(|record| &record.id == id))
    }

    /// Ledger index of the reference input with id `id`.
    #[must_use]
    pub fn reference_index(&self, id: &RecordId) -> Option<u64> {
        resolve_index(id, &self.reference_inputs)
            .filter(|_| self.reference_inputs.iter().any(|record| &record.id == id))
    }

    #[must_use]
    pub fn redeemer_for(&self, id: &RecordId) -> Option<&Redeemer> {
        self.inputs
            .iter()
            .find(|input| &input.record.id == id)
            .and_then(|input| input.redeemer.as_ref())
    }

    /// Sum of every consumed input value, `None` on overflow.
    #[must_use]
    pub fn consumed_value(&self) -> Option<Value> {
        sum_values(self.inputs.iter().map(|input| &input.record.value))
    }

    /// Sum of every output value, `None` on overflow.
    #[must_use]
    pub fn produced_value(&self) -> Option<Value> {
        sum_values(self.outputs.iter().map(|output| &output.value))
    }
}

impl TransactionPlan {
    fn positions(&self) -> (HashMap<RecordId, u64>, HashMap<RecordId, u64>) {
        let inputs = self.input_order().into_iter().zip(0u64..).collect();
        let references = canonical_order(&self.reference_inputs)
            .into_iter()
            .zip(0u64..)
            .collect();
        (inputs, references)
    }

    /// Records the index fields of `redeemer` currently point at.
    fn bind(&self, redeemer: &mut Redeemer) -> Bindings {
        let inputs = self.input_order();
        let references = canonical_order(&self.reference_inputs);

        redeemer
            .index_slots_mut()
            .into_iter()
            .map(|(target, index)| {
                let order = match target {
                    IndexTarget::Input => &inputs,
                    IndexTarget::Reference => &references,
                };
                usize::try_from(*index)
                    .ok()
                    .and_then(|position| order.get(position))
                    .copied()
            })
            .collect()
    }

    /// Rewrites every bound index field against the current input ordering.
    fn reindex(&mut self) {
        let (inputs, references) = self.positions();
        let rebind = |redeemer: &mut Redeemer, bindings: &Bindings| {
            for ((target, index), bound) in redeemer.index_slots_mut().into_iter().zip(bindings) {
                let positions = match target {
                    IndexTarget::Input => &inputs,
                    IndexTarget::Reference => &references,
                };
                if let Some(resolved) = bound.as_ref().and_then(|id| positions.get(id)) {
                    *index = *resolved;
                }
            }
        };

        for input in &mut self.inputs {
            if let Some(redeemer) = input.redeemer.as_mut() {
                rebind(redeemer, &input.bindings);
            }
        }
        if let Some(redeemer) = self.mint_redeemer.as_mut() {
            rebind(redeemer, &self.mint_bindings);
        }
    }
}

fn sum_values<'a, I: IntoIterator<Item = &'a Value>>(values: I) -> Option<Value> {
    values.into_iter().try_fold(Value::new(), |total, value| {
        value
            .iter()
            .try_fold(total, |total, (asset, amount)| total.checked_add_asset(asset.clone(), amount))
    })
}

/// A planned transaction together with the lifecycle state it leads to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub plan: TransactionPlan,
    pub state: SubscriptionState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redeemer::{PaymentMintRedeemer, PaymentSpendRedeemer, ServiceSpendRedeemer};
    use crate::types::TxHash;

    fn record(byte: u8, lovelace: u64) -> Record {
        Record::new(
            RecordId::new(TxHash([byte; 32]), 0),
            Address::new("addr_test1wallet"),
            Value::lovelace(lovelace),
        )
    }

    #[test]
    fn consume_keeps_each_record_once_and_indexes_canonically() {
        let mut plan = TransactionPlan::new();
        plan.consume(record(0x30, 1))
            .consume(record(0x10, 2))
            .consume(record(0x30, 1));

        assert_eq!(plan.inputs().len(), 2);
        assert_eq!(plan.input_index(&record(0x30, 1).id), Some(1));
        assert_eq!(plan.input_index(&record(0x10, 2).id), Some(0));
        assert_eq!(plan.input_index(&record(0x20, 2).id), None);
    }

    #[test]
    fn spend_indices_follow_inputs_added_later() {
        let owner = record(0x40, 2);
        let entity = record(0x50, 2);
        let mut plan = TransactionPlan::new();
        plan.consume(owner.clone()).consume(entity.clone());
        plan.attach_redeemer(
            &entity.id,
            ServiceSpendRedeemer::Update {
                service_ref_name: crate::types::AssetName::default(),
                merchant_input_index: plan.input_index(&owner.id).expect("owner"),
                service_input_index: plan.input_index(&entity.id).expect("entity"),
                service_output_index: 0,
            },
        );

        plan.consume(record(0x00, 9)).consume(record(0x45, 9));

        let Some(Redeemer::ServiceSpend(ServiceSpendRedeemer::Update {
            merchant_input_index,
            service_input_index,
            ..
        })) = plan.redeemer_for(&entity.id)
        else {
            panic!("expected update redeemer");
        };
        assert_eq!(Some(*merchant_input_index), plan.input_index(&owner.id));
        assert_eq!(Some(*service_input_index), plan.input_index(&entity.id));
        assert_eq!(*service_input_index, 3);
    }

    #[test]
    fn reference_and_mint_indices_follow_late_additions() {
        let service = record(0x70, 2);
        let subscriber = record(0x60, 2);
        let payment = record(0x80, 2);
        let mut plan = TransactionPlan::new();
        plan.consume(subscriber.clone())
            .consume(payment.clone())
            .read(service.clone());

        plan.attach_redeemer(
            &payment.id,
            PaymentSpendRedeemer::SubscriberWithdraw {
                service_ref_input_index: plan.reference_index(&service.id).expect("service"),
                subscriber_input_index: plan.input_index(&subscriber.id).expect("subscriber"),
                payment_input_index: plan.input_index(&payment.id).expect("payment"),
            },
        );
        plan.mint(
            AssetId::Lovelace,
            1,
            PaymentMintRedeemer::InitSubscription {
                service_ref_input_index: plan.reference_index(&service.id).expect("service"),
                subscriber_input_index: plan.input_index(&subscriber.id).expect("subscriber"),
                payment_output_index: 0,
            },
        );

        plan.read(record(0x01, 1)).consume(record(0x02, 1));

        let service_index = plan.reference_index(&service.id).expect("service");
        let subscriber_index = plan.input_index(&subscriber.id).expect("subscriber");
        assert_eq!(service_index, 1);
        assert_eq!(
            plan.redeemer_for(&payment.id),
            Some(&Redeemer::PaymentSpend(PaymentSpendRedeemer::SubscriberWithdraw {
                service_ref_input_index: service_index,
                subscriber_input_index: subscriber_index,
                payment_input_index: plan.input_index(&payment.id).expect("payment"),
            }))
        );
        assert_eq!(
            plan.mint_redeemer(),
            Some(&Redeemer::PaymentMint(PaymentMintRedeemer::InitSubscription {
                service_ref_input_index: service_index,
                subscriber_input_index: subscriber_index,
                payment_output_index: 0,
            }))
        );
    }

    #[test]
    fn mint_and_burn_of_same_asset_cancel() {
        let asset = AssetId::Lovelace;
        let mut plan = TransactionPlan::new();
        plan.mint(asset.clone(), 1, PaymentMintRedeemer::TerminateSubscription)
            .mint(asset, -1, PaymentMintRedeemer::TerminateSubscription);

        assert!(plan.minted().is_empty());
    }

    #[test]
    fn output_indices_follow_insertion_order() {
        let mut plan = TransactionPlan::new();
        let first = plan.pay(Address::new("a"), Value::lovelace(1), None);
        let second = plan.pay(Address::new("b"), Value::lovelace(2), Some(vec![1]));

        assert_eq!((first, second), (0, 1));
        assert_eq!(plan.produced_value(), Some(Value::lovelace(3)));
    }
}
