//! Transaction planners for every protocol operation.
//!
//! Each planner reads state through a [`RecordSource`], checks the request
//! against it and returns an unsigned [`TransactionPlan`]. Nothing is submitted.

pub mod account;
pub mod service;
pub mod subscription;

use serde::Serialize;
use tracing::debug;

use crate::asset_name::TokenPair;
use crate::config::ProtocolConfig;
use crate::datum::{ServiceTerms, fetch_service_terms};
use crate::error::SubscriptionError;
use crate::plan::TransactionPlan;
use crate::redeemer::RegistryMintRedeemer;
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName, PolicyId, Record, RecordId, Value};

/// Plan that mints a new reference/user token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub plan: TransactionPlan,
    pub tokens: TokenPair,
}

/// Record holding the single unit of `policy_id`.`name`.
pub(crate) fn token_record<S: RecordSource + ?Sized>(
    source: &S,
    policy_id: PolicyId,
    name: &AssetName,
    what: &str,
) -> Result<Record, SubscriptionError> {
    let asset = AssetId::token(policy_id, name.clone());
    let record = source
        .record_by_asset(&asset)
        .ok_or_else(|| SubscriptionError::lookup_miss(format!("{what} {name}")))?;

    debug!(%asset, record = %record.id, "resolved token record");
    Ok(record)
}

/// Like [`token_record`], but the record must sit at `wallet`.
pub(crate) fn owned_token_record<S: RecordSource + ?Sized>(
    source: &S,
    policy_id: PolicyId,
    name: &AssetName,
    what: &str,
    wallet: &Address,
) -> Result<Record, SubscriptionError> {
    let record = token_record(source, policy_id, name, what)?;
    if &record.address != wallet {
        debug!(record = %record.id, holder = %record.address, %wallet, "token held elsewhere");
        return Err(SubscriptionError::lookup_miss(format!("{what} {name} at {wallet}")));
    }
    Ok(record)
}

/// Service reference record and the terms it carries.
pub(crate) fn service_terms<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    service_id: &AssetName,
) -> Result<(Record, ServiceTerms), SubscriptionError> {
    let record = token_record(source, config.service_policy_id, service_id, "service reference token")?;
    let terms = fetch_service_terms(&record)?;
    Ok((record, terms))
}

/// Record with id `seed` among the records at `wallet`.
pub(crate) fn seed_record<S: RecordSource + ?Sized>(
    source: &S,
    wallet: &Address,
    seed: &RecordId,
) -> Result<Record, SubscriptionError> {
    source
        .records_at(wallet)
        .into_iter()
        .find(|record| &record.id == seed)
        .ok_or_else(|| SubscriptionError::lookup_miss(format!("seed record {seed} at {wallet}")))
}

/// Mints a token pair from `seed`, locking the reference token with `datum` at
/// `contract` and paying the user token to `wallet`.
pub(crate) fn plan_registration(
    seed: Record,
    policy_id: PolicyId,
    contract: &Address,
    wallet: &Address,
    datum: Vec<u8>,
) -> Result<Registration, SubscriptionError> {
    let tokens = TokenPair::from_seed(&seed.id);
    let ref_asset = tokens.ref_asset(policy_id);
    let user_asset = tokens.user_asset(policy_id);

    let mut plan = TransactionPlan::new();
    plan.consume(seed.clone());
    plan.pay(wallet.clone(), Value::single(user_asset.clone(), 1), None);
    let output_index = plan.pay(contract.clone(), Value::single(ref_asset.clone(), 1), Some(datum));

    let redeemer = RegistryMintRedeemer::Create {
        input_index: input_index(&plan, &seed.id)?,
        output_index,
    };
    plan.mint(ref_asset, 1, redeemer.clone())
        .mint(user_asset, 1, redeemer);

    debug!(
        seed = %seed.id,
        reference = %tokens.ref_name,
        user = %tokens.user_name,
        "planned token pair mint"
    );
    Ok(Registration { plan, tokens })
}

/// Ledger index of an input the plan is known to contain.
pub(crate) fn input_index(plan: &TransactionPlan, id: &RecordId) -> Result<u64, SubscriptionError> {
    plan.input_index(id)
        .ok_or_else(|| SubscriptionError::lookup_miss(format!("planned input {id}")))
}

/// Ledger index of a reference input the plan is known to contain.
pub(crate) fn reference_index(
    plan: &TransactionPlan,
    id: &RecordId,
) -> Result<u64, SubscriptionError> {
    plan.reference_index(id)
        .ok_or_else(|| SubscriptionError::lookup_miss(format!("planned reference input {id}")))
}
