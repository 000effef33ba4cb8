//! Merchant-side service registry.

mod create;
mod remove;
mod update;

pub use create::{CreateServiceRequest, create_service};
pub use remove::{RemoveServiceRequest, remove_service};
pub use update::{UpdateServiceRequest, update_service};

use crate::config::ProtocolConfig;
use crate::datum::ServiceTerms;
use crate::encoding::Encodable;
use crate::error::SubscriptionError;
use crate::plan::TransactionPlan;
use crate::redeemer::ServiceSpendRedeemer;
use crate::sdk::{input_index, owned_token_record, service_terms};
use crate::source::RecordSource;
use crate::types::{Address, AssetName};

type SpendRedeemer = fn(AssetName, u64, u64, u64) -> ServiceSpendRedeemer;

/// Re-locks the service reference token under `next` terms, authorized by
/// the merchant token held at `wallet`.
fn plan_service_spend<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    service_id: &AssetName,
    merchant_id: &AssetName,
    next: impl FnOnce(ServiceTerms) -> Result<ServiceTerms, SubscriptionError>,
    redeemer: SpendRedeemer,
) -> Result<TransactionPlan, SubscriptionError> {
    let (service_record, terms) = service_terms(config, source, service_id)?;
    let merchant_record = owned_token_record(
        source,
        config.service_policy_id,
        merchant_id,
        "merchant token",
        wallet,
    )?;

    let terms = next(terms)?;

    let mut plan = TransactionPlan::new();
    plan.consume(merchant_record.clone())
        .consume(service_record.clone());
    let service_output_index = plan.pay(
        config.service_address.clone(),
        service_record.value.clone(),
        Some(terms.encode()?),
    );

    let redeemer = redeemer(
        service_id.clone(),
        input_index(&plan, &merchant_record.id)?,
        input_index(&plan, &service_record.id)?,
        service_output_index,
    );
    plan.attach_redeemer(&service_record.id, redeemer);
    Ok(plan)
}
