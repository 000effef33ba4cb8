use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::PaymentValidatorDatum;
use crate::encoding::Encodable;
use crate::error::SubscriptionError;
use crate::installments::new_schedule;
use crate::lifecycle::SubscriptionState;
use crate::plan::{TransactionPlan, Transition};
use crate::redeemer::PaymentMintRedeemer;
use crate::sdk::{input_index, reference_index, service_terms, token_record};
use crate::selection::select_records;
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName, Record, Timestamp, Value};

use super::lookup_schedule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitSubscriptionRequest {
    /// Service reference token name.
    pub service_id: AssetName,
    /// Subscriber account user token name.
    pub subscriber_id: AssetName,
    pub subscription_start: Timestamp,
}

/// Opens a subscription by locking the full term's fees under a new schedule.
///
/// # Errors
///
/// Returns an error if:
/// - The pair already has a schedule
/// - The service is missing or inactive
/// - The subscriber's account token is not found
/// - The wallet cannot fund the subscription
pub fn init_subscription<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &InitSubscriptionRequest,
) -> Result<Transition, SubscriptionError> {
    if lookup_schedule(config, source, &request.service_id, &request.subscriber_id).is_some() {
        return Err(SubscriptionError::AlreadySubscribed {
            service_id: request.service_id.clone(),
            subscriber_id: request.subscriber_id.clone(),
        });
    }

    let (service_record, terms) = service_terms(config, source, &request.service_id)?;
    if !terms.is_active {
        return Err(SubscriptionError::InactiveService {
            service_id: request.service_id.clone(),
        });
    }

    let subscriber_record = token_record(
        source,
        config.account_policy_id,
        &request.subscriber_id,
        "subscriber account token",
    )?;
    let subscriber_token = AssetId::token(config.account_policy_id, request.subscriber_id.clone());

    let schedule = new_schedule(
        request.service_id.clone(),
        request.subscriber_id.clone(),
        &terms,
        request.subscription_start,
    )?;
    let total = terms.subscription_total()?;

    let candidates: Vec<Record> = std::iter::once(subscriber_record.clone())
        .chain(
            source
                .records_at(wallet)
                .into_iter()
                .filter(|record| record.id != subscriber_record.id),
        )
        .collect();
    let funding = select_records(&candidates, &Value::single(terms.fee_asset.clone(), total))?;

    let payment_token = config.payment_token()?;
    let datum = PaymentValidatorDatum::Payment(schedule).encode()?;

    let mut plan = TransactionPlan::new();
    plan.consume(subscriber_record.clone())
        .consume_all(funding.into_iter().cloned())
        .read(service_record.clone());

    let payment_output_index = plan.pay(
        config.payment_address.clone(),
        Value::single(terms.fee_asset.clone(), total).with(payment_token.clone(), 1),
        Some(datum),
    );
    plan.pay(wallet.clone(), Value::single(subscriber_token, 1), None);

    let redeemer = PaymentMintRedeemer::InitSubscription {
        service_ref_input_index: reference_index(&plan, &service_record.id)?,
        subscriber_input_index: input_index(&plan, &subscriber_record.id)?,
        payment_output_index,
    };
    plan.mint(payment_token, 1, redeemer)
        .valid_to(config.init_deadline(request.subscription_start));

    info!(
        service_id = %request.service_id,
        subscriber_id = %request.subscriber_id,
        total,
        inputs = plan.inputs().len(),
        "planned subscription init"
    );

    Ok(Transition {
        plan,
        state: SubscriptionState::Active,
    })
}
