use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::PaymentValidatorDatum;
use crate::encoding::Encodable;
use crate::error::{IntegrityError, SubscriptionError};
use crate::installments::claim;
use crate::plan::{TransactionPlan, Transition};
use crate::redeemer::PaymentSpendRedeemer;
use crate::sdk::{input_index, reference_index, service_terms, token_record};
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName, Timestamp, Value};

use super::{find_schedule, locked_fee, state_after_withdraw};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantWithdrawRequest {
    pub service_id: AssetName,
    /// Merchant user token name of the service.
    pub merchant_id: AssetName,
    pub subscriber_id: AssetName,
    pub current_time: Timestamp,
}

/// Pays the merchant every installment due and re-locks the rest.
///
/// Installments are claimed as of `current_time` minus the configured claim
/// margin, so a transaction valid from `current_time` never claims ahead of
/// the ledger clock.
///
/// # Errors
///
/// Returns an error if:
/// - No schedule exists for the pair
/// - The service or merchant token is missing
/// - Nothing is claimable yet
/// - The locked value no longer covers the schedule
pub fn merchant_withdraw<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &MerchantWithdrawRequest,
) -> Result<Transition, SubscriptionError> {
    let (payment_record, schedule) =
        find_schedule(config, source, &request.service_id, &request.subscriber_id)?;
    let (service_record, terms) = service_terms(config, source, &request.service_id)?;
    let merchant_record = token_record(
        source,
        config.service_policy_id,
        &request.merchant_id,
        "merchant token",
    )?;
    let merchant_token = AssetId::token(config.service_policy_id, request.merchant_id.clone());

    let claimed = claim(&schedule, config.claim_time(request.current_time))?;
    let locked = locked_fee(&payment_record, &terms.fee_asset, &schedule)?;
    let remaining = locked
        .checked_sub(claimed.claimed_amount)
        .ok_or(IntegrityError::LockedBelowSchedule {
            locked,
            scheduled: claimed.claimed_amount,
        })?;

    let next = claimed.apply_to(&schedule);
    let state = state_after_withdraw(&next, request.current_time);

    let merchant_input = merchant_record.id;
    let mut plan = TransactionPlan::new();
    plan.consume_all(source.records_at(wallet))
        .consume(merchant_record)
        .consume(payment_record.clone())
        .read(service_record.clone());

    plan.pay(
        wallet.clone(),
        Value::single(terms.fee_asset.clone(), claimed.claimed_amount).with(merchant_token, 1),
        None,
    );
    let payment_output_index = plan.pay(
        config.payment_address.clone(),
        payment_record.value.clone().with(terms.fee_asset.clone(), remaining),
        Some(PaymentValidatorDatum::Payment(next).encode()?),
    );

    let redeemer = PaymentSpendRedeemer::MerchantWithdraw {
        service_ref_input_index: reference_index(&plan, &service_record.id)?,
        merchant_input_index: input_index(&plan, &merchant_input)?,
        payment_input_index: input_index(&plan, &payment_record.id)?,
        payment_output_index,
        installments_withdrawn: claimed.claimed_count as u64,
    };
    plan.attach_redeemer(&payment_record.id, redeemer);
    plan.valid_from(request.current_time);

    info!(
        service_id = %request.service_id,
        subscriber_id = %request.subscriber_id,
        claimed = claimed.claimed_amount,
        installments = claimed.claimed_count,
        remaining,
        ?state,
        "planned merchant withdrawal"
    );

    Ok(Transition { plan, state })
}
