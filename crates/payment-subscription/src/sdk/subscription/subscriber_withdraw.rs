use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::PaymentValidatorDatum;
use crate::encoding::Encodable;
use crate::error::{IntegrityError, SubscriptionError};
use crate::installments::claim;
use crate::lifecycle::SubscriptionState;
use crate::plan::{TransactionPlan, Transition};
use crate::redeemer::{PaymentMintRedeemer, PaymentSpendRedeemer};
use crate::sdk::{input_index, reference_index, service_terms, token_record};
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName, Timestamp, Value};

use super::{find_schedule, locked_fee, payment_token_at, state_after_withdraw};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberWithdrawRequest {
    pub service_id: AssetName,
    pub subscriber_id: AssetName,
    pub current_time: Timestamp,
}

/// Withdraws from the subscriber's side of a payment record.
///
/// Against an inactive service the subscriber recovers everything locked and
/// the payment token is burned. Against an active service only the installments
/// due are paid out, as for the merchant.
///
/// # Errors
///
/// Returns an error if no schedule exists for the pair, the service or account
/// token is missing, or (for an active service) nothing is claimable.
pub fn subscriber_withdraw<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &SubscriberWithdrawRequest,
) -> Result<Transition, SubscriptionError> {
    let (payment_record, schedule) =
        find_schedule(config, source, &request.service_id, &request.subscriber_id)?;
    let (service_record, terms) = service_terms(config, source, &request.service_id)?;
    let subscriber_record = token_record(
        source,
        config.account_policy_id,
        &request.subscriber_id,
        "subscriber account token",
    )?;
    let subscriber_token = AssetId::token(config.account_policy_id, request.subscriber_id.clone());
    let payment_token = payment_token_at(config, &payment_record)?;

    let mut plan = TransactionPlan::new();
    plan.consume(subscriber_record.clone())
        .consume(payment_record.clone())
        .read(service_record.clone());

    let state = if terms.is_active {
        let claimed = claim(&schedule, config.claim_time(request.current_time))?;
        let locked = locked_fee(&payment_record, &terms.fee_asset, &schedule)?;
        let remaining = locked
            .checked_sub(claimed.claimed_amount)
            .ok_or(IntegrityError::LockedBelowSchedule {
                locked,
                scheduled: claimed.claimed_amount,
            })?;

        plan.pay(
            wallet.clone(),
            Value::single(terms.fee_asset.clone(), claimed.claimed_amount)
                .with(subscriber_token, 1),
            None,
        );
        let next = claimed.apply_to(&schedule);
        let state = state_after_withdraw(&next, request.current_time);
        plan.pay(
            config.payment_address.clone(),
            payment_record.value.clone().with(terms.fee_asset.clone(), remaining),
            Some(PaymentValidatorDatum::Payment(next).encode()?),
        );
        plan.valid_from(request.current_time);

        info!(
            service_id = %request.service_id,
            subscriber_id = %request.subscriber_id,
            claimed = claimed.claimed_amount,
            remaining,
            ?state,
            "planned subscriber withdrawal"
        );
        state
    } else {
        let refund = payment_record.value.clone().without(&payment_token);
        plan.pay(wallet.clone(), refund.with(subscriber_token, 1), None);
        plan.mint(payment_token, -1, PaymentMintRedeemer::TerminateSubscription);

        info!(
            service_id = %request.service_id,
            subscriber_id = %request.subscriber_id,
            refund = %payment_record.value,
            "planned refund from inactive service"
        );
        SubscriptionState::Exited
    };

    let redeemer = PaymentSpendRedeemer::SubscriberWithdraw {
        service_ref_input_index: reference_index(&plan, &service_record.id)?,
        subscriber_input_index: input_index(&plan, &subscriber_record.id)?,
        payment_input_index: input_index(&plan, &payment_record.id)?,
    };
    plan.attach_redeemer(&payment_record.id, redeemer);

    Ok(Transition { plan, state })
}
