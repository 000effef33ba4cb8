use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::PaymentValidatorDatum;
use crate::encoding::Encodable;
use crate::error::SubscriptionError;
use crate::installments::{ExitOutcome, compute_exit};
use crate::lifecycle::SubscriptionState;
use crate::plan::{TransactionPlan, Transition};
use crate::redeemer::{PaymentMintRedeemer, PaymentSpendRedeemer};
use crate::sdk::{input_index, reference_index, service_terms, token_record};
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName, Timestamp, Value};

use super::{find_schedule, locked_fee, payment_token_at};

/// Output index the validator expects the penalty at.
const PENALTY_OUTPUT_INDEX: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub service_id: AssetName,
    pub subscriber_id: AssetName,
    pub current_time: Timestamp,
}

/// Ends a subscription, leaving a penalty behind when it ends early.
///
/// # Errors
///
/// Returns an error if:
/// - No schedule exists for the pair
/// - The service or account token is missing
/// - The penalty is charged in a different asset than the fee
/// - The locked value cannot cover the penalty
pub fn unsubscribe<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &UnsubscribeRequest,
) -> Result<Transition, SubscriptionError> {
    let (payment_record, schedule) =
        find_schedule(config, source, &request.service_id, &request.subscriber_id)?;
    let (service_record, terms) = service_terms(config, source, &request.service_id)?;
    if terms.penalty_asset != terms.fee_asset {
        return Err(SubscriptionError::InvalidArgument(format!(
            "penalty asset {} differs from fee asset {}",
            terms.penalty_asset, terms.fee_asset
        )));
    }

    let subscriber_record = token_record(
        source,
        config.account_policy_id,
        &request.subscriber_id,
        "subscriber account token",
    )?;
    let subscriber_token = AssetId::token(config.account_policy_id, request.subscriber_id.clone());
    let payment_token = payment_token_at(config, &payment_record)?;

    let locked = locked_fee(&payment_record, &terms.fee_asset, &schedule)?;
    let outcome = compute_exit(&schedule, &terms, locked, request.current_time)?;

    let mut plan = TransactionPlan::new();
    plan.consume(subscriber_record.clone())
        .consume(payment_record.clone())
        .read(service_record.clone());

    plan.pay(
        wallet.clone(),
        Value::single(terms.fee_asset.clone(), outcome.refund()).with(subscriber_token, 1),
        None,
    );

    match &outcome {
        ExitOutcome::Free { .. } => {
            plan.mint(payment_token, -1, PaymentMintRedeemer::TerminateSubscription);
        }
        ExitOutcome::Penalized {
            penalty,
            penalty_amount,
            ..
        } => {
            plan.pay(
                config.payment_address.clone(),
                Value::single(terms.penalty_asset.clone(), *penalty_amount).with(payment_token, 1),
                Some(PaymentValidatorDatum::Penalty(penalty.clone()).encode()?),
            );
        }
    }

    let redeemer = PaymentSpendRedeemer::Unsubscribe {
        service_ref_input_index: reference_index(&plan, &service_record.id)?,
        subscriber_input_index: input_index(&plan, &subscriber_record.id)?,
        payment_input_index: input_index(&plan, &payment_record.id)?,
        penalty_output_index: PENALTY_OUTPUT_INDEX,
    };
    plan.attach_redeemer(&payment_record.id, redeemer);
    plan.valid_from(request.current_time);

    info!(
        service_id = %request.service_id,
        subscriber_id = %request.subscriber_id,
        refund = outcome.refund(),
        penalized = matches!(outcome, ExitOutcome::Penalized { .. }),
        "planned unsubscribe"
    );

    Ok(Transition {
        plan,
        state: SubscriptionState::Exited,
    })
}
