use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::PaymentValidatorDatum;
use crate::encoding::Encodable;
use crate::error::{IntegrityError, SubscriptionError};
use crate::installments::{extend, extension_cost};
use crate::lifecycle::SubscriptionState;
use crate::plan::{TransactionPlan, Transition};
use crate::redeemer::PaymentSpendRedeemer;
use crate::sdk::{input_index, reference_index, service_terms, token_record};
use crate::selection::select_records;
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName, Record, Timestamp, Value};

use super::{ensure_not_exited, find_schedule, locked_fee};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendSubscriptionRequest {
    pub service_id: AssetName,
    pub subscriber_id: AssetName,
    pub extension_intervals: u64,
    pub current_time: Timestamp,
}

/// Adds billing intervals to a running subscription and locks their fees.
///
/// # Errors
///
/// Returns an error if:
/// - No schedule exists for the pair, or it has already ended
/// - The service is missing or inactive
/// - The wallet cannot fund the extension
pub fn extend_subscription<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &ExtendSubscriptionRequest,
) -> Result<Transition, SubscriptionError> {
    let (payment_record, schedule) =
        find_schedule(config, source, &request.service_id, &request.subscriber_id)?;
    ensure_not_exited(&schedule, request.current_time, "extend")?;

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

    let extended = extend(&schedule, &terms, request.extension_intervals)?;
    let cost = extension_cost(&terms, request.extension_intervals)?;
    let locked = locked_fee(&payment_record, &terms.fee_asset, &schedule)?;
    let new_locked = locked.checked_add(cost).ok_or(IntegrityError::Overflow {
        operation: "adding extension cost to locked value",
    })?;

    let candidates: Vec<Record> = std::iter::once(subscriber_record.clone())
        .chain(
            source
                .records_at(wallet)
                .into_iter()
                .filter(|record| record.id != subscriber_record.id),
        )
        .collect();
    let funding = select_records(&candidates, &Value::single(terms.fee_asset.clone(), cost))?;

    let datum = PaymentValidatorDatum::Payment(extended);
    let state = SubscriptionState::of(Some(&datum), request.current_time);

    let mut plan = TransactionPlan::new();
    plan.consume(subscriber_record)
        .consume_all(funding.into_iter().cloned())
        .consume(payment_record.clone())
        .read(service_record.clone());

    plan.pay(wallet.clone(), Value::single(subscriber_token, 1), None);
    let payment_output_index = plan.pay(
        config.payment_address.clone(),
        payment_record.value.clone().with(terms.fee_asset.clone(), new_locked),
        Some(datum.encode()?),
    );

    let redeemer = PaymentSpendRedeemer::Extend {
        service_ref_input_index: reference_index(&plan, &service_record.id)?,
        payment_input_index: input_index(&plan, &payment_record.id)?,
        payment_output_index,
        extension_intervals: request.extension_intervals,
    };
    plan.attach_redeemer(&payment_record.id, redeemer);

    info!(
        service_id = %request.service_id,
        subscriber_id = %request.subscriber_id,
        intervals = request.extension_intervals,
        cost,
        new_locked,
        "planned subscription extension"
    );

    Ok(Transition { plan, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{PenaltySchedule, fetch_schedule};
    use crate::redeemer::Redeemer;
    use crate::sdk::fixtures::{FEE, Fixture, INTERVAL, START};
    use crate::types::{RecordId, TxHash};

    fn request(fixture: &Fixture, intervals: u64) -> ExtendSubscriptionRequest {
        ExtendSubscriptionRequest {
            service_id: fixture.service.ref_name.clone(),
            subscriber_id: fixture.account.user_name.clone(),
            extension_intervals: intervals,
            current_time: START,
        }
    }

    #[test]
    fn extend_relocks_with_added_fees() {
        let fixture = Fixture::subscribed();
        let transition = extend_subscription(
            &fixture.config,
            &fixture.source,
            &fixture.subscriber_wallet,
            &request(&fixture, 2),
        )
        .expect("extend plans");
        let plan = &transition.plan;

        assert_eq!(transition.state, SubscriptionState::Active);
        assert!(plan.minted().is_empty());

        let payment = &plan.outputs()[1];
        assert_eq!(payment.value.get(&AssetId::Lovelace), FEE * 5);
        assert_eq!(payment.value.get(&fixture.payment_token()), 1);

        let relocked = Record::new(RecordId::new(TxHash([0; 32]), 0), payment.address.clone(), payment.value.clone())
            .with_datum(payment.datum.clone().expect("datum"));
        let PaymentValidatorDatum::Payment(schedule) = fetch_schedule(&relocked).expect("decodes") else {
            panic!("expected payment datum");
        };
        assert_eq!(schedule.installments.len(), 5);
        assert_eq!(schedule.subscription_end, START + INTERVAL * 5);
        assert_eq!(schedule.original_subscription_end, START + INTERVAL * 3);

        let payment_input = plan
            .inputs()
            .iter()
            .find(|input| input.record.address == fixture.config.payment_address)
            .expect("payment consumed");
        let Some(Redeemer::PaymentSpend(PaymentSpendRedeemer::Extend {
            payment_input_index,
            payment_output_index,
            extension_intervals,
            ..
        })) = plan.redeemer_for(&payment_input.record.id)
        else {
            panic!("expected extend redeemer");
        };
        assert_eq!(Some(*payment_input_index), plan.input_index(&payment_input.record.id));
        assert_eq!(*payment_output_index, 1);
        assert_eq!(*extension_intervals, 2);
    }

    #[test]
    fn extend_requires_existing_schedule() {
        let mut fixture = Fixture::registered();
        let penalty = PaymentValidatorDatum::Penalty(PenaltySchedule {
            service_id: fixture.service.ref_name.clone(),
            subscriber_id: fixture.account.user_name.clone(),
        });
        fixture.lock_datum(penalty.encode().expect("encodes"), FEE);

        let err = extend_subscription(
            &fixture.config,
            &fixture.source,
            &fixture.subscriber_wallet,
            &request(&fixture, 1),
        )
        .expect_err("penalty is not a schedule");
        assert!(matches!(err, SubscriptionError::LookupMiss { .. }));
    }

    #[test]
    fn extend_rejects_drained_schedule_after_end() {
        let mut fixture = Fixture::registered();
        let mut schedule = fixture.schedule();
        schedule.installments.clear();
        fixture.lock_schedule(&schedule, 0);

        let mut request = request(&fixture, 1);
        request.current_time = schedule.subscription_end;

        let err = extend_subscription(
            &fixture.config,
            &fixture.source,
            &fixture.subscriber_wallet,
            &request,
        )
        .expect_err("exited");
        assert!(matches!(
            err,
            SubscriptionError::InvalidTransition {
                state: SubscriptionState::Exited,
                transition: "extend"
            }
        ));
    }

    #[test]
    fn extend_rejects_zero_intervals() {
        let fixture = Fixture::subscribed();
        let err = extend_subscription(
            &fixture.config,
            &fixture.source,
            &fixture.subscriber_wallet,
            &request(&fixture, 0),
        )
        .expect_err("zero intervals");
        assert!(matches!(err, SubscriptionError::InvalidArgument(_)));
    }
}
