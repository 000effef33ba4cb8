use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::error::SubscriptionError;
use crate::lifecycle::SubscriptionState;
use crate::plan::{TransactionPlan, Transition};
use crate::redeemer::{PaymentMintRedeemer, PaymentSpendRedeemer};
use crate::sdk::{input_index, reference_index, service_terms, token_record};
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName};

use super::{find_penalty, payment_token_at};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyWithdrawRequest {
    pub service_id: AssetName,
    pub merchant_id: AssetName,
    pub subscriber_id: AssetName,
}

/// Pays a forfeited penalty to the merchant and burns the payment token.
///
/// # Errors
///
/// Returns an error if no penalty exists for the pair or the service or
/// merchant token is missing.
pub fn penalty_withdraw<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &PenaltyWithdrawRequest,
) -> Result<Transition, SubscriptionError> {
    let (penalty_record, _) =
        find_penalty(config, source, &request.service_id, &request.subscriber_id)?;
    let (service_record, _) = service_terms(config, source, &request.service_id)?;
    let merchant_record = token_record(
        source,
        config.service_policy_id,
        &request.merchant_id,
        "merchant token",
    )?;
    let merchant_token = AssetId::token(config.service_policy_id, request.merchant_id.clone());
    let payment_token = payment_token_at(config, &penalty_record)?;

    let merchant_input = merchant_record.id;
    let mut plan = TransactionPlan::new();
    plan.consume_all(source.records_at(wallet))
        .consume(merchant_record)
        .consume(penalty_record.clone())
        .read(service_record.clone());

    let payout = penalty_record.value.clone().without(&payment_token);
    let payout_index = plan.pay(wallet.clone(), payout.clone().with(merchant_token, 1), None);
    plan.mint(payment_token, -1, PaymentMintRedeemer::TerminateSubscription);

    let redeemer = PaymentSpendRedeemer::MerchantWithdraw {
        service_ref_input_index: reference_index(&plan, &service_record.id)?,
        merchant_input_index: input_index(&plan, &merchant_input)?,
        payment_input_index: input_index(&plan, &penalty_record.id)?,
        payment_output_index: payout_index,
        installments_withdrawn: 0,
    };
    plan.attach_redeemer(&penalty_record.id, redeemer);

    info!(
        service_id = %request.service_id,
        subscriber_id = %request.subscriber_id,
        %payout,
        "planned penalty withdrawal"
    );

    Ok(Transition {
        plan,
        state: SubscriptionState::Exited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{PaymentValidatorDatum, PenaltySchedule};
    use crate::encoding::Encodable;
    use crate::redeemer::Redeemer;
    use crate::sdk::fixtures::{Fixture, PENALTY};

    fn request(fixture: &Fixture) -> PenaltyWithdrawRequest {
        PenaltyWithdrawRequest {
            service_id: fixture.service.ref_name.clone(),
            merchant_id: fixture.service.user_name.clone(),
            subscriber_id: fixture.account.user_name.clone(),
        }
    }

    fn with_penalty() -> Fixture {
        let mut fixture = Fixture::registered();
        let penalty = PaymentValidatorDatum::Penalty(PenaltySchedule {
            service_id: fixture.service.ref_name.clone(),
            subscriber_id: fixture.account.user_name.clone(),
        });
        fixture.lock_datum(penalty.encode().expect("encodes"), PENALTY);
        fixture
    }

    #[test]
    fn penalty_goes_to_merchant_and_token_burns() {
        let fixture = with_penalty();
        let transition = penalty_withdraw(
            &fixture.config,
            &fixture.source,
            &fixture.merchant_wallet,
            &request(&fixture),
        )
        .expect("penalty withdraw plans");
        let plan = &transition.plan;

        assert_eq!(transition.state, SubscriptionState::Exited);
        assert_eq!(plan.outputs().len(), 1);
        assert_eq!(plan.outputs()[0].value.get(&AssetId::Lovelace), PENALTY);
        assert_eq!(plan.outputs()[0].value.get(&fixture.merchant_token()), 1);
        assert_eq!(plan.minted().get(&fixture.payment_token()), Some(&-1));

        let spent = plan
            .inputs()
            .iter()
            .find(|input| input.redeemer.is_some())
            .expect("penalty spent");
        assert!(matches!(
            spent.redeemer,
            Some(Redeemer::PaymentSpend(PaymentSpendRedeemer::MerchantWithdraw {
                installments_withdrawn: 0,
                payment_output_index: 0,
                ..
            }))
        ));
    }

    #[test]
    fn running_subscription_has_no_penalty() {
        let fixture = Fixture::subscribed();
        let err = penalty_withdraw(
            &fixture.config,
            &fixture.source,
            &fixture.merchant_wallet,
            &request(&fixture),
        )
        .expect_err("no penalty");
        assert!(matches!(err, SubscriptionError::LookupMiss { .. }));
    }
}
