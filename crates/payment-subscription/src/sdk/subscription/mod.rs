//! Subscription lifecycle transitions.
//!
//! ```text
//! Uninitialized --init--> Active --extend / partial withdraw--> Active
//!                           |  \--installment due--> Withdrawing --withdraw--> Active
//!                           |                              \--final withdraw--> Exited
//!                           \----unsubscribe---------------------------------> Exited
//! ```
//!
//! Every planner takes the caller's wallet address and returns a
//! [`Transition`](crate::plan::Transition) carrying the plan and the state the
//! pair reaches once the plan lands on chain.

mod extend;
mod init;
mod merchant_withdraw;
mod penalty_withdraw;
mod subscriber_withdraw;
mod unsubscribe;

pub use extend::{ExtendSubscriptionRequest, extend_subscription};
pub use init::{InitSubscriptionRequest, init_subscription};
pub use merchant_withdraw::{MerchantWithdrawRequest, merchant_withdraw};
pub use penalty_withdraw::{PenaltyWithdrawRequest, penalty_withdraw};
pub use subscriber_withdraw::{SubscriberWithdrawRequest, subscriber_withdraw};
pub use unsubscribe::{UnsubscribeRequest, unsubscribe};

use tracing::debug;

use crate::asset_name::token_name_from_records;
use crate::config::ProtocolConfig;
use crate::datum::{
    PaymentSchedule, PaymentValidatorDatum, PenaltySchedule, payment_schedules, penalty_schedules,
};
use crate::error::{IntegrityError, SubscriptionError};
use crate::lifecycle::SubscriptionState;
use crate::source::RecordSource;
use crate::types::{AssetId, AssetName, Record, Timestamp};

/// Payment record and schedule of the pair, if one exists.
pub(crate) fn lookup_schedule<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    service_id: &AssetName,
    subscriber_id: &AssetName,
) -> Option<(Record, PaymentSchedule)> {
    let records = source.records_at(&config.payment_address);
    let found = payment_schedules(&records)
        .find(|(_, schedule)| schedule.belongs_to(service_id, subscriber_id))
        .map(|(record, schedule)| (record.clone(), schedule));

    debug!(
        %service_id,
        %subscriber_id,
        scanned = records.len(),
        found = found.is_some(),
        "payment schedule lookup"
    );
    found
}

pub(crate) fn find_schedule<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    service_id: &AssetName,
    subscriber_id: &AssetName,
) -> Result<(Record, PaymentSchedule), SubscriptionError> {
    lookup_schedule(config, source, service_id, subscriber_id).ok_or_else(|| {
        SubscriptionError::lookup_miss(format!(
            "subscription of {subscriber_id} to service {service_id}"
        ))
    })
}

pub(crate) fn find_penalty<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    service_id: &AssetName,
    subscriber_id: &AssetName,
) -> Result<(Record, PenaltySchedule), SubscriptionError> {
    let records = source.records_at(&config.payment_address);
    penalty_schedules(&records)
        .find(|(_, penalty)| penalty.belongs_to(service_id, subscriber_id))
        .map(|(record, penalty)| (record.clone(), penalty))
        .ok_or_else(|| {
            SubscriptionError::lookup_miss(format!(
                "penalty of {subscriber_id} for service {service_id}"
            ))
        })
}

/// Payment token locked at `record`, falling back to the configured name.
pub(crate) fn payment_token_at(
    config: &ProtocolConfig,
    record: &Record,
) -> Result<AssetId, SubscriptionError> {
    match token_name_from_records(std::slice::from_ref(record), &config.payment_policy_id) {
        Some(name) => Ok(AssetId::token(config.payment_policy_id, name)),
        None => Ok(config.payment_token()?),
    }
}

/// Fee asset value locked with `schedule`, checked against its outstanding total.
pub(crate) fn locked_fee(
    record: &Record,
    fee_asset: &AssetId,
    schedule: &PaymentSchedule,
) -> Result<u64, SubscriptionError> {
    let locked = record.value.get(fee_asset);
    let scheduled = schedule.outstanding()?;
    if locked < scheduled {
        return Err(IntegrityError::LockedBelowSchedule { locked, scheduled }.into());
    }
    Ok(locked)
}

/// Rejects a transition out of a terminal state.
pub(crate) fn ensure_not_exited(
    schedule: &PaymentSchedule,
    now: Timestamp,
    transition: &'static str,
) -> Result<(), SubscriptionError> {
    let state = SubscriptionState::of(
        Some(&PaymentValidatorDatum::Payment(schedule.clone())),
        now,
    );
    if state.is_terminal() {
        return Err(SubscriptionError::InvalidTransition { state, transition });
    }
    Ok(())
}

/// State of the schedule a withdrawal leaves behind, as seen at `current_time`.
///
/// A drained schedule at or past `subscription_end` is `Exited`; otherwise
/// the pair is `Active` again unless a later installment is already due.
pub(crate) fn state_after_withdraw(next: &PaymentSchedule, current_time: Timestamp) -> SubscriptionState {
    SubscriptionState::of(
        Some(&PaymentValidatorDatum::Payment(next.clone())),
        current_time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::fixtures::{FEE, Fixture};

    #[test]
    fn schedule_lookup_ignores_other_pairs() {
        let mut fixture = Fixture::subscribed();
        let mut foreign = fixture.schedule();
        foreign.subscriber_id = AssetName::from_text("someone-else").expect("name");
        fixture.lock_schedule(&foreign, FEE * 3);

        let (_, schedule) = find_schedule(
            &fixture.config,
            &fixture.source,
            &fixture.service.ref_name,
            &fixture.account.user_name,
        )
        .expect("own schedule found");
        assert_eq!(schedule, fixture.schedule());

        let err = find_penalty(
            &fixture.config,
            &fixture.source,
            &fixture.service.ref_name,
            &fixture.account.user_name,
        )
        .expect_err("no penalty yet");
        assert!(matches!(err, SubscriptionError::LookupMiss { .. }));
    }

    #[test]
    fn locked_value_below_schedule_is_integrity_violation() {
        let mut fixture = Fixture::registered();
        let schedule = fixture.schedule();
        let record = fixture.lock_schedule(&schedule, FEE);

        let err = locked_fee(&record, &AssetId::Lovelace, &schedule).expect_err("underfunded");
        assert!(err.is_integrity_violation());
        assert_eq!(payment_token_at(&fixture.config, &record).expect("token"), fixture.payment_token());
    }
}
