//! Installment schedule arithmetic.
//!
//! Every function here is pure: it takes the current schedule by reference and
//! returns the next one. Installments stay sorted by `claimable_at` through
//! every operation, and all amount and time arithmetic is checked.

use serde::Serialize;
use tracing::debug;

use crate::datum::{Installment, PaymentSchedule, PenaltySchedule, ServiceTerms, sum_installments};
use crate::error::{IntegrityError, SubscriptionError};
use crate::types::{AssetName, Timestamp};

/// Result of claiming the installments due at some time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub claimed_amount: u64,
    pub claimed_count: usize,
    /// Installments still locked, in schedule order.
    pub remaining: Vec<Installment>,
}

impl Claim {
    /// Schedule left behind after this claim.
    #[must_use]
    pub fn apply_to(&self, schedule: &PaymentSchedule) -> PaymentSchedule {
        PaymentSchedule {
            installments: self.remaining.clone(),
            ..schedule.clone()
        }
    }

    #[must_use]
    pub fn empties_schedule(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// How a subscriber leaves a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExitOutcome {
    /// The original term has elapsed; everything locked goes back.
    Free { refund: u64 },
    /// Early exit; `penalty_amount` stays locked under `penalty` for the merchant.
    Penalized {
        refund: u64,
        penalty: PenaltySchedule,
        penalty_amount: u64,
    },
}

impl ExitOutcome {
    #[must_use]
    pub const fn refund(&self) -> u64 {
        match self {
            Self::Free { refund } | Self::Penalized { refund, .. } => *refund,
        }
    }
}

fn overflow(operation: &'static str) -> IntegrityError {
    IntegrityError::Overflow { operation }
}

/// `count` installments of `fee_amount`, dated `anchor + interval_length * k`
/// for `k = 1..=count`.
fn dated_installments(
    anchor: Timestamp,
    terms: &ServiceTerms,
    count: u64,
) -> Result<Vec<Installment>, IntegrityError> {
    (1..=count)
        .map(|k| {
            terms
                .interval_length
                .checked_mul(k)
                .and_then(|offset| anchor.checked_add(offset))
                .map(|claimable_at| Installment::new(claimable_at, terms.fee_amount))
                .ok_or_else(|| overflow("dating installments"))
        })
        .collect()
}

/// Initial schedule for a subscription starting at `subscription_start`.
///
/// # Errors
///
/// Returns [`SubscriptionError::InvalidArgument`] for terms that cannot yield a
/// schedule and an integrity error if the dates overflow.
pub fn new_schedule(
    service_id: AssetName,
    subscriber_id: AssetName,
    terms: &ServiceTerms,
    subscription_start: Timestamp,
) -> Result<PaymentSchedule, SubscriptionError> {
    terms.validate().map_err(SubscriptionError::InvalidArgument)?;

    let installments = dated_installments(subscription_start, terms, terms.num_intervals)?;
    let subscription_end = terms
        .interval_length
        .checked_mul(terms.num_intervals)
        .and_then(|length| subscription_start.checked_add(length))
        .ok_or_else(|| overflow("computing subscription end"))?;

    Ok(PaymentSchedule {
        service_id,
        subscriber_id,
        subscription_start,
        subscription_end,
        original_subscription_end: subscription_end,
        installments,
    })
}

/// Claims every installment due at `at_time`.
///
/// The claimable prefix ends at the first installment dated after `at_time`.
///
/// # Errors
///
/// Returns [`SubscriptionError::NothingClaimable`] if no installment is due,
/// which includes an empty schedule.
pub fn claim(schedule: &PaymentSchedule, at_time: Timestamp) -> Result<Claim, SubscriptionError> {
    let claimed_count = schedule
        .installments
        .iter()
        .position(|installment| installment.claimable_at > at_time)
        .unwrap_or(schedule.installments.len());

    if claimed_count == 0 {
        return Err(SubscriptionError::NothingClaimable { at_time });
    }

    let (claimed, remaining) = schedule.installments.split_at(claimed_count);
    let claimed_amount = sum_installments(claimed)?;

    debug!(
        at_time,
        claimed_count,
        claimed_amount,
        remaining = remaining.len(),
        "claimed installments"
    );

    Ok(Claim {
        claimed_amount,
        claimed_count,
        remaining: remaining.to_vec(),
    })
}

/// Extends `schedule` by `additional_intervals` billing intervals.
///
/// New installments follow the current `subscription_end`;
/// `original_subscription_end` is left untouched.
///
/// # Errors
///
/// Returns [`SubscriptionError::InvalidArgument`] for a zero interval count or
/// zero interval length and an integrity error on overflow.
pub fn extend(
    schedule: &PaymentSchedule,
    terms: &ServiceTerms,
    additional_intervals: u64,
) -> Result<PaymentSchedule, SubscriptionError> {
    if additional_intervals == 0 {
        return Err(SubscriptionError::InvalidArgument(
            "extension must add at least one interval".to_string(),
        ));
    }
    if terms.interval_length == 0 {
        return Err(SubscriptionError::InvalidArgument(
            "interval length must be positive".to_string(),
        ));
    }

    let appended = dated_installments(schedule.subscription_end, terms, additional_intervals)?;
    let subscription_end = terms
        .interval_length
        .checked_mul(additional_intervals)
        .and_then(|length| schedule.subscription_end.checked_add(length))
        .ok_or_else(|| overflow("extending subscription end"))?;

    let mut installments = Vec::with_capacity(schedule.installments.len() + appended.len());
    installments.extend_from_slice(&schedule.installments);
    installments.extend(appended);

    Ok(PaymentSchedule {
        subscription_end,
        installments,
        ..schedule.clone()
    })
}

/// Value a subscription extension adds to the locked amount.
///
/// # Errors
///
/// Returns an integrity error on overflow.
pub fn extension_cost(terms: &ServiceTerms, additional_intervals: u64) -> Result<u64, IntegrityError> {
    terms
        .fee_amount
        .checked_mul(additional_intervals)
        .ok_or_else(|| overflow("computing extension cost"))
}

/// Decides how a subscriber exits at `at_time` given the value locked with
/// `schedule`.
///
/// # Errors
///
/// Returns [`IntegrityError::Underfunded`] if an early exit cannot cover the
/// penalty.
pub fn compute_exit(
    schedule: &PaymentSchedule,
    terms: &ServiceTerms,
    locked_value: u64,
    at_time: Timestamp,
) -> Result<ExitOutcome, SubscriptionError> {
    if at_time >= schedule.original_subscription_end {
        return Ok(ExitOutcome::Free {
            refund: locked_value,
        });
    }

    let refund = locked_value
        .checked_sub(terms.penalty_amount)
        .ok_or(IntegrityError::Underfunded {
            locked: locked_value,
            penalty: terms.penalty_amount,
        })?;

    Ok(ExitOutcome::Penalized {
        refund,
        penalty: PenaltySchedule {
            service_id: schedule.service_id.clone(),
            subscriber_id: schedule.subscriber_id.clone(),
        },
        penalty_amount: terms.penalty_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetId;

    fn terms() -> ServiceTerms {
        ServiceTerms {
            fee_asset: AssetId::Lovelace,
            fee_amount: 10,
            penalty_asset: AssetId::Lovelace,
            penalty_amount: 4,
            interval_length: 100,
            num_intervals: 3,
            is_active: true,
        }
    }

    fn schedule() -> PaymentSchedule {
        new_schedule(
            AssetName::new(vec![0xaa; 32]).expect("name"),
            AssetName::new(vec![0xbb; 32]).expect("name"),
            &terms(),
            0,
        )
        .expect("valid terms")
    }

    #[test]
    fn new_schedule_dates_installments_from_start() {
        let schedule = schedule();

        assert_eq!(
            schedule.installments,
            vec![
                Installment::new(100, 10),
                Installment::new(200, 10),
                Installment::new(300, 10),
            ]
        );
        assert_eq!(schedule.subscription_end, 300);
        assert_eq!(schedule.original_subscription_end, 300);
    }

    #[test]
    fn new_schedule_rejects_degenerate_terms() {
        let mut terms = terms();
        terms.num_intervals = 0;

        let err = new_schedule(AssetName::default(), AssetName::default(), &terms, 0)
            .expect_err("zero intervals");
        assert!(matches!(err, SubscriptionError::InvalidArgument(_)));
    }

    #[test]
    fn claim_takes_due_prefix() {
        let claim = claim(&schedule(), 150).expect("one installment due");

        assert_eq!(claim.claimed_amount, 10);
        assert_eq!(claim.claimed_count, 1);
        assert_eq!(
            claim.remaining,
            vec![Installment::new(200, 10), Installment::new(300, 10)]
        );
    }

    #[test]
    fn claim_boundary_is_inclusive() {
        let claim = claim(&schedule(), 200).expect("two due");
        assert_eq!(claim.claimed_count, 2);
        assert!(claim.remaining.iter().all(|installment| installment.claimable_at > 200));
    }

    #[test]
    fn claim_past_end_takes_everything() {
        let claim = claim(&schedule(), 10_000).expect("all due");

        assert_eq!(claim.claimed_amount, 30);
        assert!(claim.empties_schedule());
    }

    #[test]
    fn repeated_claim_at_same_time_yields_nothing() {
        let schedule = schedule();
        let first = claim(&schedule, 250).expect("two due");
        let rest = first.apply_to(&schedule);

        let err = claim(&rest, 250).expect_err("already claimed");
        assert!(matches!(err, SubscriptionError::NothingClaimable { at_time: 250 }));
    }

    #[test]
    fn claim_before_first_installment_and_on_empty_schedule_fails() {
        let schedule = schedule();
        let err = claim(&schedule, 99).expect_err("nothing due");
        assert!(matches!(err, SubscriptionError::NothingClaimable { .. }));

        let empty = PaymentSchedule {
            installments: Vec::new(),
            ..schedule
        };
        let err = claim(&empty, u64::MAX).expect_err("empty");
        assert!(matches!(err, SubscriptionError::NothingClaimable { .. }));
    }

    #[test]
    fn extend_appends_after_current_end() {
        let schedule = schedule();
        let extended = extend(&schedule, &terms(), 2).expect("extends");

        assert_eq!(extended.subscription_end, schedule.subscription_end + 200);
        assert_eq!(extended.original_subscription_end, schedule.original_subscription_end);
        assert_eq!(
            &extended.installments[3..],
            &[Installment::new(400, 10), Installment::new(500, 10)]
        );
        assert!(extended.is_ordered());
        assert_eq!(extension_cost(&terms(), 2).expect("no overflow"), 20);
    }

    #[test]
    fn extend_after_partial_claim_keeps_order() {
        let schedule = schedule();
        let claimed = claim(&schedule, 300).expect("all due").apply_to(&schedule);
        let extended = extend(&claimed, &terms(), 1).expect("extends");

        assert_eq!(extended.installments, vec![Installment::new(400, 10)]);
        assert_eq!(extended.subscription_end, 400);
    }

    #[test]
    fn extend_rejects_zero_intervals() {
        let err = extend(&schedule(), &terms(), 0).expect_err("zero intervals");
        assert!(matches!(err, SubscriptionError::InvalidArgument(_)));
    }

    #[test]
    fn extend_reports_overflow_as_integrity_violation() {
        let mut terms = terms();
        terms.interval_length = u64::MAX;

        let err = extend(&schedule(), &terms, 2).expect_err("overflows");
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn exit_at_original_end_is_free() {
        let outcome = compute_exit(&schedule(), &terms(), 30, 300).expect("free exit");
        assert_eq!(outcome, ExitOutcome::Free { refund: 30 });
    }

    #[test]
    fn early_exit_leaves_penalty_locked() {
        let schedule = schedule();
        let outcome = compute_exit(&schedule, &terms(), 30, 299).expect("penalized exit");

        let ExitOutcome::Penalized {
            refund,
            penalty,
            penalty_amount,
        } = outcome
        else {
            panic!("expected a penalized exit");
        };
        assert_eq!(refund, 26);
        assert_eq!(penalty_amount, 4);
        assert!(penalty.belongs_to(&schedule.service_id, &schedule.subscriber_id));
    }

    #[test]
    fn early_exit_below_penalty_is_underfunded() {
        let err = compute_exit(&schedule(), &terms(), 3, 0).expect_err("underfunded");
        assert!(matches!(
            err,
            SubscriptionError::Integrity(IntegrityError::Underfunded { locked: 3, penalty: 4 })
        ));
    }
}
