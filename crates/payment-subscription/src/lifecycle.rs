use serde::Serialize;

use crate::datum::PaymentValidatorDatum;
use crate::types::Timestamp;

/// Lifecycle state of one subscriber/service pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubscriptionState {
    /// No schedule exists for the pair.
    Uninitialized,
    /// Schedule exists and nothing is due yet.
    Active,
    /// At least one installment is due for withdrawal.
    Withdrawing,
    /// Terminal: the schedule has been drained or replaced by a penalty.
    Exited,
}

impl SubscriptionState {
    /// Classifies the on-chain datum of a pair at time `now`.
    #[must_use]
    pub fn of(datum: Option<&PaymentValidatorDatum>, now: Timestamp) -> Self {
        match datum {
            None => Self::Uninitialized,
            Some(PaymentValidatorDatum::Penalty(_)) => Self::Exited,
            Some(PaymentValidatorDatum::Payment(schedule)) => match schedule.installments.first() {
                None if now >= schedule.subscription_end => Self::Exited,
                None => Self::Active,
                Some(first) if first.claimable_at <= now => Self::Withdrawing,
                Some(_) => Self::Active,
            },
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active | Self::Withdrawing)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Installment, PaymentSchedule, PenaltySchedule};
    use crate::types::AssetName;

    fn payment(installments: Vec<Installment>) -> PaymentValidatorDatum {
        PaymentValidatorDatum::Payment(PaymentSchedule {
            service_id: AssetName::default(),
            subscriber_id: AssetName::default(),
            subscription_start: 0,
            subscription_end: 200,
            original_subscription_end: 200,
            installments,
        })
    }

    #[test]
    fn classifies_schedule_by_due_installments() {
        let datum = payment(vec![Installment::new(100, 5), Installment::new(200, 5)]);

        assert_eq!(SubscriptionState::of(None, 0), SubscriptionState::Uninitialized);
        assert_eq!(SubscriptionState::of(Some(&datum), 99), SubscriptionState::Active);
        assert_eq!(SubscriptionState::of(Some(&datum), 100), SubscriptionState::Withdrawing);
    }

    #[test]
    fn drained_schedule_exits_only_after_end() {
        let datum = payment(Vec::new());

        assert_eq!(SubscriptionState::of(Some(&datum), 150), SubscriptionState::Active);
        assert_eq!(SubscriptionState::of(Some(&datum), 200), SubscriptionState::Exited);
    }

    #[test]
    fn penalty_is_terminal() {
        let datum = PaymentValidatorDatum::Penalty(PenaltySchedule {
            service_id: AssetName::default(),
            subscriber_id: AssetName::default(),
        });

        let state = SubscriptionState::of(Some(&datum), 0);
        assert!(state.is_terminal());
        assert!(!state.is_active());
    }
}
