//! Redeemer payloads handed to the validators.
//!
//! Input indices refer to the ledger's canonical input order and are computed
//! by [`crate::indices`]; output indices follow the order outputs were added
//! to the [`crate::plan::TransactionPlan`].

use serde::Serialize;

use crate::encoding::Encodable;
use crate::types::AssetName;

/// Payment token minting policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, bincode::Encode, bincode::Decode)]
pub enum PaymentMintRedeemer {
    InitSubscription {
        service_ref_input_index: u64,
        subscriber_input_index: u64,
        payment_output_index: u64,
    },
    TerminateSubscription,
}

/// Payment validator spend paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, bincode::Encode, bincode::Decode)]
pub enum PaymentSpendRedeemer {
    Extend {
        service_ref_input_index: u64,
        payment_input_index: u64,
        payment_output_index: u64,
        extension_intervals: u64,
    },
    MerchantWithdraw {
        service_ref_input_index: u64,
        merchant_input_index: u64,
        payment_input_index: u64,
        payment_output_index: u64,
        installments_withdrawn: u64,
    },
    Unsubscribe {
        service_ref_input_index: u64,
        subscriber_input_index: u64,
        payment_input_index: u64,
        penalty_output_index: u64,
    },
    SubscriberWithdraw {
        service_ref_input_index: u64,
        subscriber_input_index: u64,
        payment_input_index: u64,
    },
}

/// Service and account minting policies share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, bincode::Encode, bincode::Decode)]
pub enum RegistryMintRedeemer {
    Create { input_index: u64, output_index: u64 },
    Delete { reference_token_name: AssetName },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, bincode::Encode, bincode::Decode)]
pub enum ServiceSpendRedeemer {
    Update {
        service_ref_name: AssetName,
        merchant_input_index: u64,
        service_input_index: u64,
        service_output_index: u64,
    },
    Remove {
        service_ref_name: AssetName,
        merchant_input_index: u64,
        service_input_index: u64,
        service_output_index: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, bincode::Encode, bincode::Decode)]
pub enum AccountSpendRedeemer {
    Update {
        account_ref_name: AssetName,
        subscriber_input_index: u64,
        account_input_index: u64,
        account_output_index: u64,
    },
    Remove {
        account_ref_name: AssetName,
        subscriber_input_index: u64,
        account_input_index: u64,
    },
}

impl Encodable for PaymentMintRedeemer {}
impl Encodable for PaymentSpendRedeemer {}
impl Encodable for RegistryMintRedeemer {}
impl Encodable for ServiceSpendRedeemer {}
impl Encodable for AccountSpendRedeemer {}

/// Any redeemer a plan can attach to an input or a mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Redeemer {
    PaymentMint(PaymentMintRedeemer),
    PaymentSpend(PaymentSpendRedeemer),
    RegistryMint(RegistryMintRedeemer),
    ServiceSpend(ServiceSpendRedeemer),
    AccountSpend(AccountSpendRedeemer),
}

impl Redeemer {
    /// Encoded payload of the wrapped redeemer.
    ///
    /// # Errors
    ///
    /// Returns an error if binary encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, crate::error::EncodingError> {
        match self {
            Self::PaymentMint(redeemer) => Encodable::encode(redeemer),
            Self::PaymentSpend(redeemer) => Encodable::encode(redeemer),
            Self::RegistryMint(redeemer) => Encodable::encode(redeemer),
            Self::ServiceSpend(redeemer) => Encodable::encode(redeemer),
            Self::AccountSpend(redeemer) => Encodable::encode(redeemer),
        }
    }

    /// Fields holding an input or reference-input index, in declaration order.
    ///
    /// Output indices are not included: outputs are only ever appended.
    pub(crate) fn index_slots_mut(&mut self) -> Vec<(IndexTarget, &mut u64)> {
        use IndexTarget::{Input, Reference};

        match self {
            Self::PaymentMint(PaymentMintRedeemer::InitSubscription {
                service_ref_input_index,
                subscriber_input_index,
                ..
            }) => vec![
                (Reference, service_ref_input_index),
                (Input, subscriber_input_index),
            ],
            Self::PaymentMint(PaymentMintRedeemer::TerminateSubscription)
            | Self::RegistryMint(RegistryMintRedeemer::Delete { .. }) => Vec::new(),
            Self::PaymentSpend(PaymentSpendRedeemer::Extend {
                service_ref_input_index,
                payment_input_index,
                ..
            }) => vec![
                (Reference, service_ref_input_index),
                (Input, payment_input_index),
            ],
            Self::PaymentSpend(PaymentSpendRedeemer::MerchantWithdraw {
                service_ref_input_index,
                merchant_input_index: party_input_index,
                payment_input_index,
                ..
            })
            | Self::PaymentSpend(PaymentSpendRedeemer::Unsubscribe {
                service_ref_input_index,
                subscriber_input_index: party_input_index,
                payment_input_index,
                ..
            })
            | Self::PaymentSpend(PaymentSpendRedeemer::SubscriberWithdraw {
                service_ref_input_index,
                subscriber_input_index: party_input_index,
                payment_input_index,
            }) => vec![
                (Reference, service_ref_input_index),
                (Input, party_input_index),
                (Input, payment_input_index),
            ],
            Self::RegistryMint(RegistryMintRedeemer::Create { input_index, .. }) => {
                vec![(Input, input_index)]
            }
            Self::ServiceSpend(
                ServiceSpendRedeemer::Update {
                    merchant_input_index: owner_input_index,
                    service_input_index: entity_input_index,
                    ..
                }
                | ServiceSpendRedeemer::Remove {
                    merchant_input_index: owner_input_index,
                    service_input_index: entity_input_index,
                    ..
                },
            )
            | Self::AccountSpend(
                AccountSpendRedeemer::Update {
                    subscriber_input_index: owner_input_index,
                    account_input_index: entity_input_index,
                    ..
                }
                | AccountSpendRedeemer::Remove {
                    subscriber_input_index: owner_input_index,
                    account_input_index: entity_input_index,
                    ..
                },
            ) => vec![(Input, owner_input_index), (Input, entity_input_index)],
        }
    }
}

/// Ordered set an index field points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexTarget {
    Input,
    Reference,
}

macro_rules! impl_from_redeemer {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Redeemer {
                fn from(redeemer: $ty) -> Self {
                    Self::$variant(redeemer)
                }
            }
        )*
    };
}

impl_from_redeemer!(
    PaymentMint => PaymentMintRedeemer,
    PaymentSpend => PaymentSpendRedeemer,
    RegistryMint => RegistryMintRedeemer,
    ServiceSpend => ServiceSpendRedeemer,
    AccountSpend => AccountSpendRedeemer,
);
