//! Off-chain core of the payment subscription protocol.
//!
//! Merchants register services, subscribers register accounts and lock
//! prepaid installments against a service. Every operation reads current
//! ledger state through a [`RecordSource`] and returns an unsigned
//! [`TransactionPlan`] for a wallet to balance, sign and submit.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![cfg_attr(
    test,
    allow(
        clippy::cast_possible_truncation,
        clippy::needless_pass_by_value,
        clippy::too_many_lines
    )
)]

pub mod asset_name;
pub mod config;
pub mod datum;
pub mod encoding;
pub mod error;
pub mod indices;
pub mod installments;
pub mod lifecycle;
pub mod plan;
pub mod redeemer;
pub mod sdk;
pub mod selection;
pub mod source;
pub mod types;

pub use asset_name::{TokenPair, derive_asset_name};
pub use config::{Network, ProtocolConfig};
pub use datum::{
    AccountDatum, Installment, PaymentSchedule, PaymentValidatorDatum, PenaltySchedule,
    ServiceTerms,
};
pub use encoding::Encodable;
pub use error::SubscriptionError;
pub use indices::{canonical_order, resolve_index, resolve_indices};
pub use installments::{Claim, ExitOutcome};
pub use lifecycle::SubscriptionState;
pub use plan::{TransactionPlan, Transition};
pub use redeemer::Redeemer;
pub use selection::select_records;
pub use source::{MemorySource, RecordSource};
pub use types::{
    Address, AssetId, AssetName, PolicyId, Record, RecordId, Timestamp, TxHash, Value,
};
