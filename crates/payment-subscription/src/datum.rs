//! Typed datums stored at the protocol's script addresses.
//!
//! A record's datum is opaque bytes until decoded here. Scans over many records
//! treat a datum that fails to decode as "not a match"; only a record that an
//! operation specifically requires turns a decode failure into an error.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::encoding::Encodable;
use crate::error::{DecodeError, IntegrityError};
use crate::types::{AssetId, AssetName, Record, Timestamp};

/// One scheduled payment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Installment {
    pub claimable_at: Timestamp,
    pub claimable_amount: u64,
}

impl Installment {
    #[must_use]
    pub const fn new(claimable_at: Timestamp, claimable_amount: u64) -> Self {
        Self {
            claimable_at,
            claimable_amount,
        }
    }
}

/// Installment schedule of one subscription.
///
/// `service_id` is the service reference token name, `subscriber_id` the
/// subscriber's account user token name.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct PaymentSchedule {
    pub service_id: AssetName,
    pub subscriber_id: AssetName,
    pub subscription_start: Timestamp,
    pub subscription_end: Timestamp,
    pub original_subscription_end: Timestamp,
    /// Ascending by `claimable_at`.
    pub installments: Vec<Installment>,
}

impl PaymentSchedule {
    #[must_use]
    pub fn belongs_to(&self, service_id: &AssetName, subscriber_id: &AssetName) -> bool {
        &self.service_id == service_id && &self.subscriber_id == subscriber_id
    }

    /// Sum of all outstanding installments.
    ///
    /// # Errors
    ///
    /// Returns an error if the sum overflows `u64`.
    pub fn outstanding(&self) -> Result<u64, IntegrityError> {
        sum_installments(&self.installments)
    }

    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.installments
            .windows(2)
            .all(|pair| pair[0].claimable_at <= pair[1].claimable_at)
    }
}

pub(crate) fn sum_installments(installments: &[Installment]) -> Result<u64, IntegrityError> {
    installments.iter().try_fold(0u64, |acc, installment| {
        acc.checked_add(installment.claimable_amount)
            .ok_or(IntegrityError::Overflow {
                operation: "summing installment amounts",
            })
    })
}

/// Forfeited value waiting for the merchant after an early exit.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct PenaltySchedule {
    pub service_id: AssetName,
    pub subscriber_id: AssetName,
}

impl PenaltySchedule {
    #[must_use]
    pub fn belongs_to(&self, service_id: &AssetName, subscriber_id: &AssetName) -> bool {
        &self.service_id == service_id && &self.subscriber_id == subscriber_id
    }
}

/// Datum held at the payment validator address.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum PaymentValidatorDatum {
    Payment(PaymentSchedule),
    Penalty(PenaltySchedule),
}

impl PaymentValidatorDatum {
    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Payment(_) => "Payment",
            Self::Penalty(_) => "Penalty",
        }
    }
}

impl Encodable for PaymentValidatorDatum {}

/// Merchant-owned service terms, held with the service reference token.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct ServiceTerms {
    pub fee_asset: AssetId,
    pub fee_amount: u64,
    pub penalty_asset: AssetId,
    pub penalty_amount: u64,
    /// Length of one billing interval in milliseconds.
    pub interval_length: u64,
    pub num_intervals: u64,
    pub is_active: bool,
}

impl ServiceTerms {
    /// Total value a new subscription locks up front.
    ///
    /// # Errors
    ///
    /// Returns an error if `fee_amount * num_intervals` overflows.
    pub fn subscription_total(&self) -> Result<u64, IntegrityError> {
        self.fee_amount
            .checked_mul(self.num_intervals)
            .ok_or(IntegrityError::Overflow {
                operation: "computing subscription total",
            })
    }

    /// Checks that the terms can produce a well-formed schedule.
    ///
    /// # Errors
    ///
    /// Returns a description of the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.fee_amount == 0 {
            return Err("service fee must be positive".to_string());
        }
        if self.interval_length == 0 {
            return Err("interval length must be positive".to_string());
        }
        if self.num_intervals == 0 {
            return Err("number of intervals must be positive".to_string());
        }
        Ok(())
    }
}

impl Encodable for ServiceTerms {}

/// Subscriber account datum with hashed contact details.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct AccountDatum {
    pub email_hash: [u8; 32],
    pub phone_hash: [u8; 32],
}

impl AccountDatum {
    #[must_use]
    pub fn from_contact(email: &str, phone: &str) -> Self {
        Self {
            email_hash: Sha256::digest(email.as_bytes()).into(),
            phone_hash: Sha256::digest(phone.as_bytes()).into(),
        }
    }
}

impl Encodable for AccountDatum {}

fn decode_datum<T>(record: &Record) -> Result<T, DecodeError>
where
    T: Encodable + bincode::Decode<()>,
{
    let bytes = record.datum.as_deref().ok_or_else(|| DecodeError::MissingDatum {
        record: record.id.to_string(),
    })?;

    <T as Encodable>::decode(bytes).map_err(|source| DecodeError::Malformed {
        record: record.id.to_string(),
        source,
    })
}

/// Decodes the payment validator datum carried by `record`.
///
/// # Errors
///
/// Returns an error if the record has no datum or the datum has another shape.
pub fn fetch_schedule(record: &Record) -> Result<PaymentValidatorDatum, DecodeError> {
    decode_datum(record)
}

/// Decodes the service terms carried by `record`.
///
/// # Errors
///
/// Returns an error if the record has no datum or the datum has another shape.
pub fn fetch_service_terms(record: &Record) -> Result<ServiceTerms, DecodeError> {
    decode_datum(record)
}

/// Decodes the account datum carried by `record`.
///
/// # Errors
///
/// Returns an error if the record has no datum or the datum has another shape.
pub fn fetch_account(record: &Record) -> Result<AccountDatum, DecodeError> {
    decode_datum(record)
}

/// Payment schedules among `records`, skipping penalties and undecodable datums.
pub fn payment_schedules(records: &[Record]) -> impl Iterator<Item = (&Record, PaymentSchedule)> {
    records
        .iter()
        .filter_map(|record| match fetch_schedule(record) {
            Ok(PaymentValidatorDatum::Payment(schedule)) => Some((record, schedule)),
            Ok(PaymentValidatorDatum::Penalty(_)) => {
                debug!(record = %record.id, "skipping penalty datum");
                None
            }
            Err(error) => {
                debug!(record = %record.id, %error, "skipping record");
                None
            }
        })
}

/// Penalty schedules among `records`, skipping payments and undecodable datums.
pub fn penalty_schedules(records: &[Record]) -> impl Iterator<Item = (&Record, PenaltySchedule)> {
    records
        .iter()
        .filter_map(|record| match fetch_schedule(record) {
            Ok(PaymentValidatorDatum::Penalty(penalty)) => Some((record, penalty)),
            Ok(PaymentValidatorDatum::Payment(_)) => None,
            Err(error) => {
                debug!(record = %record.id, %error, "skipping record");
                None
            }
        })
}
