use crate::lifecycle::SubscriptionState;
use crate::types::{AssetName, Timestamp, Value};

/// Errors from parsing hex identifiers.
#[derive(Debug, thiserror::Error)]
pub enum ParseIdError {
    #[error("Invalid {kind} hex: {source}")]
    Hex {
        kind: &'static str,
        source: hex::FromHexError,
    },

    #[error("Asset name is {len} bytes long, at most {max} allowed")]
    AssetNameTooLong { len: usize, max: usize },

    #[error("Invalid asset unit '{0}': expected 'lovelace' or policy id followed by asset name")]
    InvalidUnit(String),

    #[error("Invalid record id '{0}': expected <origin>#<position>")]
    InvalidRecordId(String),
}

/// Errors that occur during binary or hex encoding/decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Failed to encode to binary: {0}")]
    BinaryEncode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode from binary: {0}")]
    BinaryDecode(#[from] bincode::error::DecodeError),

    #[error("Failed to decode hex string: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Trailing bytes after decoding: consumed {consumed} of {total}")]
    TrailingBytes { consumed: usize, total: usize },
}

/// Errors from decoding the datum attached to a record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Record {record} carries no datum")]
    MissingDatum { record: String },

    #[error("Record {record} datum does not match the expected shape: {source}")]
    Malformed {
        record: String,
        source: EncodingError,
    },

    #[error("Record {record} carries a {actual} datum, expected {expected}")]
    UnexpectedVariant {
        record: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Broken invariants detected while computing a transition.
///
/// These are never recoverable: they point at corrupted state upstream.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("Locked value {locked} cannot cover penalty {penalty}")]
    Underfunded { locked: u64, penalty: u64 },

    #[error("Locked value {locked} is below the outstanding schedule total {scheduled}")]
    LockedBelowSchedule { locked: u64, scheduled: u64 },

    #[error("Arithmetic overflow: {operation}")]
    Overflow { operation: &'static str },
}

/// Errors from locating reference/user token pairs.
#[derive(Debug, thiserror::Error)]
pub enum TokenPairError {
    #[error("No user token found under policy {policy_id}")]
    UserTokenNotFound { policy_id: String },

    #[error("No reference token matches user token {user_name}")]
    ReferenceTokenNotFound { user_name: AssetName },

    #[error("Both contract and wallet records are required to extract a token pair")]
    MissingHoldings,
}

/// Errors from coin selection.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Insufficient funds: still missing {shortfall}")]
    InsufficientFunds { shortfall: Value },
}

/// Top-level error returned by every planning operation.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("{what} not found")]
    LookupMiss { what: String },

    #[error("No installment is claimable at {at_time}")]
    NothingClaimable { at_time: Timestamp },

    #[error("Service {service_id} is not active")]
    InactiveService { service_id: AssetName },

    #[error("Subscriber {subscriber_id} already subscribes to service {service_id}")]
    AlreadySubscribed {
        service_id: AssetName,
        subscriber_id: AssetName,
    },

    #[error("Cannot {transition} a subscription in state {state:?}")]
    InvalidTransition {
        state: SubscriptionState,
        transition: &'static str,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    TokenPair(#[from] TokenPairError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}

impl SubscriptionError {
    pub(crate) fn lookup_miss(what: impl Into<String>) -> Self {
        Self::LookupMiss { what: what.into() }
    }

    /// Whether the error signals corrupted upstream state rather than a bad request.
    #[must_use]
    pub const fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}
