//! Ledger-facing identifiers, value bundles and records.
//!
//! Identifiers render as lowercase hex. Byte-wise ordering of the raw arrays
//! is the same as lexicographic ordering of their hex form, which is the
//! ordering the ledger uses for transaction inputs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseIdError;

/// POSIX time in milliseconds.
pub type Timestamp = u64;

/// Maximum length of an asset name in bytes.
pub const ASSET_NAME_MAX_LEN: usize = 32;

const LOVELACE_UNIT: &str = "lovelace";

macro_rules! serde_via_str {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

macro_rules! fixed_hex_id {
    ($(#[$meta:meta])* $name:ident, $len:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode, bincode::Decode,
        )]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes).map_err(|source| ParseIdError::Hex {
                    kind: stringify!($name),
                    source,
                })?;
                Ok(Self(bytes))
            }
        }

        serde_via_str!($name);
    };
}

fixed_hex_id!(
    /// Hash of the transaction that produced a record.
    TxHash,
    32
);

fixed_hex_id!(
    /// Minting policy hash.
    PolicyId,
    28
);

/// Asset name, at most [`ASSET_NAME_MAX_LEN`] bytes.
///
/// Binary decoding goes through [`AssetName::new`], so a datum carrying an
/// oversized name fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode)]
pub struct AssetName(Vec<u8>);

impl<Context> bincode::Decode<Context> for AssetName {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        let bytes = <Vec<u8> as bincode::Decode<Context>>::decode(decoder)?;
        Self::new(bytes).map_err(|err| bincode::error::DecodeError::OtherString(err.to_string()))
    }
}

bincode::impl_borrow_decode!(AssetName);

impl AssetName {
    /// # Errors
    ///
    /// Returns an error if `bytes` is longer than [`ASSET_NAME_MAX_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ParseIdError> {
        let bytes = bytes.into();
        if bytes.len() > ASSET_NAME_MAX_LEN {
            return Err(ParseIdError::AssetNameTooLong {
                len: bytes.len(),
                max: ASSET_NAME_MAX_LEN,
            });
        }
        Ok(Self(bytes))
    }

    /// Keeps at most the first [`ASSET_NAME_MAX_LEN`] bytes.
    pub(crate) fn truncated(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(ASSET_NAME_MAX_LEN);
        Self(bytes)
    }

    /// Asset name from UTF-8 text, e.g. the fixed payment token name.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is longer than [`ASSET_NAME_MAX_LEN`] bytes.
    pub fn from_text(text: &str) -> Result<Self, ParseIdError> {
        Self::new(text.as_bytes())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl FromStr for AssetName {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|source| ParseIdError::Hex {
            kind: "AssetName",
            source,
        })?;
        Self::new(bytes)
    }
}

serde_via_str!(AssetName);

/// Identity of a fungible or non-fungible asset.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode, bincode::Decode,
)]
pub enum AssetId {
    Lovelace,
    Token {
        policy_id: PolicyId,
        asset_name: AssetName,
    },
}

impl AssetId {
    #[must_use]
    pub const fn token(policy_id: PolicyId, asset_name: AssetName) -> Self {
        Self::Token {
            policy_id,
            asset_name,
        }
    }

    #[must_use]
    pub const fn policy_id(&self) -> Option<&PolicyId> {
        match self {
            Self::Lovelace => None,
            Self::Token { policy_id, .. } => Some(policy_id),
        }
    }

    #[must_use]
    pub const fn asset_name(&self) -> Option<&AssetName> {
        match self {
            Self::Lovelace => None,
            Self::Token { asset_name, .. } => Some(asset_name),
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lovelace => f.write_str(LOVELACE_UNIT),
            Self::Token {
                policy_id,
                asset_name,
            } => write!(f, "{policy_id}{asset_name}"),
        }
    }
}

impl FromStr for AssetId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LOVELACE_UNIT {
            return Ok(Self::Lovelace);
        }

        let policy_hex_len = PolicyId::LEN * 2;
        if s.len() < policy_hex_len || !s.is_char_boundary(policy_hex_len) {
            return Err(ParseIdError::InvalidUnit(s.to_string()));
        }

        let (policy, name) = s.split_at(policy_hex_len);
        Ok(Self::token(policy.parse()?, name.parse()?))
    }
}

serde_via_str!(AssetId);

/// Multi-asset bundle. Zero quantities are never stored.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(transparent)]
pub struct Value(BTreeMap<AssetId, u64>);

impl Value {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lovelace(amount: u64) -> Self {
        Self::single(AssetId::Lovelace, amount)
    }

    #[must_use]
    pub fn single(asset: AssetId, amount: u64) -> Self {
        Self::new().with(asset, amount)
    }

    /// Builder-style insert, replacing any previous quantity.
    #[must_use]
    pub fn with(mut self, asset: AssetId, amount: u64) -> Self {
        self.set(asset, amount);
        self
    }

    pub fn set(&mut self, asset: AssetId, amount: u64) {
        if amount == 0 {
            self.0.remove(&asset);
        } else {
            self.0.insert(asset, amount);
        }
    }

    #[must_use]
    pub fn get(&self, asset: &AssetId) -> u64 {
        self.0.get(asset).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn contains(&self, asset: &AssetId) -> bool {
        self.0.contains_key(asset)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, u64)> {
        self.0.iter().map(|(asset, amount)| (asset, *amount))
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.0.keys()
    }

    /// Adds `amount` of `asset`, returning `None` on overflow.
    #[must_use]
    pub fn checked_add_asset(mut self, asset: AssetId, amount: u64) -> Option<Self> {
        let total = self.get(&asset).checked_add(amount)?;
        self.set(asset, total);
        Some(self)
    }

    /// Bundle with `asset` removed entirely.
    #[must_use]
    pub fn without(mut self, asset: &AssetId) -> Self {
        self.0.remove(asset);
        self
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (position, (asset, amount)) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{asset}: {amount}")?;
        }
        f.write_str("}")
    }
}

impl FromIterator<(AssetId, u64)> for Value {
    fn from_iter<I: IntoIterator<Item = (AssetId, u64)>>(iter: I) -> Self {
        let mut value = Self::new();
        for (asset, amount) in iter {
            value.set(asset, amount);
        }
        value
    }
}

/// Bech32 address, treated as an opaque location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique reference to a record: the producing transaction and output position.
///
/// The derived ordering compares `origin` byte-wise first, then `position`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordId {
    pub origin: TxHash,
    pub position: u32,
}

impl RecordId {
    #[must_use]
    pub const fn new(origin: TxHash, position: u32) -> Self {
        Self { origin, position }
    }
}

impl AsRef<RecordId> for RecordId {
    fn as_ref(&self) -> &RecordId {
        self
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.origin, self.position)
    }
}

impl FromStr for RecordId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (origin, position) = s
            .split_once('#')
            .ok_or_else(|| ParseIdError::InvalidRecordId(s.to_string()))?;
        let position = position
            .parse()
            .map_err(|_| ParseIdError::InvalidRecordId(s.to_string()))?;
        Ok(Self::new(origin.parse()?, position))
    }
}

/// Immutable snapshot of an unspent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub address: Address,
    pub value: Value,
    /// Opaque inline datum bytes.
    #[serde(default, with = "hex_option")]
    pub datum: Option<Vec<u8>>,
    /// Whether the output carries a reference script.
    #[serde(default)]
    pub reference_script: bool,
}

impl Record {
    #[must_use]
    pub const fn new(id: RecordId, address: Address, value: Value) -> Self {
        Self {
            id,
            address,
            value,
            datum: None,
            reference_script: false,
        }
    }

    #[must_use]
    pub fn with_datum(mut self, datum: Vec<u8>) -> Self {
        self.datum = Some(datum);
        self
    }

    #[must_use]
    pub const fn with_reference_script(mut self) -> Self {
        self.reference_script = true;
        self
    }
}

impl AsRef<RecordId> for Record {
    fn as_ref(&self) -> &RecordId {
        &self.id
    }
}

pub(crate) mod hex_option {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| hex::decode(raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}
