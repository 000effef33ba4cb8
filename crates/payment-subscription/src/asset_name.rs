//! Deterministic reference/user token names.
//!
//! A name is `label || position_byte || sha3_256(origin)` truncated to 32
//! bytes. Labels are the CIP-68 prefixes, so a reference token and its user
//! token derived from the same seed record share a common suffix.

use sha3::{Digest, Sha3_256};
use tracing::debug;

use crate::datum::payment_schedules;
use crate::error::{SubscriptionError, TokenPairError};
use crate::types::{AssetId, AssetName, PolicyId, Record, RecordId};

/// Four-byte CIP-68 asset name label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetLabel([u8; 4]);

impl AssetLabel {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

/// Label 100: reference token carrying the datum.
pub const REFERENCE_LABEL: AssetLabel = AssetLabel([0x00, 0x06, 0x43, 0xb0]);
/// Label 222: user token proving ownership.
pub const USER_LABEL: AssetLabel = AssetLabel([0x00, 0x0d, 0xe1, 0x40]);
/// Label 333: fungible token.
pub const FUNGIBLE_LABEL: AssetLabel = AssetLabel([0x00, 0x14, 0xdf, 0x10]);
/// Label 444: rich fungible token.
pub const RICH_FUNGIBLE_LABEL: AssetLabel = AssetLabel([0x00, 0x1b, 0xc2, 0x80]);

/// Derives the unique asset name for `seed`, optionally prefixed with `label`.
#[must_use]
pub fn derive_asset_name(seed: &RecordId, label: Option<AssetLabel>) -> AssetName {
    let digest = Sha3_256::digest(seed.origin.as_bytes());

    let mut bytes = Vec::with_capacity(4 + 1 + digest.len());
    if let Some(label) = label {
        bytes.extend_from_slice(label.as_bytes());
    }
    // Only the low byte of the output position is committed.
    bytes.push(seed.position.to_le_bytes()[0]);
    bytes.extend_from_slice(&digest);

    AssetName::truncated(bytes)
}

/// Reference and user token names of one logical entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TokenPair {
    pub ref_name: AssetName,
    pub user_name: AssetName,
}

impl TokenPair {
    /// Pair derived from the record consumed when the entity is created.
    #[must_use]
    pub fn from_seed(seed: &RecordId) -> Self {
        Self {
            ref_name: derive_asset_name(seed, Some(REFERENCE_LABEL)),
            user_name: derive_asset_name(seed, Some(USER_LABEL)),
        }
    }

    #[must_use]
    pub fn ref_asset(&self, policy_id: PolicyId) -> AssetId {
        AssetId::token(policy_id, self.ref_name.clone())
    }

    #[must_use]
    pub fn user_asset(&self, policy_id: PolicyId) -> AssetId {
        AssetId::token(policy_id, self.user_name.clone())
    }
}

fn strip_label<'a>(name: &'a AssetName, label: AssetLabel) -> Option<&'a [u8]> {
    name.as_bytes().strip_prefix(label.as_bytes().as_slice())
}

/// Single-unit asset names under `policy_id` held by `record`.
fn unique_names<'a>(record: &'a Record, policy_id: &'a PolicyId) -> impl Iterator<Item = &'a AssetName> {
    record.value.iter().filter_map(move |(asset, amount)| match asset {
        AssetId::Token {
            policy_id: policy,
            asset_name,
        } if amount == 1 && policy == policy_id => Some(asset_name),
        _ => None,
    })
}

/// User token on the record with the greatest origin; the first seen wins a tie.
fn latest_user_token<'a, I>(records: I, policy_id: &PolicyId) -> Option<AssetName>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut latest: Option<(&RecordId, &AssetName)> = None;

    for record in records {
        for name in unique_names(record, policy_id) {
            if strip_label(name, USER_LABEL).is_none() {
                continue;
            }
            if latest.is_none_or(|(seen, _)| record.id.origin > seen.origin) {
                debug!(record = %record.id, token = %name, "found newer user token");
                latest = Some((&record.id, name));
            }
        }
    }

    latest.map(|(_, name)| name.clone())
}

fn matching_reference<'a, I>(records: I, policy_id: &PolicyId, suffix: &[u8]) -> Option<AssetName>
where
    I: IntoIterator<Item = &'a Record>,
{
    records.into_iter().find_map(|record| {
        unique_names(record, policy_id)
            .find(|name| strip_label(name, REFERENCE_LABEL) == Some(suffix))
            .cloned()
    })
}

/// Locates the token pair of the entity the caller holds.
///
/// The user token is searched in `wallet` first and in `wallet` plus
/// `contract` as a fallback; the reference token with the same suffix is
/// searched in `contract` first and in every record as a fallback.
///
/// # Errors
///
/// Returns an error if either token of the pair is absent.
pub fn pair_from_holdings(
    wallet: &[Record],
    contract: &[Record],
    policy_id: &PolicyId,
) -> Result<TokenPair, TokenPairError> {
    debug!(
        %policy_id,
        wallet_records = wallet.len(),
        contract_records = contract.len(),
        "locating token pair"
    );

    let user_name = latest_user_token(wallet, policy_id)
        .or_else(|| latest_user_token(wallet.iter().chain(contract), policy_id))
        .ok_or_else(|| TokenPairError::UserTokenNotFound {
            policy_id: policy_id.to_string(),
        })?;

    let suffix = strip_label(&user_name, USER_LABEL).unwrap_or_default();

    let ref_name = matching_reference(contract, policy_id, suffix)
        .or_else(|| matching_reference(wallet.iter().chain(contract), policy_id, suffix))
        .ok_or_else(|| TokenPairError::ReferenceTokenNotFound {
            user_name: user_name.clone(),
        })?;

    Ok(TokenPair {
        ref_name,
        user_name,
    })
}

/// Full asset ids of the caller's pair, requiring both record sets.
///
/// # Errors
///
/// Returns an error if either record set is empty or the pair cannot be found.
pub fn extract_tokens(
    policy_id: &PolicyId,
    contract: &[Record],
    wallet: &[Record],
) -> Result<(AssetId, AssetId), TokenPairError> {
    if contract.is_empty() || wallet.is_empty() {
        return Err(TokenPairError::MissingHoldings);
    }

    let pair = pair_from_holdings(wallet, contract, policy_id)?;
    Ok((pair.ref_asset(*policy_id), pair.user_asset(*policy_id)))
}

/// First single-unit asset name under `policy_id` across `records`.
#[must_use]
pub fn token_name_from_records(records: &[Record], policy_id: &PolicyId) -> Option<AssetName> {
    records
        .iter()
        .find_map(|record| unique_names(record, policy_id).next().cloned())
}

/// Payment token carried by the schedule record of the given subscription.
///
/// # Errors
///
/// Returns an error if no decodable schedule matches the pair.
pub fn find_subscriber_payment_token_name(
    payment_records: &[Record],
    service_id: &AssetName,
    subscriber_id: &AssetName,
    payment_policy_id: &PolicyId,
) -> Result<AssetName, SubscriptionError> {
    payment_schedules(payment_records)
        .filter(|(_, schedule)| schedule.belongs_to(service_id, subscriber_id))
        .find_map(|(record, _)| token_name_from_records(std::slice::from_ref(record), payment_policy_id))
        .ok_or_else(|| {
            SubscriptionError::lookup_miss(format!(
                "active subscription of {subscriber_id} to service {service_id}"
            ))
        })
}
