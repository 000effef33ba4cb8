use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::error::SubscriptionError;
use crate::plan::TransactionPlan;
use crate::redeemer::{AccountSpendRedeemer, RegistryMintRedeemer};
use crate::sdk::input_index;
use crate::source::RecordSource;
use crate::types::{Address, AssetId, AssetName};

use super::account_records;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveAccountRequest {
    pub account_id: AssetName,
    pub subscriber_id: AssetName,
}

/// Deletes an account by burning both of its tokens.
///
/// # Errors
///
/// Returns an error if the account is missing, the subscriber token is not
/// at `wallet`.
pub fn remove_account<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &RemoveAccountRequest,
) -> Result<TransactionPlan, SubscriptionError> {
    let records = account_records(config, source, &request.account_id, &request.subscriber_id, wallet)?;
    let policy = config.account_policy_id;

    let mut plan = TransactionPlan::new();
    plan.consume(records.subscriber.clone())
        .consume(records.account.clone());

    let burn = RegistryMintRedeemer::Delete {
        reference_token_name: request.account_id.clone(),
    };
    plan.mint(AssetId::token(policy, request.account_id.clone()), -1, burn.clone())
        .mint(AssetId::token(policy, request.subscriber_id.clone()), -1, burn);

    let redeemer = AccountSpendRedeemer::Remove {
        account_ref_name: request.account_id.clone(),
        subscriber_input_index: input_index(&plan, &records.subscriber.id)?,
        account_input_index: input_index(&plan, &records.account.id)?,
    };
    plan.attach_redeemer(&records.account.id, redeemer);

    info!(account_id = %request.account_id, "planned account removal");
    Ok(plan)
}
