use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::AccountDatum;
use crate::encoding::Encodable;
use crate::error::SubscriptionError;
use crate::plan::TransactionPlan;
use crate::redeemer::AccountSpendRedeemer;
use crate::sdk::input_index;
use crate::source::RecordSource;
use crate::types::{Address, AssetName};

use super::account_records;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccountRequest {
    pub account_id: AssetName,
    pub subscriber_id: AssetName,
    pub email: String,
    pub phone: String,
}

/// Replaces the contact hashes of an account.
///
/// # Errors
///
/// Returns an error if the account is missing, the subscriber token is not
/// at `wallet`, its datum cannot be decoded, or the contact details are
/// unchanged.
pub fn update_account<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &UpdateAccountRequest,
) -> Result<TransactionPlan, SubscriptionError> {
    let records = account_records(config, source, &request.account_id, &request.subscriber_id, wallet)?;
    let datum = AccountDatum::from_contact(&request.email, &request.phone);
    if datum == records.datum {
        return Err(SubscriptionError::InvalidArgument(
            "account contact is unchanged".to_string(),
        ));
    }

    let mut plan = TransactionPlan::new();
    plan.consume(records.subscriber.clone())
        .consume(records.account.clone());
    let account_output_index = plan.pay(
        config.account_address.clone(),
        records.account.value.clone(),
        Some(datum.encode()?),
    );

    let redeemer = AccountSpendRedeemer::Update {
        account_ref_name: request.account_id.clone(),
        subscriber_input_index: input_index(&plan, &records.subscriber.id)?,
        account_input_index: input_index(&plan, &records.account.id)?,
        account_output_index,
    };
    plan.attach_redeemer(&records.account.id, redeemer);

    info!(account_id = %request.account_id, "planned account update");
    Ok(plan)
}
