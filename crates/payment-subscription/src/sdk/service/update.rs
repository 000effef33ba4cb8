use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::ServiceTerms;
use crate::error::SubscriptionError;
use crate::plan::TransactionPlan;
use crate::redeemer::ServiceSpendRedeemer;
use crate::source::RecordSource;
use crate::types::{Address, AssetName};

use super::plan_service_spend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    pub service_id: AssetName,
    pub merchant_id: AssetName,
    pub fee_amount: u64,
    pub penalty_amount: u64,
    pub interval_length: u64,
    pub num_intervals: u64,
}

/// Replaces the pricing of a service. Assets and activity flag are kept.
///
/// # Errors
///
/// Returns an error if the service is missing, the merchant token is not at
/// `wallet`, or the new terms are invalid.
pub fn update_service<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &UpdateServiceRequest,
) -> Result<TransactionPlan, SubscriptionError> {
    let plan = plan_service_spend(
        config,
        source,
        wallet,
        &request.service_id,
        &request.merchant_id,
        |current| {
            let next = ServiceTerms {
                fee_amount: request.fee_amount,
                penalty_amount: request.penalty_amount,
                interval_length: request.interval_length,
                num_intervals: request.num_intervals,
                ..current
            };
            next.validate().map_err(SubscriptionError::InvalidArgument)?;
            Ok(next)
        },
        |service_ref_name, merchant_input_index, service_input_index, service_output_index| {
            ServiceSpendRedeemer::Update {
                service_ref_name,
                merchant_input_index,
                service_input_index,
                service_output_index,
            }
        },
    )?;

    info!(
        service_id = %request.service_id,
        fee = request.fee_amount,
        intervals = request.num_intervals,
        "planned service update"
    );
    Ok(plan)
}
