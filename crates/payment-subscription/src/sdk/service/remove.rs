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
pub struct RemoveServiceRequest {
    pub service_id: AssetName,
    pub merchant_id: AssetName,
}

/// Deactivates a service. Its reference token stays locked so running
/// subscriptions can still be settled.
///
/// # Errors
///
/// Returns an error if the service is missing, the merchant token is not at
/// `wallet`, or the service is already inactive.
pub fn remove_service<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &RemoveServiceRequest,
) -> Result<TransactionPlan, SubscriptionError> {
    let plan = plan_service_spend(
        config,
        source,
        wallet,
        &request.service_id,
        &request.merchant_id,
        |current| {
            if !current.is_active {
                return Err(SubscriptionError::InactiveService {
                    service_id: request.service_id.clone(),
                });
            }
            Ok(ServiceTerms {
                is_active: false,
                ..current
            })
        },
        |service_ref_name, merchant_input_index, service_input_index, service_output_index| {
            ServiceSpendRedeemer::Remove {
                service_ref_name,
                merchant_input_index,
                service_input_index,
                service_output_index,
            }
        },
    )?;

    info!(service_id = %request.service_id, "planned service removal");
    Ok(plan)
}
