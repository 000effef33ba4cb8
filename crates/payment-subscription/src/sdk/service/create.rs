use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::ServiceTerms;
use crate::encoding::Encodable;
use crate::error::SubscriptionError;
use crate::sdk::{Registration, plan_registration, seed_record};
use crate::source::RecordSource;
use crate::types::{Address, RecordId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    /// Wallet record whose id seeds the token names.
    pub seed: RecordId,
    pub terms: ServiceTerms,
}

/// Registers a service: mints its reference token, locked with the terms, and
/// the merchant token paid to `wallet`.
///
/// # Errors
///
/// Returns an error if the terms are invalid or the seed record is not in the wallet.
pub fn create_service<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &CreateServiceRequest,
) -> Result<Registration, SubscriptionError> {
    request
        .terms
        .validate()
        .map_err(SubscriptionError::InvalidArgument)?;

    let seed = seed_record(source, wallet, &request.seed)?;
    let registration = plan_registration(
        seed,
        config.service_policy_id,
        &config.service_address,
        wallet,
        request.terms.encode()?,
    )?;

    info!(
        service_id = %registration.tokens.ref_name,
        merchant_id = %registration.tokens.user_name,
        fee = request.terms.fee_amount,
        intervals = request.terms.num_intervals,
        "planned service creation"
    );
    Ok(registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_name::TokenPair;
    use crate::datum::fetch_service_terms;
    use crate::redeemer::{Redeemer, RegistryMintRedeemer};
    use crate::sdk::fixtures::{Fixture, terms};
    use crate::types::{Record, TxHash, Value};

    #[test]
    fn create_mints_pair_from_seed() {
        let mut fixture = Fixture::registered();
        let wallet = fixture.merchant_wallet.clone();
        let seed = fixture.add_record(wallet.clone(), Value::lovelace(3_000_000), None);

        let registration = create_service(
            &fixture.config,
            &fixture.source,
            &wallet,
            &CreateServiceRequest {
                seed: seed.id,
                terms: terms(),
            },
        )
        .expect("create plans");
        let plan = &registration.plan;
        let policy = fixture.config.service_policy_id;

        assert_eq!(registration.tokens, TokenPair::from_seed(&seed.id));
        assert_eq!(plan.minted().get(&registration.tokens.ref_asset(policy)), Some(&1));
        assert_eq!(plan.minted().get(&registration.tokens.user_asset(policy)), Some(&1));

        let reference = &plan.outputs()[1];
        assert_eq!(reference.address, fixture.config.service_address);
        let locked = Record::new(RecordId::new(TxHash([0; 32]), 0), reference.address.clone(), reference.value.clone())
            .with_datum(reference.datum.clone().expect("datum"));
        assert_eq!(fetch_service_terms(&locked).expect("terms decode"), terms());

        assert_eq!(
            plan.mint_redeemer(),
            Some(&Redeemer::RegistryMint(RegistryMintRedeemer::Create {
                input_index: 0,
                output_index: 1,
            }))
        );
    }

    #[test]
    fn create_rejects_invalid_terms_and_unknown_seed() {
        let fixture = Fixture::registered();
        let mut bad = terms();
        bad.interval_length = 0;

        let err = create_service(
            &fixture.config,
            &fixture.source,
            &fixture.merchant_wallet,
            &CreateServiceRequest {
                seed: RecordId::new(TxHash([0xff; 32]), 0),
                terms: bad,
            },
        )
        .expect_err("invalid terms");
        assert!(matches!(err, SubscriptionError::InvalidArgument(_)));

        let err = create_service(
            &fixture.config,
            &fixture.source,
            &fixture.merchant_wallet,
            &CreateServiceRequest {
                seed: RecordId::new(TxHash([0xff; 32]), 0),
                terms: terms(),
            },
        )
        .expect_err("seed not in wallet");
        assert!(matches!(err, SubscriptionError::LookupMiss { .. }));
    }
}
