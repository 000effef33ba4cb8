use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProtocolConfig;
use crate::datum::AccountDatum;
use crate::encoding::Encodable;
use crate::error::SubscriptionError;
use crate::sdk::{Registration, plan_registration, seed_record};
use crate::source::RecordSource;
use crate::types::{Address, RecordId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub seed: RecordId,
    pub email: String,
    pub phone: String,
}

/// Registers a subscriber account. Only hashes of the contact details go on chain.
///
/// # Errors
///
/// Returns an error if:
/// - both contact fields are empty
/// - the seed record is not held by `wallet`
pub fn create_account<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    wallet: &Address,
    request: &CreateAccountRequest,
) -> Result<Registration, SubscriptionError> {
    if request.email.is_empty() && request.phone.is_empty() {
        return Err(SubscriptionError::InvalidArgument(
            "account needs an email or a phone number".to_string(),
        ));
    }

    let seed = seed_record(source, wallet, &request.seed)?;
    let datum = AccountDatum::from_contact(&request.email, &request.phone);
    let registration = plan_registration(
        seed,
        config.account_policy_id,
        &config.account_address,
        wallet,
        datum.encode()?,
    )?;

    info!(
        account_id = %registration.tokens.ref_name,
        subscriber_id = %registration.tokens.user_name,
        "planned account creation"
    );
    Ok(registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_name::TokenPair;
    use crate::sdk::fixtures::Fixture;
    use crate::types::{TxHash, Value};

    #[test]
    fn create_locks_contact_hashes() {
        let mut fixture = Fixture::registered();
        let wallet = fixture.subscriber_wallet.clone();
        let seed = fixture.add_record(wallet.clone(), Value::lovelace(4_000_000), None);

        let registration = create_account(
            &fixture.config,
            &fixture.source,
            &wallet,
            &CreateAccountRequest {
                seed: seed.id,
                email: "new@example.com".to_string(),
                phone: String::new(),
            },
        )
        .expect("create plans");

        assert_eq!(registration.tokens, TokenPair::from_seed(&seed.id));
        let user = &registration.plan.outputs()[0];
        assert_eq!(user.address, wallet);
        assert_eq!(
            user.value.get(&registration.tokens.user_asset(fixture.config.account_policy_id)),
            1
        );

        let reference = &registration.plan.outputs()[1];
        assert_eq!(reference.address, fixture.config.account_address);
        let expected = AccountDatum::from_contact("new@example.com", "")
            .encode()
            .expect("encodes");
        assert_eq!(reference.datum.as_deref(), Some(expected.as_slice()));
    }

    #[test]
    fn create_requires_contact() {
        let fixture = Fixture::registered();
        let err = create_account(
            &fixture.config,
            &fixture.source,
            &fixture.subscriber_wallet,
            &CreateAccountRequest {
                seed: RecordId::new(TxHash([0x10; 32]), 0),
                email: String::new(),
                phone: String::new(),
            },
        )
        .expect_err("no contact");
        assert!(matches!(err, SubscriptionError::InvalidArgument(_)));
    }
}
