//! Subscriber-side account registry.

mod create;
mod remove;
mod update;

pub use create::{CreateAccountRequest, create_account};
pub use remove::{RemoveAccountRequest, remove_account};
pub use update::{UpdateAccountRequest, update_account};

use crate::config::ProtocolConfig;
use crate::datum::{AccountDatum, fetch_account};
use crate::error::SubscriptionError;
use crate::sdk::{owned_token_record, token_record};
use crate::source::RecordSource;
use crate::types::{Address, AssetName, Record};

/// Account reference record with its datum, plus the subscriber token record
/// held at the caller's wallet.
struct AccountRecords {
    account: Record,
    datum: AccountDatum,
    subscriber: Record,
}

fn account_records<S: RecordSource + ?Sized>(
    config: &ProtocolConfig,
    source: &S,
    account_id: &AssetName,
    subscriber_id: &AssetName,
    wallet: &Address,
) -> Result<AccountRecords, SubscriptionError> {
    let account = token_record(source, config.account_policy_id, account_id, "account reference token")?;
    let datum = fetch_account(&account)?;
    let subscriber = owned_token_record(
        source,
        config.account_policy_id,
        subscriber_id,
        "subscriber token",
        wallet,
    )?;
    Ok(AccountRecords {
        account,
        datum,
        subscriber,
    })
}
