use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::ParseIdError;
use crate::types::{Address, AssetId, AssetName, PolicyId, Timestamp};

const DEFAULT_TIME_TOLERANCE_MS: u64 = 100_000;
const DEFAULT_CLAIM_MARGIN_MS: u64 = 1_000;
const DEFAULT_PAYMENT_TOKEN_NAME: &str = "subscription";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
    /// Local emulator with a clock that does not drift.
    Emulator,
}

impl Network {
    #[must_use]
    pub const fn address_prefix(self) -> &'static str {
        match self {
            Self::Mainnet => "addr1",
            Self::Preprod | Self::Preview | Self::Emulator => "addr_test1",
        }
    }

    #[must_use]
    pub const fn default_time_tolerance_ms(self) -> u64 {
        match self {
            Self::Emulator => 0,
            Self::Mainnet | Self::Preprod | Self::Preview => DEFAULT_TIME_TOLERANCE_MS,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Preprod => "preprod",
            Self::Preview => "preview",
            Self::Emulator => "emulator",
        })
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "preprod" => Ok(Self::Preprod),
            "preview" => Ok(Self::Preview),
            "emulator" => Ok(Self::Emulator),
            other => bail!("unknown network '{other}'; expected mainnet, preprod, preview or emulator"),
        }
    }
}

/// Deployment parameters of the three validators.
///
/// Built once and passed by reference to every planning operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub network: Network,
    pub payment_policy_id: PolicyId,
    pub service_policy_id: PolicyId,
    pub account_policy_id: PolicyId,
    pub payment_address: Address,
    pub service_address: Address,
    pub account_address: Address,
    /// Gap between the end of an Init validity window and the subscription start.
    pub time_tolerance_ms: u64,
    /// How far behind the caller's clock withdrawals claim installments.
    pub claim_margin_ms: u64,
    pub payment_token_name: String,
}

impl ProtocolConfig {
    /// Reads the configuration from `PAYMENT_SUBSCRIPTION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let network = match var("PAYMENT_SUBSCRIPTION_NETWORK") {
            Some(raw) => raw
                .parse::<Network>()
                .with_context(|| "PAYMENT_SUBSCRIPTION_NETWORK is invalid")?,
            None => Network::Preprod,
        };

        let policy = |key: &str| -> Result<PolicyId> {
            let raw = var(key).with_context(|| format!("{key} must be set"))?;
            raw.parse::<PolicyId>()
                .with_context(|| format!("{key} must be a 28-byte hex policy id"))
        };
        let address = |key: &str| -> Result<Address> {
            var(key)
                .map(Address::new)
                .with_context(|| format!("{key} must be set"))
        };
        let millis = |key: &str, default_value: u64| -> Result<u64> {
            var(key).map_or(Ok(default_value), |raw| {
                u64::from_str(raw.trim()).with_context(|| format!("{key} must be a valid u64 integer"))
            })
        };

        Ok(Self {
            network,
            payment_policy_id: policy("PAYMENT_SUBSCRIPTION_PAYMENT_POLICY_ID")?,
            service_policy_id: policy("PAYMENT_SUBSCRIPTION_SERVICE_POLICY_ID")?,
            account_policy_id: policy("PAYMENT_SUBSCRIPTION_ACCOUNT_POLICY_ID")?,
            payment_address: address("PAYMENT_SUBSCRIPTION_PAYMENT_ADDRESS")?,
            service_address: address("PAYMENT_SUBSCRIPTION_SERVICE_ADDRESS")?,
            account_address: address("PAYMENT_SUBSCRIPTION_ACCOUNT_ADDRESS")?,
            time_tolerance_ms: millis(
                "PAYMENT_SUBSCRIPTION_TIME_TOLERANCE_MS",
                network.default_time_tolerance_ms(),
            )?,
            claim_margin_ms: millis("PAYMENT_SUBSCRIPTION_CLAIM_MARGIN_MS", DEFAULT_CLAIM_MARGIN_MS)?,
            payment_token_name: var("PAYMENT_SUBSCRIPTION_PAYMENT_TOKEN_NAME")
                .unwrap_or_else(|| DEFAULT_PAYMENT_TOKEN_NAME.to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        let prefix = self.network.address_prefix();
        for (name, address) in [
            ("payment", &self.payment_address),
            ("service", &self.service_address),
            ("account", &self.account_address),
        ] {
            if !address.as_str().starts_with(prefix) {
                bail!("{name} address must start with '{prefix}' on {}", self.network);
            }
        }

        if self.payment_policy_id == self.service_policy_id
            || self.payment_policy_id == self.account_policy_id
            || self.service_policy_id == self.account_policy_id
        {
            bail!("payment, service and account policy ids must be distinct");
        }

        if self.payment_token_name.is_empty() {
            bail!("payment token name must not be empty");
        }
        AssetName::from_text(&self.payment_token_name)
            .with_context(|| "payment token name is too long")?;

        Ok(())
    }

    /// Asset id of the payment token minted at Init.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name does not fit an asset name.
    pub fn payment_token(&self) -> Result<AssetId, ParseIdError> {
        let name = AssetName::from_text(&self.payment_token_name)?;
        Ok(AssetId::token(self.payment_policy_id, name))
    }

    /// Upper validity bound for an Init starting at `subscription_start`.
    #[must_use]
    pub const fn init_deadline(&self, subscription_start: Timestamp) -> Timestamp {
        subscription_start.saturating_sub(self.time_tolerance_ms)
    }

    /// Time at which a withdrawal at `current_time` claims installments.
    #[must_use]
    pub const fn claim_time(&self, current_time: Timestamp) -> Timestamp {
        current_time.saturating_sub(self.claim_margin_ms)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;

    pub(crate) fn base_config() -> ProtocolConfig {
        ProtocolConfig {
            network: Network::Emulator,
            payment_policy_id: PolicyId([0x01; 28]),
            service_policy_id: PolicyId([0x02; 28]),
            account_policy_id: PolicyId([0x03; 28]),
            payment_address: Address::new("addr_test1payment"),
            service_address: Address::new("addr_test1service"),
            account_address: Address::new("addr_test1account"),
            time_tolerance_ms: 0,
            claim_margin_ms: DEFAULT_CLAIM_MARGIN_MS,
            payment_token_name: DEFAULT_PAYMENT_TOKEN_NAME.to_string(),
        }
    }

    fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    fn required_vars() -> Vec<(&'static str, String)> {
        vec![
            ("PAYMENT_SUBSCRIPTION_PAYMENT_POLICY_ID", "01".repeat(28)),
            ("PAYMENT_SUBSCRIPTION_SERVICE_POLICY_ID", "02".repeat(28)),
            ("PAYMENT_SUBSCRIPTION_ACCOUNT_POLICY_ID", "03".repeat(28)),
            ("PAYMENT_SUBSCRIPTION_PAYMENT_ADDRESS", "addr_test1payment".to_string()),
            ("PAYMENT_SUBSCRIPTION_SERVICE_ADDRESS", "addr_test1service".to_string()),
            ("PAYMENT_SUBSCRIPTION_ACCOUNT_ADDRESS", "addr_test1account".to_string()),
        ]
    }

    #[test]
    fn base_config_is_valid() {
        base_config().validate().expect("emulator config should validate");
    }

    #[test]
    fn lookup_applies_network_defaults() {
        let vars = required_vars();
        let mut pairs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        pairs.push(("PAYMENT_SUBSCRIPTION_NETWORK", "emulator"));
        let env = env_map(&pairs);

        let cfg = ProtocolConfig::from_lookup(|key| env.get(key).cloned()).expect("loads");
        assert_eq!(cfg, base_config());

        pairs.pop();
        let env = env_map(&pairs);
        let cfg = ProtocolConfig::from_lookup(|key| env.get(key).cloned()).expect("loads");
        assert_eq!(cfg.network, Network::Preprod);
        assert_eq!(cfg.time_tolerance_ms, DEFAULT_TIME_TOLERANCE_MS);
    }

    #[test]
    fn missing_policy_is_reported() {
        let err = ProtocolConfig::from_lookup(|_| None).expect_err("nothing set");
        assert!(err.to_string().contains("PAYMENT_SUBSCRIPTION_PAYMENT_POLICY_ID must be set"));
    }

    #[test]
    fn mainnet_rejects_testnet_addresses() {
        let mut cfg = base_config();
        cfg.network = Network::Mainnet;

        let err = cfg.validate().expect_err("testnet address on mainnet");
        assert!(err.to_string().contains("must start with 'addr1'"));
    }

    #[test]
    fn shared_policy_ids_are_rejected() {
        let mut cfg = base_config();
        cfg.account_policy_id = cfg.service_policy_id;

        let err = cfg.validate().expect_err("policies must differ");
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = base_config();
        let json = serde_json::to_string(&cfg).expect("serializes");

        assert!(json.contains(r#""network":"emulator""#));
        assert_eq!(serde_json::from_str::<ProtocolConfig>(&json).expect("parses"), cfg);
    }

    #[test]
    fn time_helpers_saturate() {
        let cfg = base_config();
        assert_eq!(cfg.claim_time(500), 0);
        assert_eq!(cfg.claim_time(5_000), 4_000);
        assert_eq!(cfg.init_deadline(5_000), 5_000);
    }
}
