//! Configuration for the inference client

pub mod rpc;

use crate::inference::HeaderAliases;
use crate::wallet::AccountAccess;
use crate::{Error, Result};
use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::str::FromStr;

pub use rpc::RpcConfig;

/// Wallet private key environment variable name
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Serving contract address environment variable name
pub const SERVING_CONTRACT_ENV: &str = "ZG_SERVING_CONTRACT";

/// 0G networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Testnet => rpc::chains::GALILEO_TESTNET,
            Network::Mainnet => rpc::chains::MAINNET,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }
}

/// Broker settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrokerSettings {
    /// Serving contract address; `ZG_SERVING_CONTRACT` takes precedence
    #[serde(default)]
    pub contract_address: Option<String>,
}

impl BrokerSettings {
    pub fn contract_address(&self) -> Result<Address> {
        let raw = std::env::var(SERVING_CONTRACT_ENV)
            .ok()
            .or_else(|| self.contract_address.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "No serving contract configured. Set {} or broker.contract_address.",
                    SERVING_CONTRACT_ENV
                ))
            })?;

        Address::from_str(raw.trim())
            .map_err(|e| Error::Config(format!("Invalid serving contract address: {}", e)))
    }
}

/// What to ask the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// User message; also part of the signed payload
    pub message: String,
    /// Sent as a leading system message when set
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            message: "Tell me a short joke about programming.".to_string(),
            system_prompt: Some("You are a helpful assistant with a sense of humor.".to_string()),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Network the wallet and broker live on
    #[serde(default)]
    pub network: Network,
    /// Explicit RPC URL; overrides the per-network resolution
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    /// Header names carrying each authentication value
    ///
    /// Entries replace the default names of the fields they list; fields not
    /// listed keep their defaults.
    #[serde(default, deserialize_with = "header_overrides")]
    pub headers: HeaderAliases,
    /// How wallet account access requests are answered
    #[serde(default)]
    pub account_access: AccountAccess,
}

fn header_overrides<'de, D>(deserializer: D) -> std::result::Result<HeaderAliases, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = HeaderAliases::deserialize(deserializer)?;
    Ok(HeaderAliases::default().merge(overrides))
}

impl Config {
    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.headers.validate()?;
        Ok(config)
    }

    /// RPC URL for the configured network
    pub fn resolve_rpc_url(&self, rpc: &RpcConfig) -> Result<url::Url> {
        let raw = match &self.rpc_url {
            Some(url) => url.as_str(),
            None => rpc.get(self.network.chain_id()).ok_or_else(|| {
                Error::Config(format!("No RPC URL for network {}", self.network.name()))
            })?,
        };

        raw.parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL {}: {}", raw, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::AuthField;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_deserialize_defaults() {
        let parsed: Config = serde_json::from_value(serde_json::json!({})).expect("parse config");

        assert_eq!(parsed.network, Network::Testnet);
        assert_eq!(parsed.account_access, AccountAccess::Prompt);
        assert_eq!(parsed.headers, HeaderAliases::default());
        assert_eq!(
            parsed.inference.message,
            "Tell me a short joke about programming."
        );
    }

    #[test]
    fn config_deserialize_explicit() {
        let value = serde_json::json!({
            "network": "mainnet",
            "rpc_url": "http://localhost:8545",
            "broker": { "contract_address": "0x0000000000000000000000000000000000000001" },
            "inference": { "message": "ping" },
            "headers": { "signature": ["X-Signature"] },
            "account_access": "granted"
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");

        assert_eq!(parsed.network, Network::Mainnet);
        assert_eq!(parsed.inference.message, "ping");
        assert!(parsed.inference.system_prompt.is_none());
        assert_eq!(parsed.headers.names(AuthField::Signature), ["X-Signature".to_string()]);
        assert_eq!(
            parsed.headers.names(AuthField::Fee),
            HeaderAliases::default().names(AuthField::Fee)
        );
        assert_eq!(
            parsed.headers.names(AuthField::Authorization),
            ["Authorization".to_string()]
        );
        assert_eq!(parsed.account_access, AccountAccess::Granted);
    }

    #[test]
    fn config_from_file_rejects_bad_header_names() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"headers": {{"nonce": ["Bad Header"]}}}}"#).unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn resolve_rpc_url_prefers_explicit_url() {
        let rpc = RpcConfig::with_urls(HashMap::from([(
            rpc::chains::GALILEO_TESTNET,
            "https://testnet.rpc".to_string(),
        )]));

        let config = Config::default();
        assert_eq!(
            config.resolve_rpc_url(&rpc).unwrap().as_str(),
            "https://testnet.rpc/"
        );

        let config = Config {
            rpc_url: Some("http://localhost:8545".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_rpc_url(&rpc).unwrap().as_str(),
            "http://localhost:8545/"
        );

        let config = Config {
            network: Network::Mainnet,
            ..Config::default()
        };
        assert!(config.resolve_rpc_url(&rpc).is_err());
    }

    #[test]
    fn broker_contract_address_from_config() {
        std::env::remove_var(SERVING_CONTRACT_ENV);

        let settings = BrokerSettings {
            contract_address: Some("0x0000000000000000000000000000000000000001".to_string()),
        };
        assert_eq!(
            settings.contract_address().unwrap(),
            Address::with_last_byte(1)
        );

        assert!(BrokerSettings::default().contract_address().is_err());
    }
}
