//! Broker backed by the inference serving contract
//!
//! Reads go through `eth_call`; acknowledgment is a transaction signed by the
//! session wallet, carrying the public key the provider publishes on its
//! quote endpoint.

use super::{Broker, ProviderAccount, ServiceDescriptor, ServiceMetadata};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

/// Path appended to a provider URL to reach its OpenAI-compatible proxy
pub const PROXY_PATH: &str = "/v1/proxy";

/// Path on a provider URL serving its attestation quote and signing key
pub const QUOTE_PATH: &str = "/v1/quote";

sol! {
    #[sol(rpc)]
    interface IInferenceServing {
        struct Service {
            address provider;
            string serviceType;
            string url;
            uint256 inputPrice;
            uint256 outputPrice;
            uint256 updatedAt;
            string model;
            string verifiability;
        }

        struct Refund {
            uint256 index;
            uint256 amount;
            uint256 createdAt;
            bool processed;
        }

        struct Account {
            address user;
            address provider;
            uint256 nonce;
            uint256 balance;
            uint256 pendingRefund;
            uint256[2] signer;
            Refund[] refunds;
            string additionalInfo;
            uint256[2] providerPubKey;
            address teeSignerAddress;
        }

        function getAllServices() external view returns (Service[] memory services);
        function getService(address provider) external view returns (Service memory service);
        function getAccount(address user, address provider) external view returns (Account memory account);
        function acknowledgeProviderSigner(address provider, uint256[2] calldata providerPubKey) external;
    }
}

impl ProviderAccount {
    /// Named view over the contract's account record
    ///
    /// The request fee is the record's fourth field, the prepaid balance the
    /// gateway charges against.
    fn from_record(record: IInferenceServing::Account) -> Self {
        Self {
            wallet: record.user,
            provider: record.provider,
            nonce: record.nonce,
            fee: record.balance,
        }
    }
}

/// A provider signer counts as acknowledged once its key is on the account
fn is_acknowledged(record: &IInferenceServing::Account) -> bool {
    record.providerPubKey.iter().any(|k| !k.is_zero())
}

impl From<IInferenceServing::Service> for ServiceDescriptor {
    fn from(service: IInferenceServing::Service) -> Self {
        Self {
            provider: service.provider,
            service_type: service.serviceType,
            url: service.url,
            model: service.model,
            input_price: service.inputPrice,
            output_price: service.outputPrice,
        }
    }
}

fn metadata_for(service: &ServiceDescriptor) -> ServiceMetadata {
    ServiceMetadata {
        endpoint: format!("{}{}", service.url.trim_end_matches('/'), PROXY_PATH),
        model: service.model.clone(),
    }
}

/// Body of the provider quote endpoint; only the signing key is read
#[derive(Debug, Deserialize)]
struct ProviderQuote {
    key: [serde_json::Value; 2],
}

/// Key coordinates arrive as decimal or hex strings, or as plain numbers
fn parse_key_part(value: &serde_json::Value) -> Result<U256> {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(Error::Broker(format!(
                "Unexpected provider key component: {}",
                other
            )))
        }
    };
    U256::from_str(raw.trim())
        .map_err(|e| Error::Broker(format!("Invalid provider key component {}: {}", raw, e)))
}

fn parse_provider_key(body: &str) -> Result<[U256; 2]> {
    let quote: ProviderQuote = serde_json::from_str(body)
        .map_err(|e| Error::Broker(format!("Invalid provider quote: {}", e)))?;
    Ok([parse_key_part(&quote.key[0])?, parse_key_part(&quote.key[1])?])
}

/// Serving contract client for one user
pub struct ContractBroker {
    contract: Address,
    user: Address,
    provider: DynProvider,
    http: reqwest::Client,
}

impl ContractBroker {
    /// Create a broker acting for `wallet`
    ///
    /// # Arguments
    /// * `contract` - Address of the serving contract
    /// * `rpc_url` - JSON-RPC endpoint of the chain hosting it
    pub fn new(contract: Address, rpc_url: url::Url, wallet: Arc<SecureWallet>) -> Self {
        let provider = ProviderBuilder::new()
            .wallet(wallet.wallet().clone())
            .connect_http(rpc_url)
            .erased();

        Self {
            contract,
            user: wallet.address(),
            provider,
            http: reqwest::Client::new(),
        }
    }

    fn instance(&self) -> IInferenceServing::IInferenceServingInstance<DynProvider> {
        IInferenceServing::new(self.contract, self.provider.clone())
    }

    async fn account_record(&self, provider: Address) -> Result<IInferenceServing::Account> {
        self.instance()
            .getAccount(self.user, provider)
            .call()
            .await
            .map_err(|e| Error::Broker(format!("Failed to get account: {}", e)))
    }

    async fn service_record(&self, provider: Address) -> Result<ServiceDescriptor> {
        let service = self
            .instance()
            .getService(provider)
            .call()
            .await
            .map_err(|e| Error::Broker(format!("Failed to get service: {}", e)))?;

        Ok(ServiceDescriptor::from(service))
    }

    /// Signing key the provider publishes alongside its quote
    async fn provider_key(&self, service: &ServiceDescriptor) -> Result<[U256; 2]> {
        let url = format!("{}{}", service.url.trim_end_matches('/'), QUOTE_PATH);
        let body = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_provider_key(&body)
    }
}

#[async_trait]
impl Broker for ContractBroker {
    fn name(&self) -> &'static str {
        "ContractBroker"
    }

    async fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        let services = self
            .instance()
            .getAllServices()
            .call()
            .await
            .map_err(|e| Error::Broker(format!("Failed to list services: {}", e)))?;

        Ok(services.into_iter().map(ServiceDescriptor::from).collect())
    }

    async fn user_acknowledged(&self, provider: Address) -> Result<bool> {
        let record = self.account_record(provider).await?;
        Ok(is_acknowledged(&record))
    }

    async fn acknowledge_provider_signer(&self, provider: Address) -> Result<()> {
        let service = self.service_record(provider).await?;
        let key = self.provider_key(&service).await?;

        let pending = self
            .instance()
            .acknowledgeProviderSigner(provider, key)
            .send()
            .await
            .map_err(|e| Error::Broker(format!("Acknowledgment transaction failed: {}", e)))?;

        let tx_hash = pending
            .watch()
            .await
            .map_err(|e| Error::Broker(format!("Acknowledgment not confirmed: {}", e)))?;

        tracing::info!(provider = %provider, tx_hash = %tx_hash, "Provider signer acknowledged");
        Ok(())
    }

    async fn get_service_metadata(&self, provider: Address) -> Result<ServiceMetadata> {
        let service = self.service_record(provider).await?;
        Ok(metadata_for(&service))
    }

    async fn get_account(&self, provider: Address) -> Result<ProviderAccount> {
        let record = self.account_record(provider).await?;
        Ok(ProviderAccount::from_record(record))
    }
}
