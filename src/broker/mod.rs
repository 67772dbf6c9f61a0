//! Serving broker boundary
//!
//! The broker mediates provider discovery and the on-chain account state
//! between a user and an inference provider. The workflow only depends on the
//! [`Broker`] trait; [`ContractBroker`] talks to the serving contract.

mod contract;
#[cfg(test)]
pub(crate) mod mock;

use crate::logs::LogSink;
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::Serialize;

pub use contract::{ContractBroker, PROXY_PATH, QUOTE_PATH};

/// A provider offering inference through the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub provider: Address,
    pub service_type: String,
    /// Base URL of the provider's service
    pub url: String,
    pub model: String,
    pub input_price: U256,
    pub output_price: U256,
}

/// Where and what to call for a given provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMetadata {
    /// OpenAI-compatible base URL (`/chat/completions` is appended)
    pub endpoint: String,
    pub model: String,
}

/// Point-in-time snapshot of the user's account with one provider
///
/// Fetched fresh for every request; the nonce advances between requests so a
/// snapshot must not be reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAccount {
    pub wallet: Address,
    pub provider: Address,
    pub nonce: U256,
    pub fee: U256,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    async fn list_services(&self) -> Result<Vec<ServiceDescriptor>>;

    async fn user_acknowledged(&self, provider: Address) -> Result<bool>;

    async fn acknowledge_provider_signer(&self, provider: Address) -> Result<()>;

    async fn get_service_metadata(&self, provider: Address) -> Result<ServiceMetadata>;

    async fn get_account(&self, provider: Address) -> Result<ProviderAccount>;
}

/// Pick the service to use: always the first one listed
pub fn select_service(services: &[ServiceDescriptor]) -> Result<&ServiceDescriptor> {
    services.first().ok_or(Error::NoServicesAvailable)
}

/// Result of [`ensure_acknowledged`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgment {
    AlreadyAcknowledged,
    Acknowledged,
    /// Logged and otherwise ignored
    Failed(String),
}

/// Make sure `provider` is acknowledged before use
///
/// Best effort: errors are logged and the caller carries on.
pub async fn ensure_acknowledged(
    broker: &dyn Broker,
    provider: Address,
    log: &LogSink,
) -> Acknowledgment {
    log.append("Checking if provider is already acknowledged...");

    let outcome = acknowledge_if_needed(broker, provider, log).await;

    match outcome {
        Ok(ack) => ack,
        Err(e) => {
            let error = Error::AcknowledgmentFailed(e.to_string());
            tracing::warn!(provider = %provider, error = %error, "Continuing without acknowledgment");
            log.append(format!("Error with provider acknowledgment: {}", e));
            log.append("Attempting to continue despite acknowledgment error...");
            Acknowledgment::Failed(e.to_string())
        }
    }
}

async fn acknowledge_if_needed(
    broker: &dyn Broker,
    provider: Address,
    log: &LogSink,
) -> Result<Acknowledgment> {
    let acknowledged = broker.user_acknowledged(provider).await?;
    log.append(format!("Provider acknowledgment status: {}", acknowledged));

    if acknowledged {
        log.append("Provider already acknowledged, skipping...");
        return Ok(Acknowledgment::AlreadyAcknowledged);
    }

    log.append("Acknowledging provider signer...");
    broker.acknowledge_provider_signer(provider).await?;
    log.append("Provider signer acknowledged successfully");
    Ok(Acknowledgment::Acknowledged)
}
