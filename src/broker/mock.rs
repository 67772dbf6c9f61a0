//! In-memory broker for tests

use super::{Broker, ProviderAccount, ServiceDescriptor, ServiceMetadata};
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub(crate) fn service(id: u8, model: &str) -> ServiceDescriptor {
    ServiceDescriptor {
        provider: Address::repeat_byte(id),
        service_type: "chatbot".to_string(),
        url: format!("http://provider-{}.test", id),
        model: model.to_string(),
        input_price: U256::from(1_000u64),
        output_price: U256::from(2_000u64),
    }
}

pub(crate) struct MockBroker {
    pub services: Vec<ServiceDescriptor>,
    pub user: Address,
    pub nonce: U256,
    pub fee: U256,
    pub fail_acknowledge: bool,
    pub fail_metadata: bool,
    pub fail_account: bool,
    acknowledged: AtomicBool,
    acknowledge_calls: AtomicUsize,
}

impl MockBroker {
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self {
            services,
            user: Address::repeat_byte(0xaa),
            nonce: U256::from(7u64),
            fee: U256::from(150_000u64),
            fail_acknowledge: false,
            fail_metadata: false,
            fail_account: false,
            acknowledged: AtomicBool::new(false),
            acknowledge_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_acknowledged(&self, value: bool) {
        self.acknowledged.store(value, Ordering::SeqCst);
    }

    pub fn acknowledge_calls(&self) -> usize {
        self.acknowledge_calls.load(Ordering::SeqCst)
    }

    fn find(&self, provider: Address) -> Result<&ServiceDescriptor> {
        self.services
            .iter()
            .find(|s| s.provider == provider)
            .ok_or_else(|| Error::Broker(format!("Unknown provider {}", provider)))
    }
}

#[async_trait]
impl Broker for MockBroker {
    fn name(&self) -> &'static str {
        "MockBroker"
    }

    async fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        Ok(self.services.clone())
    }

    async fn user_acknowledged(&self, _provider: Address) -> Result<bool> {
        Ok(self.acknowledged.load(Ordering::SeqCst))
    }

    async fn acknowledge_provider_signer(&self, _provider: Address) -> Result<()> {
        self.acknowledge_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_acknowledge {
            return Err(Error::Broker("execution reverted".to_string()));
        }
        self.acknowledged.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_service_metadata(&self, provider: Address) -> Result<ServiceMetadata> {
        if self.fail_metadata {
            return Err(Error::Broker("service lookup failed".to_string()));
        }
        let service = self.find(provider)?;
        Ok(ServiceMetadata {
            endpoint: format!("{}/v1/proxy", service.url),
            model: service.model.clone(),
        })
    }

    async fn get_account(&self, provider: Address) -> Result<ProviderAccount> {
        if self.fail_account {
            return Err(Error::Broker("account not found".to_string()));
        }
        Ok(ProviderAccount {
            wallet: self.user,
            provider,
            nonce: self.nonce,
            fee: self.fee,
        })
    }
}
