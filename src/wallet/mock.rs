//! In-memory wallet provider for tests

use super::{ProviderInfo, SecureWallet, WalletProvider};
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub(crate) struct MockWalletProvider {
    pub address: Address,
    wallet: SecureWallet,
    authorized: AtomicBool,
    approve: bool,
    pub return_no_accounts: bool,
    pub fail_chain_id: bool,
    pub fail_balance: bool,
    requests: AtomicUsize,
}

impl MockWalletProvider {
    fn build(authorized: bool, approve: bool) -> Self {
        let wallet = SecureWallet::from_hex(TEST_KEY).expect("test key");
        Self {
            address: wallet.address(),
            wallet,
            authorized: AtomicBool::new(authorized),
            approve,
            return_no_accounts: false,
            fail_chain_id: false,
            fail_balance: false,
            requests: AtomicUsize::new(0),
        }
    }

    /// No prior authorization; approves the access request
    pub fn approving() -> Self {
        Self::build(false, true)
    }

    pub fn preauthorized() -> Self {
        Self::build(true, true)
    }

    pub fn rejecting() -> Self {
        Self::build(false, false)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    fn describe(&self) -> ProviderInfo {
        ProviderInfo {
            name: "mock".to_string(),
            is_metamask: true,
            network_version: Some("16601".to_string()),
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(vec![self.address])
        } else {
            Ok(vec![])
        }
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.approve {
            return Err(Error::UserRejected);
        }
        if self.return_no_accounts {
            return Ok(vec![]);
        }
        self.authorized.store(true, Ordering::SeqCst);
        Ok(vec![self.address])
    }

    async fn chain_id(&self) -> Result<u64> {
        if self.fail_chain_id {
            return Err(Error::Wallet("chain id unavailable".to_string()));
        }
        Ok(16601)
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        if self.fail_balance {
            return Err(Error::Wallet("balance unavailable".to_string()));
        }
        Ok(U256::from(3_000_000_000_000_000_000u128))
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        Ok(self.wallet.sign_message(message)?.to_string())
    }
}
