//! Wallet provider boundary
//!
//! Mirrors the request surface a browser wallet extension exposes
//! (`eth_accounts`, `eth_requestAccounts`, chain id, balance, personal sign).
//! The session manager only ever talks to this trait.

use super::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Static facts about a provider, logged when it is detected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    /// Whether the provider presents itself as MetaMask
    pub is_metamask: bool,
    /// Network id as reported without a round trip, if known
    pub network_version: Option<String>,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn describe(&self) -> ProviderInfo;

    /// Accounts already authorized for this client (`eth_accounts`)
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// Ask the user to authorize accounts (`eth_requestAccounts`)
    ///
    /// Fails with [`Error::UserRejected`] when the user declines.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    async fn chain_id(&self) -> Result<u64>;

    async fn balance(&self, address: Address) -> Result<U256>;

    /// EIP-191 personal-sign, returned as 0x-prefixed hex
    async fn sign_message(&self, message: &str) -> Result<String>;
}

/// How account access requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountAccess {
    /// Accounts are authorized up front
    Granted,
    /// Ask on the terminal when access is requested
    #[default]
    Prompt,
    /// Always decline
    Denied,
}

/// Provider backed by a local key and an optional JSON-RPC endpoint
pub struct LocalWalletProvider {
    wallet: Arc<SecureWallet>,
    rpc_url: Option<url::Url>,
    access: AccountAccess,
    authorized: AtomicBool,
}

impl LocalWalletProvider {
    pub fn new(wallet: Arc<SecureWallet>, rpc_url: Option<url::Url>, access: AccountAccess) -> Self {
        Self {
            wallet,
            rpc_url,
            authorized: AtomicBool::new(access == AccountAccess::Granted),
            access,
        }
    }

    pub fn wallet(&self) -> &Arc<SecureWallet> {
        &self.wallet
    }

    fn rpc_url(&self) -> Result<url::Url> {
        self.rpc_url
            .clone()
            .ok_or_else(|| Error::Config("No RPC URL configured".to_string()))
    }

    async fn prompt_user(&self) -> Result<bool> {
        let address = self.wallet.address();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let mut stdout = std::io::stdout();
            write!(
                stdout,
                "Allow og-infer to access account {}? [y/N] ",
                address
            )?;
            stdout.flush()?;

            let mut answer = String::new();
            std::io::stdin().lock().read_line(&mut answer)?;
            Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
        })
        .await
        .map_err(|e| Error::Wallet(format!("Account prompt failed: {}", e)))?
    }
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    fn describe(&self) -> ProviderInfo {
        ProviderInfo {
            name: "local-key".to_string(),
            is_metamask: false,
            network_version: None,
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(vec![self.wallet.address()])
        } else {
            Ok(vec![])
        }
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        if self.authorized.load(Ordering::SeqCst) {
            return Ok(vec![self.wallet.address()]);
        }

        let approved = match self.access {
            AccountAccess::Granted => true,
            AccountAccess::Denied => false,
            AccountAccess::Prompt => self.prompt_user().await?,
        };

        if !approved {
            return Err(Error::UserRejected);
        }

        self.authorized.store(true, Ordering::SeqCst);
        Ok(vec![self.wallet.address()])
    }

    async fn chain_id(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url()?);
        provider
            .get_chain_id()
            .await
            .map_err(|e| Error::Wallet(format!("Failed to get chain id: {}", e)))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url()?);
        provider
            .get_balance(address)
            .await
            .map_err(|e| Error::Wallet(format!("Failed to get balance: {}", e)))
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self.wallet.sign_message(message)?;
        Ok(signature.to_string())
    }
}
