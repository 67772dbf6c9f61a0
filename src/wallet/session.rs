//! Wallet session lifecycle
//!
//! `Disconnected -> Connecting -> Connected`, falling back to `Disconnected`
//! on any fatal failure or on an explicit disconnect. A failed attempt leaves
//! nothing behind, so a retry starts clean.

use super::{format_units, WalletProvider};
use crate::inference::MessageSigner;
use crate::logs::LogSink;
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// An authorized account plus the provider able to sign for it
#[derive(Clone)]
pub struct WalletSession {
    address: Address,
    chain_id: Option<u64>,
    balance: Option<U256>,
    provider: Arc<dyn WalletProvider>,
}

impl WalletSession {
    pub fn address(&self) -> Address {
        self.address
    }

    /// `None` when the network could not be resolved at connect time
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn balance(&self) -> Option<U256> {
        self.balance
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }
}

impl fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSession")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageSigner for WalletSession {
    async fn sign_message(&self, message: &str) -> Result<String> {
        self.provider.sign_message(message).await
    }
}

#[derive(Debug, Clone)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(WalletSession),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }
}

/// Owns the at-most-one active wallet session
pub struct WalletSessionManager {
    provider: Option<Arc<dyn WalletProvider>>,
    state: ConnectionState,
    log: LogSink,
}

impl WalletSessionManager {
    /// `provider` is `None` when no wallet is available at all
    pub fn new(provider: Option<Arc<dyn WalletProvider>>, log: LogSink) -> Self {
        Self {
            provider,
            state: ConnectionState::Disconnected,
            log,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn session(&self) -> Option<&WalletSession> {
        match &self.state {
            ConnectionState::Connected(session) => Some(session),
            _ => None,
        }
    }

    pub async fn connect(&mut self) -> Result<WalletSession> {
        if let ConnectionState::Connected(session) = &self.state {
            self.log
                .append(format!("Already connected: {}", session.address));
            return Ok(session.clone());
        }

        self.state = ConnectionState::Connecting;
        match self.establish().await {
            Ok(session) => {
                self.state = ConnectionState::Connected(session.clone());
                Ok(session)
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                self.log.append(format!("Connection failed: {}", e));
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<WalletSession> {
        self.log.append("Detecting wallet provider...");
        let provider = match &self.provider {
            Some(provider) => Arc::clone(provider),
            None => {
                self.log
                    .append("No wallet provider detected - MetaMask Required");
                return Err(Error::ProviderUnavailable);
            }
        };
        let info = provider.describe();
        self.log
            .append(format!("Wallet provider detected: {}", info.name));

        self.log.append("Checking for authorized accounts...");
        let mut accounts = provider.accounts().await?;
        if accounts.is_empty() {
            self.log
                .append("No authorized accounts, requesting access...");
            accounts = match provider.request_accounts().await {
                Ok(accounts) => accounts,
                Err(Error::UserRejected) => {
                    self.log.append("Account access rejected by user");
                    return Err(Error::UserRejected);
                }
                Err(e) => return Err(e),
            };
        }

        let address = *accounts.first().ok_or(Error::UserRejected)?;

        self.log.append("Resolving network...");
        let chain_id = match provider.chain_id().await {
            Ok(id) => {
                self.log.append(format!("Network chain id: {}", id));
                Some(id)
            }
            Err(e) => {
                self.log
                    .append(format!("Could not resolve network: {}", e));
                None
            }
        };

        self.log.append(format!("Connected: {}", address));

        let balance = match provider.balance(address).await {
            Ok(balance) => {
                self.log.append(format!(
                    "Wallet balance: {} 0G",
                    format_units(balance, 18)
                ));
                Some(balance)
            }
            Err(e) => {
                self.log.append(format!("Could not fetch balance: {}", e));
                None
            }
        };

        tracing::info!(address = %address, chain_id = ?chain_id, "Wallet session established");

        Ok(WalletSession {
            address,
            chain_id,
            balance,
            provider,
        })
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.log.append("Wallet disconnected");
    }
}
