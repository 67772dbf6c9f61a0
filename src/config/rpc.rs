//! RPC endpoint configuration
//!
//! Resolution order:
//! 1. Per-network env vars (`ZG_TESTNET_RPC_URL`, `ZG_MAINNET_RPC_URL`)
//! 2. Public RPC fallbacks - rate limited, for testing only
//!
//! # Examples
//!
//! ```bash
//! export ZG_TESTNET_RPC_URL="https://my-node.example/rpc"
//! ```

use std::collections::HashMap;

/// RPC configuration for 0G networks
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// RPC URLs indexed by chain ID
    urls: HashMap<u64, String>,
}

/// Chain ID constants
pub mod chains {
    pub const GALILEO_TESTNET: u64 = 16601;
    pub const MAINNET: u64 = 16661;
}

/// Environment variable names
mod env_vars {
    pub const TESTNET_RPC_URL: &str = "ZG_TESTNET_RPC_URL";
    pub const MAINNET_RPC_URL: &str = "ZG_MAINNET_RPC_URL";
}

/// Public RPC endpoints (rate limited, for testing only)
mod public_rpcs {
    pub const GALILEO_TESTNET: &str = "https://evmrpc-testnet.0g.ai";
    pub const MAINNET: &str = "https://evmrpc.0g.ai";
}

impl RpcConfig {
    /// Create RPC config from environment variables, falling back to public RPCs
    pub fn from_env() -> Self {
        let mut urls = HashMap::new();

        if let Ok(url) = std::env::var(env_vars::TESTNET_RPC_URL) {
            tracing::debug!("Using ZG_TESTNET_RPC_URL for Galileo testnet");
            urls.insert(chains::GALILEO_TESTNET, url);
        }
        if let Ok(url) = std::env::var(env_vars::MAINNET_RPC_URL) {
            tracing::debug!("Using ZG_MAINNET_RPC_URL for mainnet");
            urls.insert(chains::MAINNET, url);
        }

        if !urls.contains_key(&chains::GALILEO_TESTNET) {
            tracing::debug!("No RPC configured for Galileo testnet, using public RPC");
        }
        urls.entry(chains::GALILEO_TESTNET)
            .or_insert_with(|| public_rpcs::GALILEO_TESTNET.to_string());
        urls.entry(chains::MAINNET)
            .or_insert_with(|| public_rpcs::MAINNET.to_string());

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }

    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.urls.contains_key(&chain_id)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
