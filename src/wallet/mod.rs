//! Wallet access
//!
//! The private key lives only in [`SecureWallet`]. Everything else goes
//! through the [`WalletProvider`] boundary.

#[cfg(test)]
pub(crate) mod mock;
mod provider;
mod session;
mod signer;

use alloy::primitives::U256;

pub use provider::{AccountAccess, LocalWalletProvider, ProviderInfo, WalletProvider};
pub use session::{ConnectionState, WalletSession, WalletSessionManager};
pub use signer::SecureWallet;

/// Render a base-unit amount with `decimals` places, trimming trailing zeros
pub fn format_units(value: U256, decimals: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}
