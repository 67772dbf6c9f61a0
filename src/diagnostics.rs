//! Wallet connection diagnostics
//!
//! Exercises `eth_accounts` and `eth_requestAccounts` directly, independent of
//! any session, and reports each step in plain words.

use crate::wallet::WalletProvider;
use alloy::primitives::Address;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum DiagnosticOutcome {
    /// An account is available, either already or after the request
    Connected(Address),
    NotFound,
    /// The access request returned no accounts
    NoAccounts,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub steps: Vec<String>,
    pub outcome: DiagnosticOutcome,
}

impl DiagnosticReport {
    /// Final line, as shown to the user
    pub fn summary(&self) -> &str {
        self.steps.last().map(String::as_str).unwrap_or_default()
    }
}

pub async fn diagnose(provider: Option<&dyn WalletProvider>) -> DiagnosticReport {
    let mut steps = Vec::new();

    let Some(provider) = provider else {
        steps.push("MetaMask not found. Please install MetaMask.".to_string());
        return DiagnosticReport {
            steps,
            outcome: DiagnosticOutcome::NotFound,
        };
    };

    let info = provider.describe();
    steps.push(format!("Wallet provider found ({}). Checking accounts...", info.name));

    let outcome = match check_accounts(provider, &mut steps).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, "Wallet diagnostics failed");
            steps.push(format!("Error: {}", e));
            DiagnosticOutcome::Failed(e.to_string())
        }
    };

    DiagnosticReport { steps, outcome }
}

async fn check_accounts(
    provider: &dyn WalletProvider,
    steps: &mut Vec<String>,
) -> crate::Result<DiagnosticOutcome> {
    let accounts = provider.accounts().await?;
    if let Some(account) = accounts.first() {
        steps.push(format!("Already connected to: {}", account));
        return Ok(DiagnosticOutcome::Connected(*account));
    }

    steps.push("No accounts connected. Requesting access...".to_string());
    let accounts = provider.request_accounts().await?;
    match accounts.first() {
        Some(account) => {
            steps.push(format!("Successfully connected to: {}", account));
            Ok(DiagnosticOutcome::Connected(*account))
        }
        None => {
            steps.push("No accounts returned after request.".to_string());
            Ok(DiagnosticOutcome::NoAccounts)
        }
    }
}
