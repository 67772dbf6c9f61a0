//! Inference runner
//!
//! Drives one authenticated chat request end to end: discovery, provider
//! acknowledgment, metadata, header construction and dispatch. Every phase is
//! written to the shared [`LogSink`]; the run stops at the first fatal error.

use crate::broker::{ensure_acknowledged, select_service, Broker};
use crate::config::{Config, InferenceSettings};
use crate::inference::{
    build_headers, now_millis, AuthHeaders, AuthRequest, ChatReply, ChatRequest, Dispatcher,
    HeaderAliases,
};
use crate::logs::LogSink;
use crate::wallet::{WalletProvider, WalletSession};
use crate::{Error, Result};
use alloy::primitives::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// State shared by the commands of one session
#[derive(Debug, Default)]
pub struct AppState {
    pub log: LogSink,
    response: Mutex<Option<String>>,
}

impl AppState {
    pub fn new(log: LogSink) -> Self {
        Self {
            log,
            response: Mutex::new(None),
        }
    }

    /// Content of the last successful reply, if any
    pub fn response(&self) -> Option<String> {
        self.response
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_response(&self, content: Option<String>) {
        *self.response.lock().unwrap_or_else(|e| e.into_inner()) = content;
    }
}

/// Client user agent, e.g. `og-infer/0.1.0 (linux)`
pub fn user_agent() -> String {
    format!(
        "og-infer/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// Startup report: client identity and wallet provider detection
pub fn log_environment(provider: Option<&dyn WalletProvider>, log: &LogSink) {
    log.append("App initialized");
    log.append(format!("User Agent: {}", user_agent()));

    match provider {
        Some(provider) => {
            let info = provider.describe();
            log.append(format!("Ethereum object detected ({})", info.name));
            log.append(format!("isMetaMask: {}", info.is_metamask));
            log.append(format!(
                "networkVersion: {}",
                info.network_version.as_deref().unwrap_or("unknown")
            ));
        }
        None => log.append("No Ethereum object found - MetaMask may not be installed"),
    }
}

/// Held for the duration of a run
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct InferenceRunner {
    dispatcher: Dispatcher,
    aliases: HeaderAliases,
    settings: InferenceSettings,
    running: AtomicBool,
}

impl InferenceRunner {
    pub fn new(dispatcher: Dispatcher, aliases: HeaderAliases, settings: InferenceSettings) -> Self {
        Self {
            dispatcher,
            aliases,
            settings,
            running: AtomicBool::new(false),
        }
    }

    /// HTTP dispatcher writing to `log`, header table and prompt from `config`
    pub fn from_config(config: &Config, log: LogSink) -> Self {
        Self::new(
            Dispatcher::http(log),
            config.headers.clone(),
            config.inference.clone(),
        )
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one inference request
    ///
    /// Fails with [`Error::AlreadyRunning`] while another run is in flight.
    /// On success the reply content becomes the state's response.
    pub async fn run(
        &self,
        session: &WalletSession,
        broker: &dyn Broker,
        state: &AppState,
    ) -> Result<ChatReply> {
        let _guard = RunGuard::acquire(&self.running).inspect_err(|_| {
            warn!("Inference already in progress");
        })?;

        let span = tracing::info_span!(
            "inference",
            run_id = %Uuid::new_v4(),
            wallet = %session.address(),
            broker = broker.name(),
        );

        async {
            state.set_response(None);

            match self.execute(session, broker, &state.log).await {
                Ok(reply) => {
                    state.log.append(format!("AI Response: {}", reply.content));
                    state.log.append("Inference completed successfully!");
                    info!(path = ?reply.path, "Inference completed");
                    state.set_response(Some(reply.content.clone()));
                    Ok(reply)
                }
                Err(e) => {
                    state.log.append(format!("Error in inference: {}", e));
                    warn!(error = %e, "Inference failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        session: &WalletSession,
        broker: &dyn Broker,
        log: &LogSink,
    ) -> Result<ChatReply> {
        log.append("Starting inference client...");
        log.append(format!("Using broker: {}", broker.name()));
        log.append("Skipping ledger check - using existing account with sufficient balance");

        log.append("Getting available services...");
        let services = broker.list_services().await?;
        log.append(format!("Available services: {}", services.len()));

        let service = select_service(&services)?;
        let provider = service.provider;
        log.append(format!("Using provider: {}", provider));

        ensure_acknowledged(broker, provider, log).await;

        log.append("Getting service metadata...");
        let metadata = match broker.get_service_metadata(provider).await {
            Ok(metadata) => {
                log.append("Service metadata retrieved successfully");
                metadata
            }
            Err(e) => {
                log.append(format!("Error getting metadata: {}", e));
                return Err(Error::MetadataFetchFailed(e.to_string()));
            }
        };
        log.append(format!("Service Endpoint: {}", metadata.endpoint));
        log.append(format!("Model: {}", metadata.model));

        let request = ChatRequest::new(
            metadata.model.as_str(),
            self.settings.system_prompt.as_deref(),
            &self.settings.message,
        );

        log.append(format!("Getting headers for provider: {}", provider));
        log.append("Creating authentication headers...");
        let headers = match self.headers_for(session, broker, provider, &request, log).await {
            Ok(headers) => {
                log.append("Authentication headers created successfully");
                headers
            }
            Err(e) => {
                log.append(format!("Header creation failed: {}", e));
                return Err(e);
            }
        };

        self.dispatcher
            .dispatch(&metadata.endpoint, &headers, &request)
            .await
    }

    async fn headers_for(
        &self,
        session: &WalletSession,
        broker: &dyn Broker,
        provider: Address,
        request: &ChatRequest,
        log: &LogSink,
    ) -> Result<AuthHeaders> {
        let account = broker
            .get_account(provider)
            .await
            .map_err(|e| Error::HeaderConstructionFailed(e.to_string()))?;
        log.append("Retrieved account data");

        if account.wallet != session.address() {
            warn!(
                account = %account.wallet,
                session = %session.address(),
                "Broker account wallet differs from session address"
            );
        }

        let auth = AuthRequest {
            provider,
            account: &account,
            message: &self.settings.message,
            body: request,
            timestamp_ms: now_millis(),
        };
        build_headers(auth, session, &self.aliases).await
    }
}
