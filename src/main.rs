//! 0G Inference CLI
//!
//! Command-line interface for connecting a wallet and running an
//! authenticated inference request.

use clap::{Parser, Subcommand, ValueEnum};
use og_inference_client::broker::{Broker, ContractBroker};
use og_inference_client::diagnostics;
use og_inference_client::runner::log_environment;
use og_inference_client::wallet::{
    format_units, LocalWalletProvider, SecureWallet, WalletProvider, WalletSessionManager,
};
use og_inference_client::{
    AppState, Config, Error, InferenceRunner, LogSink, Result, RpcConfig, PRIVATE_KEY_ENV,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "og-infer")]
#[command(about = "Wallet-authenticated client for 0G inference providers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the session log to this file as JSON lines
    #[arg(long, global = true)]
    transcript: Option<PathBuf>,

    /// Format of diagnostic output on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the wallet and show the session
    Connect,

    /// Run one inference request against the first listed provider
    Run {
        /// Message to send instead of the configured one
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List services registered with the serving contract
    Services,

    /// Check wallet account access step by step
    Diagnose,

    /// Show current configuration
    Config,
}

/// Wallet-side handles built from `PRIVATE_KEY`
struct WalletContext {
    wallet: Option<Arc<SecureWallet>>,
    provider: Option<Arc<dyn WalletProvider>>,
}

impl WalletContext {
    fn load(config: &Config, rpc_url: &url::Url) -> Result<Self> {
        let Some(wallet) = SecureWallet::from_env(PRIVATE_KEY_ENV)? else {
            tracing::warn!("No {} set - no wallet provider available", PRIVATE_KEY_ENV);
            return Ok(Self {
                wallet: None,
                provider: None,
            });
        };

        let wallet = Arc::new(wallet);
        tracing::info!(address = %wallet.address(), "Loaded wallet from {}", PRIVATE_KEY_ENV);
        let provider = LocalWalletProvider::new(
            Arc::clone(&wallet),
            Some(rpc_url.clone()),
            config.account_access,
        );

        Ok(Self {
            wallet: Some(wallet),
            provider: Some(Arc::new(provider)),
        })
    }

    fn provider_ref(&self) -> Option<&dyn WalletProvider> {
        self.provider.as_deref()
    }

    fn broker(&self, config: &Config, rpc_url: &url::Url) -> Result<ContractBroker> {
        let wallet = self.wallet.clone().ok_or(Error::ProviderUnavailable)?;
        let contract = config.broker.contract_address()?;
        Ok(ContractBroker::new(contract, rpc_url.clone(), wallet))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let rpc_url = config.resolve_rpc_url(&RpcConfig::from_env())?;
    let context = WalletContext::load(&config, &rpc_url)?;
    let state = AppState::new(LogSink::new());

    let outcome = match cli.command {
        Commands::Connect => connect(&context, &state).await,
        Commands::Run { message } => {
            if let Some(message) = message {
                config.inference.message = message;
            }
            run_inference(&config, &rpc_url, &context, &state).await
        }
        Commands::Services => list_services(&config, &rpc_url, &context).await,
        Commands::Diagnose => {
            let report = diagnostics::diagnose(context.provider_ref()).await;
            for step in &report.steps {
                println!("{}", step);
            }
            Ok(())
        }
        Commands::Config => Ok(()),
    };

    print_log(&state.log);
    if let Some(path) = &cli.transcript {
        write_transcript(&state.log, path)?;
    }

    outcome
}

async fn connect(context: &WalletContext, state: &AppState) -> Result<()> {
    log_environment(context.provider_ref(), &state.log);

    let mut manager = WalletSessionManager::new(context.provider.clone(), state.log.clone());
    let session = match manager.connect().await {
        Ok(session) => session,
        Err(Error::ProviderUnavailable) => {
            println!("MetaMask Required: set {} to use a local wallet", PRIVATE_KEY_ENV);
            return Err(Error::ProviderUnavailable);
        }
        Err(e) => return Err(e),
    };

    println!("Connected: {}", session.address());
    if let Some(chain_id) = session.chain_id() {
        println!("  Chain ID: {}", chain_id);
    }
    if let Some(balance) = session.balance() {
        println!("  Balance: {} 0G", format_units(balance, 18));
    }
    Ok(())
}

async fn run_inference(
    config: &Config,
    rpc_url: &url::Url,
    context: &WalletContext,
    state: &AppState,
) -> Result<()> {
    log_environment(context.provider_ref(), &state.log);

    let mut manager = WalletSessionManager::new(context.provider.clone(), state.log.clone());
    let session = manager.connect().await?;
    let broker = context.broker(config, rpc_url)?;

    tracing::info!(
        wallet = %session.address(),
        network = config.network.name(),
        "Starting inference run"
    );

    let runner = InferenceRunner::from_config(config, state.log.clone());
    let reply = runner.run(&session, &broker, state).await?;

    println!("{}", reply.content);
    Ok(())
}

async fn list_services(config: &Config, rpc_url: &url::Url, context: &WalletContext) -> Result<()> {
    let broker = context.broker(config, rpc_url)?;
    let services = broker.list_services().await?;

    if services.is_empty() {
        println!("No services registered");
        return Ok(());
    }

    for service in &services {
        println!("{}", service.provider);
        println!("  Type: {}", service.service_type);
        println!("  URL: {}", service.url);
        println!("  Model: {}", service.model);
        println!(
            "  Price (input/output): {} / {}",
            service.input_price, service.output_price
        );
    }
    Ok(())
}

fn print_log(log: &LogSink) {
    if log.is_empty() {
        return;
    }
    println!();
    println!("Session log:");
    for entry in log.snapshot() {
        println!("  {}", entry);
    }
}

fn write_transcript(log: &LogSink, path: &Path) -> Result<()> {
    log.write_jsonl(path)?;
    tracing::info!(path = %path.display(), entries = log.len(), "Wrote session transcript");
    Ok(())
}
