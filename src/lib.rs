//! 0G Inference Client
//!
//! Connects to a wallet and performs a single authenticated chat request
//! against a 0G inference provider:
//! - Discover providers through the serving broker
//! - Acknowledge the provider signer on-chain (best effort)
//! - Sign request headers with the wallet and call the OpenAI-compatible gateway
//!
//! # Security Model
//!
//! - Private keys never leave the wallet module
//! - The gateway credential field is left empty; authentication is carried
//!   entirely in signed custom headers

pub mod broker;
pub mod config;
pub mod diagnostics;
pub mod inference;
pub mod logs;
pub mod runner;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{Config, RpcConfig, PRIVATE_KEY_ENV};
pub use error::{Error, Result};
pub use logs::{LogEntry, LogSink};
pub use runner::{AppState, InferenceRunner};
