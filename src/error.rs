//! Error types for the inference client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No wallet provider available")]
    ProviderUnavailable,

    #[error("User rejected the account access request")]
    UserRejected,

    #[error("No inference services available")]
    NoServicesAvailable,

    /// Only ever logged; the run continues past it.
    #[error("Provider acknowledgment failed: {0}")]
    AcknowledgmentFailed(String),

    #[error("Failed to fetch service metadata: {0}")]
    MetadataFetchFailed(String),

    #[error("Header creation failed: {0}")]
    HeaderConstructionFailed(String),

    #[error("OpenAI request failed: {0}")]
    PrimaryDispatchFailed(String),

    #[error("OpenAI request failed: {primary} (direct fetch failed: {fallback})")]
    FallbackDispatchFailed { primary: String, fallback: String },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("An inference run is already in progress")]
    AlreadyRunning,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
