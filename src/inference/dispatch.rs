//! Request dispatch with a diagnostic fallback
//!
//! The request goes out once through the OpenAI-compatible client. If that
//! fails, the same headers and body are POSTed raw so the status and body can
//! be logged; a successful raw reply is accepted as the answer.

use super::{AuthHeaders, ChatCompletion, ChatReply, ChatRequest, DispatchPath};
use crate::logs::LogSink;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// `{endpoint}/chat/completions`
pub fn completions_url(endpoint: &str) -> String {
    format!("{}/chat/completions", endpoint.trim_end_matches('/'))
}

/// OpenAI-compatible chat client
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn create(
        &self,
        endpoint: &str,
        headers: &AuthHeaders,
        request: &ChatRequest,
    ) -> Result<ChatCompletion>;
}

/// Raw HTTP status and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub message: String,
    /// Connection, timeout or request-layer failure
    pub network: bool,
}

impl TransportFailure {
    /// Whether remediation hints for reachability problems apply
    pub fn is_network_related(&self) -> bool {
        self.network || self.message.contains("fetch") || self.message.contains("CORS")
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(e: reqwest::Error) -> Self {
        Self {
            network: e.is_connect() || e.is_timeout() || e.is_request(),
            message: e.to_string(),
        }
    }
}

/// Plain POST used on the fallback path
#[async_trait]
pub trait RawPoster: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &AuthHeaders,
        request: &ChatRequest,
    ) -> std::result::Result<RawResponse, TransportFailure>;
}

/// [`CompletionClient`] over reqwest
///
/// The auth headers become the client's default headers. The credential is
/// empty because the gateway authenticates from the custom headers; it is
/// only sent when the header table has no `Authorization` of its own.
pub struct OpenAiCompatClient {
    api_key: String,
}

impl OpenAiCompatClient {
    pub fn new() -> Self {
        Self {
            api_key: String::new(),
        }
    }
}

impl Default for OpenAiCompatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn create(
        &self,
        endpoint: &str,
        headers: &AuthHeaders,
        request: &ChatRequest,
    ) -> Result<ChatCompletion> {
        let client = Client::builder()
            .default_headers(headers.to_header_map()?)
            .build()?;

        let mut builder = client.post(completions_url(endpoint)).json(request);
        if !headers.contains("authorization") {
            builder = builder.bearer_auth(&self.api_key);
        }

        let completion = builder
            .send()
            .await?
            .error_for_status()?
            .json::<ChatCompletion>()
            .await?;

        Ok(completion)
    }
}

/// [`RawPoster`] over reqwest
#[derive(Default)]
pub struct RawHttpPoster {
    client: Client,
}

impl RawHttpPoster {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RawPoster for RawHttpPoster {
    async fn post(
        &self,
        url: &str,
        headers: &AuthHeaders,
        request: &ChatRequest,
    ) -> std::result::Result<RawResponse, TransportFailure> {
        let body = serde_json::to_vec(request).map_err(|e| TransportFailure {
            message: format!("Failed to encode body: {}", e),
            network: false,
        })?;

        let header_map = headers.to_header_map().map_err(|e| TransportFailure {
            message: e.to_string(),
            network: false,
        })?;

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .headers(header_map)
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}

/// Issues one logical request per call
pub struct Dispatcher {
    primary: Arc<dyn CompletionClient>,
    fallback: Arc<dyn RawPoster>,
    log: LogSink,
}

impl Dispatcher {
    pub fn new(
        primary: Arc<dyn CompletionClient>,
        fallback: Arc<dyn RawPoster>,
        log: LogSink,
    ) -> Self {
        Self {
            primary,
            fallback,
            log,
        }
    }

    /// Reqwest-backed primary and fallback paths
    pub fn http(log: LogSink) -> Self {
        Self::new(
            Arc::new(OpenAiCompatClient::new()),
            Arc::new(RawHttpPoster::new()),
            log,
        )
    }

    pub async fn dispatch(
        &self,
        endpoint: &str,
        headers: &AuthHeaders,
        request: &ChatRequest,
    ) -> Result<ChatReply> {
        self.log.append("Making OpenAI request...");

        let primary_error = match self.primary.create(endpoint, headers, request).await {
            Ok(completion) => {
                self.log.append("OpenAI Response received");
                match completion.first_content() {
                    Some(content) => {
                        return Ok(ChatReply {
                            content,
                            path: DispatchPath::Primary,
                        })
                    }
                    None => "Invalid response format from API".to_string(),
                }
            }
            Err(e) => e.to_string(),
        };

        self.log
            .append(format!("OpenAI request failed: {}", primary_error));
        tracing::warn!(endpoint = endpoint, error = %primary_error, "Primary request failed, trying direct fetch");

        self.fallback(endpoint, headers, request, primary_error)
            .await
    }

    async fn fallback(
        &self,
        endpoint: &str,
        headers: &AuthHeaders,
        request: &ChatRequest,
        primary_error: String,
    ) -> Result<ChatReply> {
        self.log
            .append("Attempting direct fetch to debug connection...");

        let url = completions_url(endpoint);
        let response = match self.fallback.post(&url, headers, request).await {
            Ok(response) => response,
            Err(failure) => {
                self.log
                    .append(format!("Direct fetch failed: {}", failure.message));
                if failure.is_network_related() {
                    self.log_network_hints();
                }
                return Err(Error::FallbackDispatchFailed {
                    primary: primary_error,
                    fallback: failure.message,
                });
            }
        };

        self.log
            .append(format!("Direct fetch status: {}", response.status));

        if !response.is_success() {
            self.log
                .append(format!("Direct fetch error response: {}", response.body));
            return Err(Error::PrimaryDispatchFailed(primary_error));
        }

        let completion: ChatCompletion = match serde_json::from_str(&response.body) {
            Ok(completion) => completion,
            Err(e) => {
                self.log
                    .append(format!("Direct fetch returned an unreadable body: {}", e));
                return Err(Error::PrimaryDispatchFailed(primary_error));
            }
        };
        self.log.append("Direct fetch succeeded!");

        match completion.first_content() {
            Some(content) => Ok(ChatReply {
                content,
                path: DispatchPath::Fallback,
            }),
            None => {
                self.log.append("Direct fetch response contained no choices");
                Err(Error::PrimaryDispatchFailed(primary_error))
            }
        }
    }

    fn log_network_hints(&self) {
        self.log.append("Network/CORS error detected!");
        self.log.append("Solutions:");
        self.log
            .append("1. Route requests through a proxy that can reach the gateway");
        self.log
            .append("2. Run a local proxy server in front of the provider endpoint");
        self.log
            .append("3. Contact the provider about gateway availability and CORS headers");
    }
}
