//! Signed request headers
//!
//! The gateway authenticates a request from a set of custom headers: the
//! wallet's signature over a request-specific payload, the keccak hash of the
//! body, and the account nonce and fee read from the broker. Which header
//! names carry each value is driven by [`HeaderAliases`].

use super::ChatRequest;
use crate::broker::ProviderAccount;
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of the signed payload
pub const SIGNING_DOMAIN: &str = "0g-inference";

/// Something that can personal-sign a message for the current wallet
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Returns a 0x-prefixed hex signature
    async fn sign_message(&self, message: &str) -> Result<String>;
}

/// Values the gateway may read from the headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthField {
    /// `Bearer <wallet>`
    Authorization,
    Provider,
    Account,
    Timestamp,
    Signature,
    RequestHash,
    Fee,
    Nonce,
    /// The wallet address again, under the names some gateways look for
    Address,
    ContentType,
}

/// Which header names carry each [`AuthField`]
///
/// The default table sends most values under several names because the
/// gateway's expected names are not pinned down. Every name for a field gets
/// the identical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderAliases(BTreeMap<AuthField, Vec<String>>);

impl HeaderAliases {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Replace the header names used for `field`
    pub fn with_names<I, S>(mut self, field: AuthField, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(field, names.into_iter().map(Into::into).collect());
        self
    }

    /// Overlay `overrides` field by field; an empty list turns a field off
    pub fn merge(mut self, overrides: HeaderAliases) -> Self {
        self.0.extend(overrides.0);
        self
    }

    pub fn names(&self, field: AuthField) -> &[String] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check every configured name is a valid HTTP header name
    pub fn validate(&self) -> Result<()> {
        for name in self.0.values().flatten() {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name {:?}: {}", name, e)))?;
        }
        Ok(())
    }
}

impl Default for HeaderAliases {
    fn default() -> Self {
        Self::empty()
            .with_names(AuthField::Authorization, ["Authorization"])
            .with_names(AuthField::Provider, ["X-Provider"])
            .with_names(AuthField::Account, ["X-Account"])
            .with_names(AuthField::Timestamp, ["X-Timestamp"])
            .with_names(AuthField::Signature, ["X-Signature", "Signature"])
            .with_names(AuthField::RequestHash, ["Request-Hash", "X-Request-Hash"])
            .with_names(AuthField::Fee, ["X-Fee", "Fee", "Input-Fee", "X-Input-Fee"])
            .with_names(AuthField::Nonce, ["Nonce", "X-Nonce"])
            .with_names(
                AuthField::Address,
                ["Address", "X-Address", "X-User-Address", "User-Address"],
            )
            .with_names(AuthField::ContentType, ["Content-Type"])
    }
}

/// Header name to value, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuthHeaders(BTreeMap<String, String>);

impl AuthHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Case-insensitive presence check
    pub fn contains(&self, name: &str) -> bool {
        self.0.keys().any(|k| k.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.0.len());
        for (name, value) in &self.0 {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidArgument(format!("header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidArgument(format!("header {}: {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    fn set(&mut self, aliases: &HeaderAliases, field: AuthField, value: &str) {
        for name in aliases.names(field) {
            self.0.insert(name.clone(), value.to_string());
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// keccak256 of the JSON-encoded request body
pub fn request_hash(request: &ChatRequest) -> Result<B256> {
    let body = serde_json::to_vec(request)?;
    Ok(keccak256(body))
}

/// The exact string the wallet signs
pub fn signing_payload(provider: Address, wallet: Address, timestamp_ms: u64, message: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        SIGNING_DOMAIN, provider, wallet, timestamp_ms, message
    )
}

/// Everything that goes into one header set
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub provider: Address,
    /// Fresh account snapshot; its wallet is the signing identity
    pub account: &'a ProviderAccount,
    /// The user message, signed verbatim
    pub message: &'a str,
    pub body: &'a ChatRequest,
    /// Captured once by the caller and reused for payload and header
    pub timestamp_ms: u64,
}

/// Build the signed header set for one request
///
/// Deterministic for fixed inputs apart from the signature itself. Any
/// failure is reported as [`Error::HeaderConstructionFailed`]; nothing is
/// retried.
pub async fn build_headers(
    request: AuthRequest<'_>,
    signer: &dyn MessageSigner,
    aliases: &HeaderAliases,
) -> Result<AuthHeaders> {
    let failed = |e: Error| Error::HeaderConstructionFailed(e.to_string());

    let hash = request_hash(request.body).map_err(failed)?;
    let wallet = request.account.wallet;
    let payload = signing_payload(
        request.provider,
        wallet,
        request.timestamp_ms,
        request.message,
    );
    let signature = signer.sign_message(&payload).await.map_err(failed)?;

    let wallet = wallet.to_string();
    let hash = hex::encode_prefixed(hash);
    let fee = request.account.fee.to_string();
    let nonce = request.account.nonce.to_string();

    let mut headers = AuthHeaders::default();
    headers.set(aliases, AuthField::Authorization, &format!("Bearer {}", wallet));
    headers.set(aliases, AuthField::Provider, &request.provider.to_string());
    headers.set(aliases, AuthField::Account, &wallet);
    headers.set(aliases, AuthField::Timestamp, &request.timestamp_ms.to_string());
    headers.set(aliases, AuthField::Signature, &signature);
    headers.set(aliases, AuthField::RequestHash, &hash);
    headers.set(aliases, AuthField::Fee, &fee);
    headers.set(aliases, AuthField::Nonce, &nonce);
    headers.set(aliases, AuthField::Address, &wallet);
    headers.set(aliases, AuthField::ContentType, "application/json");

    // Reject anything reqwest would refuse later.
    headers.to_header_map().map_err(failed)?;

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ChatMessage;
    use alloy::primitives::U256;
    use std::sync::Mutex;

    /// Signs by echoing a fixed signature and remembering the payload
    #[derive(Default)]
    struct StubSigner {
        payloads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSigner for StubSigner {
        async fn sign_message(&self, message: &str) -> Result<String> {
            self.payloads.lock().unwrap().push(message.to_string());
            Ok("0xsigned".to_string())
        }
    }

    struct RejectingSigner;

    #[async_trait]
    impl MessageSigner for RejectingSigner {
        async fn sign_message(&self, _message: &str) -> Result<String> {
            Err(Error::UserRejected)
        }
    }

    fn account() -> ProviderAccount {
        ProviderAccount {
            wallet: Address::repeat_byte(0xaa),
            provider: Address::repeat_byte(0x11),
            nonce: U256::from(7u64),
            fee: U256::from(150_000u64),
        }
    }

    fn body() -> ChatRequest {
        ChatRequest::new(
            "llama-3.3-70b",
            Some("You are a helpful assistant with a sense of humor."),
            "Tell me a short joke about programming.",
        )
    }

    fn auth_request<'a>(account: &'a ProviderAccount, body: &'a ChatRequest) -> AuthRequest<'a> {
        AuthRequest {
            provider: account.provider,
            account,
            message: "Tell me a short joke about programming.",
            body,
            timestamp_ms: 1_700_000_000_123,
        }
    }

    #[tokio::test]
    async fn test_headers_deterministic() {
        let account = account();
        let body = body();
        let signer = StubSigner::default();
        let aliases = HeaderAliases::default();

        let first = build_headers(auth_request(&account, &body), &signer, &aliases)
            .await
            .unwrap();
        let second = build_headers(auth_request(&account, &body), &signer, &aliases)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_default_headers_carry_all_fields() {
        let account = account();
        let body = body();
        let signer = StubSigner::default();

        let headers = build_headers(auth_request(&account, &body), &signer, &HeaderAliases::default())
            .await
            .unwrap();

        let wallet = account.wallet.to_string();
        let hash = hex::encode_prefixed(request_hash(&body).unwrap());

        assert_eq!(headers.get("Authorization"), Some(format!("Bearer {}", wallet).as_str()));
        assert_eq!(headers.get("X-Provider"), Some(account.provider.to_string().as_str()));
        assert_eq!(headers.get("X-Timestamp"), Some("1700000000123"));
        assert_eq!(headers.get("X-Signature"), Some("0xsigned"));
        assert_eq!(headers.get("Signature"), Some("0xsigned"));
        assert_eq!(headers.get("Request-Hash"), Some(hash.as_str()));
        assert_eq!(headers.get("X-Request-Hash"), Some(hash.as_str()));
        for name in ["X-Fee", "Fee", "Input-Fee", "X-Input-Fee"] {
            assert_eq!(headers.get(name), Some("150000"));
        }
        for name in ["Nonce", "X-Nonce"] {
            assert_eq!(headers.get(name), Some("7"));
        }
        for name in ["X-Account", "Address", "X-Address", "X-User-Address", "User-Address"] {
            assert_eq!(headers.get(name), Some(wallet.as_str()));
        }
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        assert_eq!(headers.len(), 19);
    }

    #[tokio::test]
    async fn test_signed_payload_format() {
        let account = account();
        let body = body();
        let signer = StubSigner::default();

        build_headers(auth_request(&account, &body), &signer, &HeaderAliases::default())
            .await
            .unwrap();

        let payloads = signer.payloads.lock().unwrap();
        assert_eq!(
            payloads.as_slice(),
            [format!(
                "0g-inference-{}-{}-1700000000123-Tell me a short joke about programming.",
                account.provider, account.wallet
            )]
        );
    }

    #[tokio::test]
    async fn test_custom_alias_table() {
        let account = account();
        let body = body();
        let signer = StubSigner::default();
        let aliases = HeaderAliases::empty()
            .with_names(AuthField::Signature, ["X-Sig"])
            .with_names(AuthField::Nonce, ["X-Nonce"]);

        let headers = build_headers(auth_request(&account, &body), &signer, &aliases)
            .await
            .unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("X-Sig"), Some("0xsigned"));
        assert!(headers.get("Authorization").is_none());
    }

    #[tokio::test]
    async fn test_signing_failure_is_header_failure() {
        let account = account();
        let body = body();

        let err = build_headers(auth_request(&account, &body), &RejectingSigner, &HeaderAliases::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HeaderConstructionFailed(_)));
    }

    #[tokio::test]
    async fn test_invalid_header_name_is_header_failure() {
        let account = account();
        let body = body();
        let aliases = HeaderAliases::empty().with_names(AuthField::Nonce, ["Bad Header"]);

        let err = build_headers(auth_request(&account, &body), &StubSigner::default(), &aliases)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HeaderConstructionFailed(_)));
        assert!(aliases.validate().is_err());
        assert!(HeaderAliases::default().validate().is_ok());
    }

    #[test]
    fn test_request_hash_stable_and_sensitive() {
        let body = body();
        assert_eq!(request_hash(&body).unwrap(), request_hash(&body.clone()).unwrap());

        let mut other_model = body.clone();
        other_model.model = "deepseek-r1-70b".to_string();
        assert_ne!(request_hash(&body).unwrap(), request_hash(&other_model).unwrap());

        let mut other_message = body.clone();
        other_message.messages[1] = ChatMessage::user("Tell me a long joke.");
        assert_ne!(request_hash(&body).unwrap(), request_hash(&other_message).unwrap());

        let mut other_role = body.clone();
        other_role.messages[0].role = "user".to_string();
        assert_ne!(request_hash(&body).unwrap(), request_hash(&other_role).unwrap());
    }

    #[test]
    fn test_request_hash_matches_keccak_of_json() {
        let body = ChatRequest::new("m", None, "hi");
        let expected = keccak256(br#"{"messages":[{"role":"user","content":"hi"}],"model":"m"}"#);
        assert_eq!(request_hash(&body).unwrap(), expected);
    }

    #[test]
    fn test_alias_table_deserializes() {
        let aliases: HeaderAliases =
            serde_json::from_str(r#"{"signature": ["X-Signature"], "nonce": ["X-Nonce"]}"#).unwrap();
        assert_eq!(aliases.names(AuthField::Signature), ["X-Signature".to_string()]);
        assert!(aliases.names(AuthField::Fee).is_empty());
    }

    #[test]
    fn test_merge_overrides_only_named_fields() {
        let overrides = HeaderAliases::empty()
            .with_names(AuthField::Signature, ["X-Sig"])
            .with_names(AuthField::Fee, Vec::<String>::new());
        let merged = HeaderAliases::default().merge(overrides);

        assert_eq!(merged.names(AuthField::Signature), ["X-Sig".to_string()]);
        assert!(merged.names(AuthField::Fee).is_empty());
        assert_eq!(
            merged.names(AuthField::Nonce),
            HeaderAliases::default().names(AuthField::Nonce)
        );
    }
}
