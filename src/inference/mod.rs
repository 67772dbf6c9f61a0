//! Authenticated chat requests against a provider gateway

pub mod auth;
pub mod dispatch;
mod types;

pub use auth::{
    build_headers, now_millis, AuthField, AuthHeaders, AuthRequest, HeaderAliases, MessageSigner,
};
pub use dispatch::{
    CompletionClient, Dispatcher, OpenAiCompatClient, RawHttpPoster, RawPoster, RawResponse,
    TransportFailure,
};
pub use types::{ChatCompletion, ChatMessage, ChatReply, ChatRequest, DispatchPath};
