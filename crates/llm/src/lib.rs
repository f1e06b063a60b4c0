//! Drafthorse LLM
//!
//! The language-model port of the research engine: a small chat interface
//! over which the supervisor and sub-researchers converse with a model.
//! Tool calls are not part of this interface; they ride inside the message
//! text and are parsed by `drafthorse-tools`.
//!
//! One concrete implementation is provided: `OpenAiProvider`, speaking the
//! OpenAI-compatible `/chat/completions` wire format. Any endpoint that
//! accepts that format (including local inference gateways) works through a
//! `base_url` override.

pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::{missing_api_key_error, parse_http_error, LlmProvider};
pub use types::{
    ChatChoice, ChatResponse, LlmError, LlmResult, Message, MessageRole, ProviderConfig,
    UsageStats,
};
