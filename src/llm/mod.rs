//! External model integration.
//!
//! The analyzer talks to a chat-completion endpoint through the `LlmClient`
//! trait; `OpenRouterClient` is the production implementation. The response
//! text is untrusted — callers must treat it as possibly non-JSON, truncated,
//! or absent.

mod openrouter;

pub use openrouter::OpenRouterClient;

use async_trait::async_trait;

use crate::error::LlmError;

/// A single chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// System instruction.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token budget.
    pub max_tokens: u32,
}

/// Synchronous request/response seam to the external model endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one chat completion and return the raw text payload.
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;
}
