//! Collaborator interfaces: embedding and chat providers
//!
//! The core never generates embeddings or runs an LLM itself (spec
//! Non-goals). It delegates every such call to an injected client, awaits
//! it as the only suspension point between otherwise-synchronous storage
//! writes, and downgrades to structured degradation when the call fails.

use async_trait::async_trait;

/// A chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Token usage reported by a chat call, when the provider supplies it.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub usage: Option<ChatUsage>,
}

/// Optional generation parameters for a chat call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// An error returned by a provider call. The core maps this to
/// [`crate::Error::ProviderFailure`] or, at the documented degradation
/// points, swallows it after logging at `warn`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// An embedding generator, injected by the caller.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}

/// A chat/completion model, injected by the caller.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Run a chat completion over `messages`.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> std::result::Result<ChatResponse, ProviderError>;
}
