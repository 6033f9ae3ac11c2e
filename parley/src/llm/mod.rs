mod api;
mod provider;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::models::ConversationTurn;

pub use api::LlmApiClient;
pub use provider::{LlmBackend, LlmProvider};

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// A single increment of generated text.
#[derive(Debug, Clone)]
pub struct TokenDelta {
    pub content: String,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<TokenDelta>> + Send>>;

/// Boundary to the model backend. The orchestrator only ever sees ordered
/// turns going in and text (whole or incremental) coming out.
#[async_trait]
pub trait InferenceConnector: Send + Sync {
    async fn chat(
        &self,
        turns: &[ConversationTurn],
        options: Option<&ChatOptions>,
    ) -> Result<ChatCompletion>;

    async fn stream_chat(
        &self,
        turns: &[ConversationTurn],
        options: Option<&ChatOptions>,
    ) -> Result<TokenStream>;
}
