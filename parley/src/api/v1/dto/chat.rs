//! Chat request/response DTOs for the v1 API.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::llm::{ChatCompletion, ChatOptions, TokenUsage};

/// Request body for the chat endpoints.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's prompt for this exchange.
    #[validate(length(min = 1))]
    pub prompt: String,
    /// One-off system instruction applied after the stored one.
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl ChatRequest {
    pub fn options(&self) -> Option<ChatOptions> {
        if self.temperature.is_none() && self.max_tokens.is_none() && self.top_p.is_none() {
            return None;
        }

        Some(ChatOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        })
    }
}

/// Token accounting reported by the model backend, when available.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<TokenUsage> for UsageResponse {
    fn from(u: TokenUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// Response for the non-streaming chat endpoint.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageResponse>,
}

impl From<ChatCompletion> for ChatResponse {
    fn from(c: ChatCompletion) -> Self {
        Self {
            content: c.content,
            usage: c.usage.map(Into::into),
        }
    }
}
