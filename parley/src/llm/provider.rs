use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{parse_llm_provider_model, LlmConfig};
use crate::error::{ParleyError, Result};
use crate::llm::api::LlmApiClient;
use crate::llm::{ChatCompletion, ChatOptions, InferenceConnector, TokenStream};
use crate::models::ConversationTurn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

#[derive(Debug, Clone)]
pub struct LlmProvider {
    backend: LlmBackend,
    config: Option<Arc<LlmConfig>>,
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No LLM configuration provided");
        };

        let (provider, _model) = parse_llm_provider_model(&config.model);

        let backend = match provider.to_lowercase().as_str() {
            "openai" => LlmBackend::OpenAI,
            "openrouter" => LlmBackend::OpenRouter,
            "ollama" => LlmBackend::Ollama,
            "lmstudio" => LlmBackend::LmStudio,
            _ => {
                if let Some(base_url) = &config.base_url {
                    LlmBackend::OpenAICompatible {
                        base_url: base_url.clone(),
                    }
                } else {
                    LlmBackend::Unavailable {
                        reason: format!("Unknown provider in model: {}", config.model),
                    }
                }
            }
        };

        Self {
            backend,
            config: Some(Arc::new(config.clone())),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: LlmBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, LlmBackend::Unavailable { .. })
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    fn client(&self) -> Result<LlmApiClient> {
        if !self.is_available() {
            return Err(ParleyError::LlmUnavailable(self.unavailable_reason()));
        }

        let config = self
            .config
            .as_deref()
            .ok_or_else(|| ParleyError::LlmUnavailable("No config available".to_string()))?;

        LlmApiClient::new(config)
    }

    fn unavailable_reason(&self) -> String {
        match &self.backend {
            LlmBackend::Unavailable { reason } => reason.clone(),
            _ => "LLM backend is not configured".to_string(),
        }
    }
}

#[async_trait]
impl InferenceConnector for LlmProvider {
    async fn chat(
        &self,
        turns: &[ConversationTurn],
        options: Option<&ChatOptions>,
    ) -> Result<ChatCompletion> {
        self.client()?.chat(turns, options).await
    }

    async fn stream_chat(
        &self,
        turns: &[ConversationTurn],
        options: Option<&ChatOptions>,
    ) -> Result<TokenStream> {
        self.client()?.stream_chat(turns, options).await
    }
}
