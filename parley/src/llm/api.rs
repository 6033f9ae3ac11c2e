use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use futures::StreamExt;

use crate::config::{parse_llm_provider_model, LlmConfig};
use crate::error::{ParleyError, Result};
use crate::llm::{ChatCompletion, ChatOptions, TokenDelta, TokenStream, TokenUsage};
use crate::models::{ConversationTurn, Role};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone)]
struct ApiConfig {
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
}

#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    config: ApiConfig,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_config = ApiConfig::from_llm_config(config);

        let (provider, _) = parse_llm_provider_model(&config.model);
        let needs_api_key = !matches!(
            provider.to_lowercase().as_str(),
            "ollama" | "local" | "lmstudio"
        );

        if needs_api_key && api_config.api_key.is_none() {
            return Err(ParleyError::Llm(
                "API key required for this provider".to_string(),
            ));
        }

        let openai_config = OpenAIConfig::new()
            .with_api_base(api_config.base_url.clone())
            .with_api_key(api_config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api_config.timeout_secs))
            .build()
            .map_err(|error| {
                ParleyError::Llm(format!("Failed to create LLM HTTP client: {error}"))
            })?;

        // Cap async-openai's internal backoff at our request timeout. Its
        // default max_elapsed_time keeps retrying 500s for up to 15 minutes,
        // independent of the retry loop in chat().
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(api_config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            config: api_config,
        })
    }

    pub async fn chat(
        &self,
        turns: &[ConversationTurn],
        options: Option<&ChatOptions>,
    ) -> Result<ChatCompletion> {
        if turns.is_empty() {
            return Err(ParleyError::Validation(
                "Chat request needs at least one turn".to_string(),
            ));
        }

        let mut last_error: Option<ParleyError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(turns, options, false)?;

            match self.client.chat().create(request).await {
                Ok(response) => return Self::extract_completion(response),
                Err(error) => {
                    if let Some(rate_limit_error) = Self::rate_limit_error(&error) {
                        return Err(rate_limit_error);
                    }

                    if let Some(auth_error) = Self::auth_error(&error) {
                        return Err(auth_error);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.config.max_retries {
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ParleyError::Llm("LLM chat failed after retries".to_string())))
    }

    /// Opens a streaming completion. Retries apply to establishing the
    /// stream only; once tokens flow, failures surface as stream items.
    pub async fn stream_chat(
        &self,
        turns: &[ConversationTurn],
        options: Option<&ChatOptions>,
    ) -> Result<TokenStream> {
        if turns.is_empty() {
            return Err(ParleyError::Validation(
                "Chat request needs at least one turn".to_string(),
            ));
        }

        let mut last_error: Option<ParleyError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(turns, options, true)?;

            match self.client.chat().create_stream(request).await {
                Ok(stream) => {
                    let deltas = stream.filter_map(|item| async move {
                        match item {
                            Ok(chunk) => chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|choice| choice.delta.content)
                                .filter(|content| !content.is_empty())
                                .map(|content| Ok(TokenDelta { content })),
                            Err(error) => Some(Err(Self::map_openai_error(error))),
                        }
                    });
                    return Ok(Box::pin(deltas));
                }
                Err(error) => {
                    if let Some(rate_limit_error) = Self::rate_limit_error(&error) {
                        return Err(rate_limit_error);
                    }

                    if let Some(auth_error) = Self::auth_error(&error) {
                        return Err(auth_error);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.config.max_retries {
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ParleyError::Llm("LLM stream failed after retries".to_string())))
    }

    fn build_request(
        &self,
        turns: &[ConversationTurn],
        options: Option<&ChatOptions>,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::with_capacity(turns.len());
        for turn in turns {
            messages.push(Self::turn_to_message(turn)?);
        }

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(self.config.model.clone())
            .messages(messages)
            .stream(stream);
        Self::apply_chat_options(&mut request, options);

        request
            .build()
            .map_err(|error| ParleyError::Validation(format!("Invalid chat request: {error}")))
    }

    fn turn_to_message(turn: &ConversationTurn) -> Result<ChatCompletionRequestMessage> {
        let message = match turn.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(|error| {
                    ParleyError::Validation(format!("Invalid system turn: {error}"))
                })?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(|error| ParleyError::Validation(format!("Invalid user turn: {error}")))?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(|error| {
                    ParleyError::Validation(format!("Invalid assistant turn: {error}"))
                })?
                .into(),
        };

        Ok(message)
    }

    fn apply_chat_options(
        request: &mut CreateChatCompletionRequestArgs,
        options: Option<&ChatOptions>,
    ) {
        let Some(options) = options else {
            return;
        };

        if let Some(temperature) = options.temperature {
            request.temperature(temperature);
        }

        if let Some(max_tokens) = options.max_tokens {
            request.max_tokens(max_tokens);
        }

        if let Some(top_p) = options.top_p {
            request.top_p(top_p);
        }
    }

    fn extract_completion(response: CreateChatCompletionResponse) -> Result<ChatCompletion> {
        let usage = response.usage.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ParleyError::Llm("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ParleyError::Llm(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(ChatCompletion { content, usage })
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn rate_limit_error(error: &OpenAIError) -> Option<ParleyError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
            {
                Some(ParleyError::LlmRateLimit { retry_after: None })
            }
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(api_error) => {
                Some(ParleyError::LlmRateLimit { retry_after: None })
            }
            _ => None,
        }
    }

    fn auth_error(error: &OpenAIError) -> Option<ParleyError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || reqwest_error.status() == Some(reqwest::StatusCode::FORBIDDEN) =>
            {
                Some(ParleyError::Llm(format!(
                    "LLM authentication failed: {reqwest_error}"
                )))
            }
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(api_error) => Some(
                ParleyError::Llm(format!("LLM authentication failed: {api_error}")),
            ),
            _ => None,
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("authentication")
            || message.contains("invalid api key")
            || code.contains("invalid_api_key")
            || code.contains("authentication")
            || error_type.contains("authentication")
    }

    fn map_openai_error(error: OpenAIError) -> ParleyError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                ParleyError::Llm(format!("LLM request failed: {reqwest_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                ParleyError::Llm(format!("LLM API error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                ParleyError::Llm(format!("Failed to parse LLM response: {err}"))
            }
            OpenAIError::StreamError(message) => {
                ParleyError::Llm(format!("LLM stream error: {message}"))
            }
            OpenAIError::InvalidArgument(message) => ParleyError::Validation(message),
            other => ParleyError::Llm(other.to_string()),
        }
    }
}

impl ApiConfig {
    fn from_llm_config(config: &LlmConfig) -> Self {
        let (provider, model) = parse_llm_provider_model(&config.model);

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider).to_string());

        let normalized_model = if provider.eq_ignore_ascii_case("local") {
            config.model.clone()
        } else {
            model.to_string()
        };

        Self {
            base_url,
            api_key: config.api_key.clone(),
            model: normalized_model,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }
}

fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openai" => OPENAI_BASE_URL,
        "openrouter" => OPENROUTER_BASE_URL,
        "ollama" => OLLAMA_BASE_URL,
        "lmstudio" => "http://localhost:1234/v1",
        _ => OPENAI_BASE_URL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn test_llm_config() -> LlmConfig {
        LlmConfig {
            model: "ollama/llama3".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 30,
            max_retries: 0,
        }
    }

    #[test]
    fn test_build_request_maps_every_role() {
        let config = test_llm_config();
        let client = LlmApiClient::new(&config).expect("client should be created");

        let turns = vec![
            ConversationTurn::system("be brief"),
            ConversationTurn::user("hello"),
            ConversationTurn::assistant("hi"),
            ConversationTurn::user("what now?"),
        ];

        let request = client
            .build_request(&turns, None, false)
            .expect("request should build");

        assert_eq!(request.messages.len(), 4);
        assert!(matches!(
            request.messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            request.messages[1],
            ChatCompletionRequestMessage::User(_)
        ));
        assert!(matches!(
            request.messages[2],
            ChatCompletionRequestMessage::Assistant(_)
        ));
        assert!(matches!(
            request.messages[3],
            ChatCompletionRequestMessage::User(_)
        ));
    }

    #[test]
    fn test_build_request_sets_stream_flag() {
        let config = test_llm_config();
        let client = LlmApiClient::new(&config).expect("client should be created");
        let turns = vec![ConversationTurn::user("hello")];

        let streamed = client.build_request(&turns, None, true).unwrap();
        assert_eq!(streamed.stream, Some(true));

        let unary = client.build_request(&turns, None, false).unwrap();
        assert_eq!(unary.stream, Some(false));
    }

    #[test]
    fn test_ollama_provider_needs_no_api_key() {
        let config = test_llm_config();
        assert!(LlmApiClient::new(&config).is_ok());
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let config = LlmConfig {
            model: "openai/gpt-4o-mini".to_string(),
            ..test_llm_config()
        };
        assert!(LlmApiClient::new(&config).is_err());
    }

    #[test]
    fn test_default_base_urls() {
        assert_eq!(default_base_url("openai"), OPENAI_BASE_URL);
        assert_eq!(default_base_url("openrouter"), OPENROUTER_BASE_URL);
        assert_eq!(default_base_url("ollama"), OLLAMA_BASE_URL);
        assert_eq!(default_base_url("something-else"), OPENAI_BASE_URL);
    }
}
