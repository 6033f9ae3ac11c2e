use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parley API",
        version = "1.0.0",
        description = "Conversation orchestration engine: resilient cached chat state, per-conversation knowledge retrieval, and streaming exchanges.",
    ),
    paths(
        handlers::health::health_check,
        handlers::conversations::create_conversation,
        handlers::conversations::get_conversation,
        handlers::conversations::get_turns,
        handlers::conversations::list_conversations,
        handlers::conversations::search_conversations,
        handlers::conversations::delete_conversation,
        handlers::chat::chat,
        handlers::chat::chat_stream,
        handlers::knowledge::index_document,
        handlers::knowledge::search_knowledge,
    ),
    components(schemas(
        // Response envelope
        response::ErrorCode,
        response::ApiError,
        response::ResponseMeta,
        // Conversations
        dto::conversations::CreateConversationRequest,
        dto::conversations::ConversationResponse,
        dto::conversations::ConversationSummaryResponse,
        dto::conversations::TurnResponse,
        dto::conversations::DeleteConversationResponse,
        // Chat
        dto::chat::ChatRequest,
        dto::chat::ChatResponse,
        dto::chat::UsageResponse,
        // Knowledge
        dto::knowledge::IndexDocumentRequest,
        dto::knowledge::IndexDocumentResponse,
        dto::knowledge::KnowledgeSearchRequest,
        dto::knowledge::KnowledgeMatchResponse,
        dto::knowledge::KnowledgeSearchResponse,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::ComponentStatus,
        handlers::health::EmbeddingsStatus,
        handlers::health::LlmStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "conversations", description = "Conversation CRUD, listing, and search"),
        (name = "chat", description = "Streaming and non-streaming exchanges"),
        (name = "knowledge", description = "Per-conversation knowledge indexing and retrieval"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
