//! v1 chat handlers: one non-streaming endpoint and one SSE stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::StreamExt;
use validator::Validate;

use crate::api::v1::dto::chat::{ChatRequest, ChatResponse};
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;
use crate::services::ExchangeRequest;

/// `POST /api/v1/conversations/{conversationId}/chat`
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{conversationId}/chat",
    tag = "chat",
    params(("conversationId" = String, Path, description = "Conversation id")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Completed exchange", body = ChatResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Conversation not found", body = ApiError),
        (status = 501, description = "No LLM configured", body = ApiError),
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    axum::Json(req): axum::Json<ChatRequest>,
) -> ApiResponse<ChatResponse> {
    if let Err(errors) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, errors.to_string());
    }

    let request = ExchangeRequest {
        conversation_id,
        prompt: req.prompt.clone(),
        system_override: req.system.clone(),
        options: req.options(),
    };

    match state.orchestrator.complete_exchange(request).await {
        Ok(completion) => ApiResponse::success(completion.into()),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/conversations/{conversationId}/chat/stream`
///
/// Server-sent events: `token` events carry raw delta text, a terminal
/// `done` event marks success, and an `error` event carries the envelope's
/// error payload. A missing conversation is rejected with a 404 before any
/// event is sent.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{conversationId}/chat/stream",
    tag = "chat",
    params(("conversationId" = String, Path, description = "Conversation id")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "SSE token stream"),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Conversation not found", body = ApiError),
    )
)]
pub async fn chat_stream(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    axum::Json(req): axum::Json<ChatRequest>,
) -> axum::response::Response {
    if let Err(errors) = req.validate() {
        return ApiResponse::<()>::error(ErrorCode::InvalidRequest, errors.to_string())
            .into_response();
    }

    // Reject unknown conversations with a proper status before the SSE
    // response is committed as 200.
    match state.state_store.get_conversation(&conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return ApiResponse::<()>::error(
                ErrorCode::NotFound,
                format!("Conversation {conversation_id} not found"),
            )
            .into_response();
        }
        Err(e) => return ApiResponse::<()>::from(e).into_response(),
    }

    let request = ExchangeRequest {
        conversation_id,
        prompt: req.prompt.clone(),
        system_override: req.system.clone(),
        options: req.options(),
    };

    let mut tokens = state.orchestrator.stream_exchange(request);

    let events = async_stream::stream! {
        while let Some(item) = tokens.next().await {
            match item {
                Ok(delta) => {
                    yield Ok::<Event, Infallible>(
                        Event::default().event("token").data(delta.content),
                    );
                }
                Err(error) => {
                    let envelope: ApiResponse<()> = error.into();
                    let payload = envelope
                        .error
                        .map(|e| serde_json::json!({ "code": e.code, "message": e.message }))
                        .unwrap_or_else(|| serde_json::json!({ "code": "internal_error" }));
                    yield Ok(Event::default().event("error").data(payload.to_string()));
                    return;
                }
            }
        }
        yield Ok(Event::default().event("done").data(""));
    };

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}
