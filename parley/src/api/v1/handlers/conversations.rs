//! v1 conversation CRUD and listing handlers.

use axum::extract::{Path, Query, State};
use nanoid::nanoid;
use validator::Validate;

use crate::api::v1::dto::conversations::{
    clamp_page_size, ConversationResponse, ConversationSummaryResponse, CreateConversationRequest,
    DeleteConversationResponse, ListConversationsQuery, SearchConversationsQuery, TurnResponse,
};
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode, ResponseMeta};
use crate::api::AppState;
use crate::models::Conversation;

/// `POST /api/v1/conversations`
#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    tag = "conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 400, description = "Invalid request", body = ApiError),
    )
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<CreateConversationRequest>,
) -> ApiResponse<ConversationResponse> {
    if let Err(errors) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, errors.to_string());
    }

    let mut conversation = Conversation::new(nanoid!(), req.user_id);
    conversation.title = req.title;
    conversation.system_instruction = req.system_instruction;

    match state.state_store.create_conversation(&conversation).await {
        Ok(()) => ApiResponse::created(conversation.into()),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/conversations/{conversationId}`
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{conversationId}",
    tag = "conversations",
    params(("conversationId" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResponse<ConversationResponse> {
    match state.state_store.get_conversation(&conversation_id).await {
        Ok(Some(conversation)) => ApiResponse::success(conversation.into()),
        Ok(None) => ApiResponse::error(
            ErrorCode::NotFound,
            format!("Conversation {conversation_id} not found"),
        ),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/conversations/{conversationId}/turns`
///
/// Returns the full turn history, served from cache when warm.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{conversationId}/turns",
    tag = "conversations",
    params(("conversationId" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Ordered turn history", body = [TurnResponse]),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn get_turns(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResponse<Vec<TurnResponse>> {
    match state.state_store.load(&conversation_id).await {
        Ok(turns) => ApiResponse::success(turns.into_iter().map(Into::into).collect()),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/conversations`
#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "conversations",
    params(ListConversationsQuery),
    responses(
        (status = 200, description = "Page of conversations", body = [ConversationSummaryResponse]),
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> ApiResponse<Vec<ConversationSummaryResponse>> {
    if query.user_id.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "userId cannot be empty");
    }

    let page_size = clamp_page_size(query.page_size);
    match state
        .state_store
        .list_conversations(&query.user_id, query.page, page_size)
        .await
    {
        Ok(result) => ApiResponse::success_with_meta(
            result.items.into_iter().map(Into::into).collect(),
            ResponseMeta {
                page: result.page,
                page_size: result.page_size,
                total: result.total,
            },
        ),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/conversations/search`
#[utoipa::path(
    get,
    path = "/api/v1/conversations/search",
    tag = "conversations",
    params(SearchConversationsQuery),
    responses(
        (status = 200, description = "Matching conversations", body = [ConversationSummaryResponse]),
    )
)]
pub async fn search_conversations(
    State(state): State<AppState>,
    Query(query): Query<SearchConversationsQuery>,
) -> ApiResponse<Vec<ConversationSummaryResponse>> {
    if query.user_id.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "userId cannot be empty");
    }
    if query.q.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "q cannot be empty");
    }

    let page_size = clamp_page_size(query.page_size);
    match state
        .state_store
        .search_conversations(&query.user_id, &query.q, query.page, page_size)
        .await
    {
        Ok(result) => ApiResponse::success_with_meta(
            result.items.into_iter().map(Into::into).collect(),
            ResponseMeta {
                page: result.page,
                page_size: result.page_size,
                total: result.total,
            },
        ),
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/conversations/{conversationId}`
#[utoipa::path(
    delete,
    path = "/api/v1/conversations/{conversationId}",
    tag = "conversations",
    params(("conversationId" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Deletion result", body = DeleteConversationResponse),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResponse<DeleteConversationResponse> {
    match state.state_store.delete_conversation(&conversation_id).await {
        Ok(true) => ApiResponse::success(DeleteConversationResponse { deleted: true }),
        Ok(false) => ApiResponse::error(
            ErrorCode::NotFound,
            format!("Conversation {conversation_id} not found"),
        ),
        Err(e) => e.into(),
    }
}
