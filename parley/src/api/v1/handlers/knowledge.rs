//! v1 knowledge indexing and search handlers.

use axum::extract::{Path, State};
use validator::Validate;

use crate::api::v1::dto::knowledge::{
    IndexDocumentRequest, IndexDocumentResponse, KnowledgeSearchRequest, KnowledgeSearchResponse,
};
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;

/// `POST /api/v1/conversations/{conversationId}/knowledge`
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{conversationId}/knowledge",
    tag = "knowledge",
    params(("conversationId" = String, Path, description = "Conversation id")),
    request_body = IndexDocumentRequest,
    responses(
        (status = 201, description = "Document indexed", body = IndexDocumentResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Conversation not found", body = ApiError),
    )
)]
pub async fn index_document(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    axum::Json(req): axum::Json<IndexDocumentRequest>,
) -> ApiResponse<IndexDocumentResponse> {
    if let Err(errors) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, errors.to_string());
    }

    match state.state_store.get_conversation(&conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return ApiResponse::error(
                ErrorCode::NotFound,
                format!("Conversation {conversation_id} not found"),
            )
        }
        Err(e) => return e.into(),
    }

    match state.indexer.index_document(&conversation_id, &req.text).await {
        Ok(chunks_indexed) => ApiResponse::created(IndexDocumentResponse { chunks_indexed }),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/conversations/{conversationId}/knowledge/search`
///
/// Direct similarity search over a conversation's indexed knowledge.
/// Retrieval faults follow the engine policy: logged, reported as empty.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{conversationId}/knowledge/search",
    tag = "knowledge",
    params(("conversationId" = String, Path, description = "Conversation id")),
    request_body = KnowledgeSearchRequest,
    responses(
        (status = 200, description = "Ranked matches", body = KnowledgeSearchResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 501, description = "Retrieval disabled", body = ApiError),
    )
)]
pub async fn search_knowledge(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    axum::Json(req): axum::Json<KnowledgeSearchRequest>,
) -> ApiResponse<KnowledgeSearchResponse> {
    if let Err(errors) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, errors.to_string());
    }

    let Some(retriever) = &state.retriever else {
        return ApiResponse::error(
            ErrorCode::NotImplemented,
            "Knowledge retrieval is disabled on this deployment",
        );
    };

    let mut matches = retriever.retrieve(&conversation_id, &req.query).await;
    if let Some(top_k) = req.top_k {
        matches.truncate(top_k as usize);
    }

    ApiResponse::success(KnowledgeSearchResponse {
        matches: matches.into_iter().map(Into::into).collect(),
    })
}
