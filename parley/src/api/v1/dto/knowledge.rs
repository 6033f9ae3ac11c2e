//! Knowledge indexing and retrieval DTOs for the v1 API.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::VectorMatch;

/// Request body for `POST /v1/conversations/{conversationId}/knowledge`.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocumentRequest {
    /// Raw reference text to chunk, embed, and index.
    #[validate(length(min = 1))]
    pub text: String,
}

/// Response for a successful indexing call.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocumentResponse {
    pub chunks_indexed: usize,
}

/// Request body for `POST /v1/conversations/{conversationId}/knowledge/search`.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSearchRequest {
    #[validate(length(min = 1))]
    pub query: String,
    /// Defaults to the configured retrieval depth.
    pub top_k: Option<u32>,
}

/// One similarity-search hit.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeMatchResponse {
    pub chunk_index: u32,
    pub content: String,
    pub score: f32,
}

impl From<VectorMatch> for KnowledgeMatchResponse {
    fn from(m: VectorMatch) -> Self {
        Self {
            chunk_index: m.chunk_index,
            content: m.content,
            score: m.score,
        }
    }
}

/// Response for a knowledge search.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSearchResponse {
    pub matches: Vec<KnowledgeMatchResponse>,
}
