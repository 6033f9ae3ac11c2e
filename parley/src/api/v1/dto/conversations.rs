//! Conversation request/response DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Conversation, ConversationSummary, ConversationTurn};

/// Request body for `POST /v1/conversations`.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Owning user id.
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    /// Optional display title.
    #[validate(length(max = 512))]
    pub title: Option<String>,
    /// Optional standing instruction applied to every exchange.
    pub system_instruction: Option<String>,
}

/// A full conversation record.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            title: c.title,
            system_instruction: c.system_instruction,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// One row in a conversation listing.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryResponse {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub turn_count: u32,
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(s: ConversationSummary) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            title: s.title,
            turn_count: s.turn_count,
            updated_at: s.updated_at,
        }
    }
}

/// One message in a conversation's history.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    pub content: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<ConversationTurn> for TurnResponse {
    fn from(t: ConversationTurn) -> Self {
        Self {
            role: t.role.to_string(),
            content: t.content,
            created_at: t.created_at,
        }
    }
}

/// Query parameters for `GET /v1/conversations`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationsQuery {
    pub user_id: String,
    /// Zero-based page number.
    #[serde(default)]
    pub page: u32,
    /// Clamped to `1..=100`, defaults to 20.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Query parameters for `GET /v1/conversations/search`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchConversationsQuery {
    pub user_id: String,
    /// Search term matched against titles and turn content.
    pub q: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

pub fn default_page_size() -> u32 {
    20
}

pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, 100)
}

/// Response for `DELETE /v1/conversations/{conversationId}`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConversationResponse {
    pub deleted: bool,
}
