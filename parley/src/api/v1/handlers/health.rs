use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub database: ComponentStatus,
    pub cache: ComponentStatus,
    pub embeddings: EmbeddingsStatus,
    pub llm: LlmStatus,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ComponentStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct EmbeddingsStatus {
    pub status: String,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LlmStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `GET /api/v1/health`
///
/// Always returns 200; degraded components are reported in the payload. The
/// cache being down is expected operation, not an outage.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let database = match state.db.sync().await {
        Ok(()) => ComponentStatus {
            status: "ok".to_string(),
        },
        Err(error) => {
            tracing::warn!(%error, "Database health check failed");
            ComponentStatus {
                status: "error".to_string(),
            }
        }
    };

    let cache = match state.cache.exists("parley:health").await {
        Ok(_) => ComponentStatus {
            status: "ok".to_string(),
        },
        Err(_) => ComponentStatus {
            status: "unavailable".to_string(),
        },
    };

    let embeddings = EmbeddingsStatus {
        status: "ok".to_string(),
        model: state.config.embeddings.model.clone(),
        dimensions: state.config.embeddings.dimensions,
    };

    let llm = if state.llm.is_available() {
        LlmStatus {
            status: "ok".to_string(),
            model: state.config.llm.as_ref().map(|l| l.model.clone()),
        }
    } else {
        LlmStatus {
            status: "unconfigured".to_string(),
            model: None,
        }
    };

    let status = if database.status == "ok" { "ok" } else { "degraded" };

    ApiResponse::success(HealthData {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        cache,
        embeddings,
        llm,
    })
}
