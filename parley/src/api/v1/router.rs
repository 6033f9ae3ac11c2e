use axum::{
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;

pub fn v1_router() -> Router<AppState> {
    let conversations = Router::new()
        .route(
            "/",
            get(handlers::conversations::list_conversations)
                .post(handlers::conversations::create_conversation),
        )
        .route("/search", get(handlers::conversations::search_conversations))
        .route(
            "/{conversationId}",
            get(handlers::conversations::get_conversation)
                .delete(handlers::conversations::delete_conversation),
        )
        .route("/{conversationId}/turns", get(handlers::conversations::get_turns))
        .route("/{conversationId}/chat", post(handlers::chat::chat))
        .route(
            "/{conversationId}/chat/stream",
            post(handlers::chat::chat_stream),
        )
        .route(
            "/{conversationId}/knowledge",
            post(handlers::knowledge::index_document),
        )
        .route(
            "/{conversationId}/knowledge/search",
            post(handlers::knowledge::search_knowledge),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .merge(super::openapi::redoc_router())
        .nest("/conversations", conversations)
}
