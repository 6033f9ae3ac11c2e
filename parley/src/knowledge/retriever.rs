use std::sync::Arc;

use crate::db::traits::VectorIndex;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::models::VectorMatch;

/// Similarity search over the per-conversation knowledge partition.
///
/// Retrieval is best effort: any failure is logged and reported as zero
/// matches so the chat flow proceeds unaugmented instead of failing.
pub struct KnowledgeRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: u32,
}

impl KnowledgeRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: u32) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub async fn retrieve(&self, conversation_id: &str, query: &str) -> Vec<VectorMatch> {
        match self.try_retrieve(conversation_id, query).await {
            Ok(matches) => matches,
            Err(error) => {
                tracing::warn!(
                    conversation_id,
                    %error,
                    "Knowledge retrieval failed, continuing without context"
                );
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, conversation_id: &str, query: &str) -> Result<Vec<VectorMatch>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_query(query).await?;
        self.index
            .query_vectors(&embedding, self.top_k, conversation_id)
            .await
    }

    /// Renders matches as a context block for a synthesized system turn.
    pub fn format_context(matches: &[VectorMatch]) -> Option<String> {
        if matches.is_empty() {
            return None;
        }

        let mut context = String::from(
            "Relevant reference material for this conversation:\n",
        );
        for m in matches {
            context.push_str("\n---\n");
            context.push_str(&m.content);
        }

        Some(context)
    }
}
