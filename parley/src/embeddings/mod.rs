mod provider;

use async_trait::async_trait;

use crate::error::Result;

pub use provider::EmbeddingProvider;

/// Produces dense vectors for retrieval. Queries and passages are embedded
/// asymmetrically so the two sides of the similarity search line up.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>>;
    async fn embed_passages(&self, passages: Vec<String>) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
}
