mod chunker;
mod indexer;
mod retriever;

pub use chunker::WindowChunker;
pub use indexer::KnowledgeIndexer;
pub use retriever::KnowledgeRetriever;
