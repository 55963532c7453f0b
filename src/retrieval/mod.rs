//! Knowledge-base retrieval: HTML loading, embeddings, and the similarity
//! index behind the QA stage.

pub mod embedder;
pub mod index;
pub mod loader;

pub use embedder::{create_embedder, Embedder, EmbeddingConfig, RigEmbedder};
pub use index::{KnowledgeIndex, Retriever};
pub use loader::{load_knowledge_base, KnowledgeChunk};
