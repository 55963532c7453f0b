//! In-memory similarity index over knowledge chunks.
//!
//! Built exactly once at process startup and shared read-only by all
//! concurrent QA calls. Construction is explicit and the index is passed by
//! reference into the QA stage — there is no ambient global.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::retrieval::embedder::Embedder;
use crate::retrieval::loader::KnowledgeChunk;

/// Batch size for embedding calls during construction.
const EMBED_BATCH: usize = 64;

/// Similarity search over knowledge chunks.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` chunks ordered most-to-least relevant.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<KnowledgeChunk>, RetrievalError>;
}

struct IndexEntry {
    chunk: KnowledgeChunk,
    embedding: Vec<f32>,
}

/// Cosine-similarity index over embedded knowledge chunks.
pub struct KnowledgeIndex {
    entries: Vec<IndexEntry>,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeIndex {
    /// Build the index by embedding every chunk.
    ///
    /// Fails with `IndexUnavailable` when there are no chunks — an empty
    /// index would make "service not ready" indistinguishable from "no
    /// relevant match."
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        chunks: Vec<KnowledgeChunk>,
    ) -> Result<Self, RetrievalError> {
        if chunks.is_empty() {
            return Err(RetrievalError::IndexUnavailable {
                reason: "no knowledge documents found".to_string(),
            });
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = embedder.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(RetrievalError::EmbeddingFailed {
                    reason: format!(
                        "embedding count mismatch: {} texts, {} vectors",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }
            for (chunk, embedding) in batch.iter().cloned().zip(embeddings) {
                entries.push(IndexEntry { chunk, embedding });
            }
        }

        tracing::info!(entries = entries.len(), "Knowledge index built");
        Ok(Self { entries, embedder })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Retriever for KnowledgeIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
        if self.entries.is_empty() {
            return Err(RetrievalError::IndexUnavailable {
                reason: "index holds no documents".to_string(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed {
                reason: "embedding service returned no vector for the query".to_string(),
            })?;

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query_embedding, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| entry.chunk.clone())
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Deterministic embedder: fixed vectors per known text, a default
    /// otherwise.
    struct FakeEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
                .collect())
        }
    }

    fn chunk(text: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            text: text.to_string(),
            source: "test.html".to_string(),
        }
    }

    fn fake_embedder() -> Arc<dyn Embedder> {
        let mut vectors = HashMap::new();
        vectors.insert("dental gold".to_string(), vec![1.0, 0.0, 0.0]);
        vectors.insert("dental silver".to_string(), vec![0.9, 0.1, 0.0]);
        vectors.insert("optometry".to_string(), vec![0.0, 1.0, 0.0]);
        vectors.insert("dental?".to_string(), vec![1.0, 0.0, 0.0]);
        Arc::new(FakeEmbedder { vectors })
    }

    #[tokio::test]
    async fn build_empty_fails_with_index_unavailable() {
        let result = KnowledgeIndex::build(fake_embedder(), Vec::new()).await;
        assert!(matches!(result, Err(RetrievalError::IndexUnavailable { .. })));
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let index = KnowledgeIndex::build(
            fake_embedder(),
            vec![chunk("optometry"), chunk("dental silver"), chunk("dental gold")],
        )
        .await
        .unwrap();
        assert_eq!(index.len(), 3);

        let results = index.search("dental?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "dental gold");
        assert_eq!(results[1].text, "dental silver");
    }

    #[tokio::test]
    async fn search_caps_at_k() {
        let index = KnowledgeIndex::build(
            fake_embedder(),
            vec![chunk("dental gold"), chunk("dental silver")],
        )
        .await
        .unwrap();
        let results = index.search("dental?", 10).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
