use crate::config::IndexPaths;
use crate::embedding_service::Embedder;
use crate::error::{RagError, Result};
use crate::models::{Chunk, ChunkMetadata, ScoredChunk};
use crate::vector_index::{FlatIndex, SimilaritySearch};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Returns the `k` chunks most similar to a query, most similar first.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Retriever over a persisted vector index and its parallel chunk/metadata stores.
///
/// The index, chunks and metadata are immutable after load, so one instance can be
/// shared across concurrent requests behind an `Arc`.
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SimilaritySearch>,
    chunks: Vec<Chunk>,
}

impl VectorRetriever {
    /// Builds a retriever from already-loaded parts. Fails if the index is empty.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SimilaritySearch>,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        if index.is_empty() || chunks.is_empty() {
            return Err(RagError::index_load("<memory>", "index is empty"));
        }
        if index.len() != chunks.len() {
            log::warn!(
                "Index holds {} vectors but chunk store holds {} chunks; out-of-range neighbours will be skipped",
                index.len(),
                chunks.len()
            );
        }
        Ok(Self {
            embedder,
            index,
            chunks,
        })
    }

    /// Loads the index, chunk store and metadata store from disk.
    pub fn load(paths: &IndexPaths, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index = FlatIndex::load(&paths.index)?;
        let chunks = load_chunks(&paths.chunks, &paths.metadata)?;
        log::info!("Loaded {} chunks from {}", chunks.len(), paths.chunks.display());
        Self::new(embedder, Arc::new(index), chunks)
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::Validation("k must be at least 1".into()));
        }

        let query_vector = self.embedder.embed_query(query).await?;
        if query_vector.len() != self.index.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: query_vector.len(),
            });
        }
        if query_vector.iter().any(|x| !x.is_finite()) {
            return Err(RagError::Embedding(
                "query embedding has non-finite components".into(),
            ));
        }

        let neighbors = self.index.search(&query_vector, k)?;

        let mut seen = HashSet::new();
        let mut skipped = 0;
        let mut results: Vec<ScoredChunk> = Vec::with_capacity(k);
        for neighbor in neighbors {
            if neighbor.score.is_nan() {
                skipped += 1;
                continue;
            }
            // Positions outside the chunk store are tolerated and dropped, not treated as errors.
            let chunk = match usize::try_from(neighbor.position)
                .ok()
                .and_then(|pos| self.chunks.get(pos))
            {
                Some(chunk) => chunk,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            if !seen.insert(chunk.id.as_str()) {
                continue;
            }
            results.push(ScoredChunk {
                chunk: chunk.clone(),
                score: neighbor.score,
            });
        }

        // Stable, so equal scores keep the backend's order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);

        log::info!(
            "Retrieved {} chunks (k={}, skipped {} unusable neighbours)",
            results.len(),
            k,
            skipped
        );
        Ok(results)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    if !path.exists() {
        return Err(RagError::index_load(path, format!("{} not found", what)));
    }
    let raw = fs::read(path).map_err(|e| RagError::index_load(path, e.to_string()))?;
    serde_json::from_slice(&raw)
        .map_err(|e| RagError::index_load(path, format!("corrupt {}: {}", what, e)))
}

/// Reads the chunk texts and their metadata, which must line up one-to-one.
pub fn load_chunks(chunks_path: &Path, metadata_path: &Path) -> Result<Vec<Chunk>> {
    let texts: Vec<String> = read_json(chunks_path, "chunk store")?;
    let metadata: Vec<ChunkMetadata> = read_json(metadata_path, "metadata store")?;

    if texts.len() != metadata.len() {
        return Err(RagError::index_load(
            metadata_path,
            format!(
                "metadata store has {} records but chunk store has {} chunks",
                metadata.len(),
                texts.len()
            ),
        ));
    }

    Ok(texts
        .into_iter()
        .zip(metadata)
        .enumerate()
        .map(|(position, (text, metadata))| Chunk {
            id: metadata.id.clone().unwrap_or_else(|| position.to_string()),
            text,
            metadata,
        })
        .collect())
}
