use crate::config::IndexPaths;
use crate::embedding_service::Embedder;
use crate::error::RagError;
use crate::models::ChunkMetadata;
use crate::vector_index::{FlatIndex, Metric};
use anyhow::{Context, Result};
use pdf_extract::extract_text;
use regex::Regex;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// A piece of source text before it has been embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChunk {
    pub text: String,
    pub source: String,
    pub offset: usize,
}

pub struct DocumentProcessor {
    chunk_size: usize,
    overlap: usize,
    whitespace: Regex,
    special: Regex,
    sentence: Regex,
}

impl DocumentProcessor {
    /// Chunks of about 500 characters with 50 characters of overlap.
    pub fn new() -> Result<Self> {
        Self::with_chunking(500, 50)
    }

    pub fn with_chunking(chunk_size: usize, overlap: usize) -> Result<Self> {
        anyhow::ensure!(
            overlap < chunk_size,
            "overlap ({}) must be smaller than chunk size ({})",
            overlap,
            chunk_size
        );
        Ok(Self {
            chunk_size,
            overlap,
            whitespace: Regex::new(r"\s+")?,
            special: Regex::new(r#"[^\w\s.,!?;:()\-\[\]{}'"%$/&]"#)?,
            sentence: Regex::new(r"[^.!?]+(?:[.!?]+|$)")?,
        })
    }

    /// Reads every `.pdf`, `.txt` and `.md` file in `documents_dir` (sorted by name) and chunks it.
    pub fn process_documents(&self, documents_dir: &Path) -> Result<Vec<SourceChunk>> {
        let mut paths: Vec<_> = fs::read_dir(documents_dir)
            .with_context(|| format!("cannot read {}", documents_dir.display()))?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut chunks = Vec::new();
        let mut documents = 0;
        for path in paths {
            let content = match path.extension().and_then(|e| e.to_str()) {
                Some("pdf") => extract_text(&path)
                    .map_err(|e| anyhow::anyhow!("failed to extract {}: {}", path.display(), e))?,
                Some("txt") | Some("md") => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                _ => continue,
            };

            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            log::info!("Processing document: {}", source);

            let document_chunks = self.create_chunks(&content, &source);
            log::info!("Created {} chunks from {}", document_chunks.len(), source);
            chunks.extend(document_chunks);
            documents += 1;
        }

        log::info!("Processed {} documents into {} chunks", documents, chunks.len());
        Ok(chunks)
    }

    pub fn create_chunks(&self, content: &str, source: &str) -> Vec<SourceChunk> {
        let cleaned_content = self.clean_text(content);
        let sentences = self.split_into_sentences(&cleaned_content);

        let mut chunks = Vec::new();
        let mut current_chunk = String::new();
        let mut start_pos = 0;

        for sentence in sentences {
            let current_len = current_chunk.chars().count();
            if current_len + sentence.chars().count() > self.chunk_size && !current_chunk.is_empty() {
                chunks.push(SourceChunk {
                    text: current_chunk.trim().to_string(),
                    source: source.to_string(),
                    offset: start_pos,
                });

                // Carry the tail of the previous chunk into the next one.
                let overlap_text: String = if current_len > self.overlap {
                    current_chunk.chars().skip(current_len - self.overlap).collect()
                } else {
                    current_chunk.clone()
                };

                start_pos += current_len - overlap_text.chars().count();
                current_chunk = overlap_text + " " + &sentence;
            } else {
                if !current_chunk.is_empty() {
                    current_chunk.push(' ');
                }
                current_chunk.push_str(&sentence);
            }
        }

        if !current_chunk.trim().is_empty() {
            chunks.push(SourceChunk {
                text: current_chunk.trim().to_string(),
                source: source.to_string(),
                offset: start_pos,
            });
        }

        chunks
    }

    fn clean_text(&self, text: &str) -> String {
        let cleaned = self.special.replace_all(text, " ");
        let cleaned = self.whitespace.replace_all(&cleaned, " ");
        cleaned.trim().to_string()
    }

    fn split_into_sentences(&self, text: &str) -> Vec<String> {
        self.sentence
            .find_iter(text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Embeds `chunks` and writes the index, chunk store and metadata store.
///
/// Returns the number of indexed chunks.
pub async fn build_index(
    chunks: &[SourceChunk],
    embedder: &dyn Embedder,
    expected_dimension: usize,
    paths: &IndexPaths,
) -> Result<usize> {
    anyhow::ensure!(!chunks.is_empty(), "no chunks to index");

    let mut index = FlatIndex::new(expected_dimension, Metric::InnerProduct);
    let mut texts = Vec::with_capacity(chunks.len());
    let mut metadata = Vec::with_capacity(chunks.len());

    for (n, chunk) in chunks.iter().enumerate() {
        let vector = embedder.embed_query(&chunk.text).await?;
        if vector.len() != expected_dimension {
            return Err(RagError::DimensionMismatch {
                expected: expected_dimension,
                actual: vector.len(),
            }
            .into());
        }
        index.add(vector)?;
        texts.push(chunk.text.clone());
        metadata.push(ChunkMetadata {
            id: Some(Uuid::new_v4().to_string()),
            source: Some(chunk.source.clone()),
            offset: Some(chunk.offset),
        });

        if (n + 1) % 50 == 0 {
            log::info!("Embedded {}/{} chunks", n + 1, chunks.len());
        }
    }

    for path in [&paths.index, &paths.chunks, &paths.metadata] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }

    index.save(&paths.index)?;
    fs::write(&paths.chunks, serde_json::to_vec(&texts)?)
        .with_context(|| format!("cannot write {}", paths.chunks.display()))?;
    fs::write(&paths.metadata, serde_json::to_vec(&metadata)?)
        .with_context(|| format!("cannot write {}", paths.metadata.display()))?;

    log::info!(
        "Wrote index with {} chunks to {}",
        texts.len(),
        paths.index.display()
    );
    Ok(texts.len())
}
