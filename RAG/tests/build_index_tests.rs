mod common;

use bedrock_rag::config::IndexPaths;
use bedrock_rag::document_processor::{build_index, SourceChunk};
use bedrock_rag::{FlatIndex, Metric, RagError, Retriever, VectorRetriever};
use common::FixedEmbedder;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

fn nested_paths(dir: &Path) -> IndexPaths {
    let out = dir.join("processed").join("v1");
    IndexPaths {
        index: out.join("index.json"),
        chunks: out.join("chunks.json"),
        metadata: out.join("metadata.json"),
    }
}

fn source_chunks() -> Vec<SourceChunk> {
    vec![
        SourceChunk {
            text: "Paris is the capital of France.".into(),
            source: "europe.md".into(),
            offset: 0,
        },
        SourceChunk {
            text: "Berlin is the capital of Germany.".into(),
            source: "europe.md".into(),
            offset: 31,
        },
    ]
}

#[tokio::test]
async fn writes_all_three_stores_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let paths = nested_paths(dir.path());
    let embedder = FixedEmbedder::new(vec![0.6, 0.8]);

    let written = build_index(&source_chunks(), &embedder, 2, &paths).await.unwrap();

    assert_eq!(written, 2);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

    let index = FlatIndex::load(&paths.index).unwrap();
    assert_eq!(index.metric(), Metric::InnerProduct);

    let texts: Vec<String> = serde_json::from_slice(&fs::read(&paths.chunks).unwrap()).unwrap();
    assert_eq!(texts[1], "Berlin is the capital of Germany.");

    let metadata: Vec<Value> =
        serde_json::from_slice(&fs::read(&paths.metadata).unwrap()).unwrap();
    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata[1]["offset"], 31);

    let retriever =
        VectorRetriever::load(&paths, Arc::new(FixedEmbedder::new(vec![0.6, 0.8]))).unwrap();
    assert_eq!(retriever.chunk_count(), 2);

    let results = retriever.retrieve("capital?", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(Uuid::parse_str(&result.chunk.id).is_ok());
        assert_eq!(result.chunk.metadata.source.as_deref(), Some("europe.md"));
        assert!(result.chunk.metadata.offset.is_some());
    }
    assert_ne!(results[0].chunk.id, results[1].chunk.id);
}

#[tokio::test]
async fn wrong_embedding_width_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let paths = nested_paths(dir.path());
    let embedder = FixedEmbedder::new(vec![1.0, 0.0, 0.0]);

    let err = build_index(&source_chunks(), &embedder, 2, &paths)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RagError>(),
        Some(RagError::DimensionMismatch { expected: 2, actual: 3 })
    ));
    assert!(!paths.index.exists());
    assert!(!paths.chunks.exists());
    assert!(!paths.metadata.exists());
}

#[tokio::test]
async fn empty_chunk_list_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let paths = nested_paths(dir.path());
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);

    assert!(build_index(&[], &embedder, 2, &paths).await.is_err());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(!paths.index.exists());
}
