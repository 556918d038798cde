use anyhow::{bail, Context, Result};
use bedrock_rag::config::{EmbeddingSettings, IndexPaths};
use bedrock_rag::document_processor::{build_index, DocumentProcessor};
use bedrock_rag::OpenAiEmbedder;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let Some(documents_dir) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: build_index <documents_dir>");
    };

    let embedding = EmbeddingSettings::from_env().context("invalid configuration")?;
    let paths = IndexPaths::from_env();
    let embedder = OpenAiEmbedder::new(&embedding)?;

    let chunks = DocumentProcessor::new()?.process_documents(&documents_dir)?;
    let count = build_index(&chunks, &embedder, embedding.dimension, &paths).await?;

    println!("Indexed {} chunks into {}", count, paths.index.display());
    Ok(())
}
