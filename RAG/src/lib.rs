pub mod agent;
pub mod bedrock_service;
pub mod chat;
pub mod config;
pub mod document_processor;
pub mod embedding_service;
pub mod error;
pub mod models;
pub mod retriever;
pub mod vector_index;

pub use agent::{AgentConfig, PromptTemplate, RagAgent};
pub use bedrock_service::{BedrockClient, GenerationClient};
pub use config::Settings;
pub use document_processor::DocumentProcessor;
pub use embedding_service::{Embedder, OpenAiEmbedder};
pub use error::{ProviderError, RagError, Result};
pub use models::*;
pub use retriever::{Retriever, VectorRetriever};
pub use vector_index::{FlatIndex, Metric, SimilaritySearch};
