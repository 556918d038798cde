#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use bedrock_rag::{
    Chunk, Embedder, GenerationClient, GenerationParams, GenerationResponse, RagError, Result,
    Retriever, ScoredChunk,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Binds an axum router to an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub struct FixedEmbedder {
    pub vector: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }
}

/// Returns the given chunk texts in order, with descending scores.
pub struct StubRetriever {
    pub texts: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl StubRetriever {
    pub fn new(texts: Vec<&'static str>) -> Self {
        Self {
            texts,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .texts
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, text)| ScoredChunk {
                chunk: Chunk::new(i.to_string(), *text),
                score: 1.0 - i as f32 * 0.1,
            })
            .collect())
    }
}

pub enum Reply {
    Echo,
    Fixed(GenerationResponse),
    Fail(fn() -> RagError),
}

pub struct StubGenerator {
    pub reply: Reply,
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
    pub last_params: Mutex<Option<GenerationParams>>,
}

impl StubGenerator {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_params: Mutex::new(None),
        }
    }

    pub fn prompt(&self) -> String {
        self.last_prompt.lock().unwrap().clone().unwrap_or_default()
    }
}

#[async_trait]
impl GenerationClient for StubGenerator {
    async fn invoke(
        &self,
        _model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.last_params.lock().unwrap() = Some(*params);
        match &self.reply {
            Reply::Echo => Ok(GenerationResponse::Structured(vec![prompt.to_string()])),
            Reply::Fixed(response) => Ok(response.clone()),
            Reply::Fail(make) => Err(make()),
        }
    }
}
