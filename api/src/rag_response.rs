use bedrock_rag::{Answer, RagError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct RagResponse {
    pub answer: String,
    pub context_snippets: Vec<String>,
}

impl From<Answer> for RagResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.text,
            context_snippets: answer.sources.into_iter().map(|s| s.chunk.text).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&RagError> for ErrorResponse {
    fn from(err: &RagError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
