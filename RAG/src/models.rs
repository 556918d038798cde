use crate::config::validate_params;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata record stored alongside each chunk, one per indexed vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: ChunkMetadata::default(),
        }
    }
}

/// A retrieved chunk with its similarity score (higher is more similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Decoding parameters sent with every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model_id: String,
    pub prompt: String,
    #[serde(default)]
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(model_id: &str, prompt: &str, params: &GenerationParams) -> Self {
        Self {
            model_id: model_id.to_string(),
            prompt: prompt.to_string(),
            params: *params,
        }
    }

    /// Rejects requests the provider would refuse, before any network call.
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(RagError::Validation("model id must not be empty".into()));
        }
        validate_params(&self.params)
    }
}

/// Provider response. `Structured` holds the generated candidates in provider order;
/// anything that did not match the expected shape is kept verbatim as `Opaque`.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResponse {
    Structured(Vec<String>),
    Opaque(Value),
}

impl GenerationResponse {
    pub fn first_candidate(&self) -> Option<&str> {
        match self {
            GenerationResponse::Structured(candidates) => candidates.first().map(String::as_str),
            GenerationResponse::Opaque(_) => None,
        }
    }

    /// Stable, never-empty rendering of the whole response.
    pub fn to_raw_string(&self) -> String {
        let rendered = match self {
            GenerationResponse::Structured(candidates) => {
                serde_json::json!({ "candidates": candidates }).to_string()
            }
            GenerationResponse::Opaque(raw) => raw.to_string(),
        };
        if rendered.is_empty() {
            "<empty response>".to_string()
        } else {
            rendered
        }
    }
}

/// Final result of one question: the answer text and the chunks it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundationModel {
    #[serde(rename = "modelId")]
    pub model_id: String,
    #[serde(rename = "modelName", default)]
    pub model_name: Option<String>,
    #[serde(rename = "providerName", default)]
    pub provider_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TitanRequest<'a> {
    #[serde(rename = "inputText")]
    pub input_text: &'a str,
    #[serde(rename = "textGenerationConfig")]
    pub text_generation_config: TitanGenerationConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct TitanGenerationConfig {
    #[serde(rename = "maxTokenCount")]
    pub max_token_count: u32,
    pub temperature: f32,
    #[serde(rename = "topP")]
    pub top_p: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TitanResponse {
    pub results: Vec<TitanResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TitanResult {
    #[serde(rename = "outputText")]
    pub output_text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicRequest<'a> {
    pub anthropic_version: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessage<'a> {
    pub role: &'static str,
    pub content: Vec<AnthropicContent<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicContent<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicResponse {
    pub content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FoundationModelList {
    #[serde(rename = "modelSummaries", default)]
    pub model_summaries: Vec<FoundationModel>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingData {
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_structured_response_still_renders() {
        let response = GenerationResponse::Structured(vec![]);
        assert_eq!(response.first_candidate(), None);
        assert_eq!(response.to_raw_string(), r#"{"candidates":[]}"#);
    }

    #[test]
    fn opaque_response_renders_raw_json() {
        let response = GenerationResponse::Opaque(serde_json::json!({ "completion": "hi" }));
        assert_eq!(response.first_candidate(), None);
        assert_eq!(response.to_raw_string(), r#"{"completion":"hi"}"#);
    }

    #[test]
    fn metadata_fields_are_optional() {
        let meta: ChunkMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, ChunkMetadata::default());

        let meta: ChunkMetadata =
            serde_json::from_str(r#"{"id":"c-1","source":"policy.pdf","offset":120}"#).unwrap();
        assert_eq!(meta.id.as_deref(), Some("c-1"));
        assert_eq!(meta.offset, Some(120));
    }
}
