use crate::bedrock_service::{BedrockClient, GenerationClient};
use crate::config::Settings;
use crate::embedding_service::{Embedder, OpenAiEmbedder};
use crate::error::{RagError, Result};
use crate::models::*;
use crate::retriever::{Retriever, VectorRetriever};
use std::fs;
use std::sync::Arc;

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are an expert assistant that answers questions based solely on the provided context documents.

INSTRUCTIONS:
1. Answer the question using ONLY the information from the provided context
2. Be concise but comprehensive
3. If the context doesn't contain enough information to answer the question, say so clearly
4. Do not add information not present in the context

CONTEXT DOCUMENTS:
{context}

QUESTION: {question}

ANSWER:"#;

/// Prompt text with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                return Err(RagError::Configuration(format!(
                    "prompt template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self(template))
    }

    /// Single pass, so placeholder-like text inside the context or question is left alone.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.0.len() + context.len() + question.len());
        let mut rest = self.0.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self(DEFAULT_PROMPT_TEMPLATE.to_string())
    }
}

/// Fixed at construction.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model_id: String,
    pub k: usize,
    pub params: GenerationParams,
    pub template: PromptTemplate,
}

impl AgentConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            k: crate::config::DEFAULT_TOP_K,
            params: GenerationParams::default(),
            template: PromptTemplate::default(),
        }
    }
}

/// Retrieve-then-generate agent. Holds no per-conversation state; every call is independent.
pub struct RagAgent {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn GenerationClient>,
    config: AgentConfig,
}

impl RagAgent {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn GenerationClient>,
        config: AgentConfig,
    ) -> Result<Self> {
        if config.k == 0 {
            return Err(RagError::Configuration("k must be at least 1".into()));
        }
        if config.model_id.trim().is_empty() {
            return Err(RagError::Configuration("model id must not be empty".into()));
        }
        Ok(Self {
            retriever,
            generator,
            config,
        })
    }

    /// Wires the OpenAI embedder, the on-disk index and the Bedrock client.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        log::info!("Initializing RAG agent for model {}", settings.bedrock.model_id);

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&settings.embedding)?);
        let retriever = VectorRetriever::load(&settings.index, embedder)?;
        if retriever.dimension() != settings.embedding.dimension {
            return Err(RagError::Configuration(format!(
                "EMBED_DIM is {} but the index at {} has {} dimensions",
                settings.embedding.dimension,
                settings.index.index.display(),
                retriever.dimension()
            )));
        }

        let template = match &settings.prompt_template_path {
            Some(path) => PromptTemplate::new(fs::read_to_string(path).map_err(|e| {
                RagError::Configuration(format!(
                    "cannot read prompt template {}: {}",
                    path.display(),
                    e
                ))
            })?)?,
            None => PromptTemplate::default(),
        };

        let generator = BedrockClient::new(&settings.bedrock)?;
        let config = AgentConfig {
            model_id: settings.bedrock.model_id.clone(),
            k: settings.top_k,
            params: settings.params,
            template,
        };

        log::info!(
            "RAG agent ready ({} chunks, k={})",
            retriever.chunk_count(),
            config.k
        );
        Self::new(Arc::new(retriever), Arc::new(generator), config)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub async fn answer_question(&self, question: &str) -> Result<String> {
        self.answer(question).await.map(|answer| answer.text)
    }

    /// Like [`answer_question`](Self::answer_question) but also returns the retrieved chunks.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Validation("question must not be empty".into()));
        }

        let sources = self.retriever.retrieve(question, self.config.k).await?;
        let prompt = self.build_prompt(question, &sources);

        let response = self
            .generator
            .invoke(&self.config.model_id, &prompt, &self.config.params)
            .await?;

        let text = match response.first_candidate() {
            Some(candidate) => candidate.to_string(),
            None => {
                log::warn!("Generation response had no candidates; returning raw response");
                response.to_raw_string()
            }
        };

        Ok(Answer { text, sources })
    }

    fn build_prompt(&self, question: &str, sources: &[ScoredChunk]) -> String {
        let context = sources
            .iter()
            .map(|s| s.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        self.config.template.render(&context, question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_requires_both_placeholders() {
        assert!(PromptTemplate::new("{context} / {question}").is_ok());
        assert!(matches!(
            PromptTemplate::new("only {question}"),
            Err(RagError::Configuration(_))
        ));
        assert!(PromptTemplate::new("only {context}").is_err());
    }

    #[test]
    fn render_fills_placeholders() {
        let template = PromptTemplate::new("C: {context}\nQ: {question}").unwrap();
        assert_eq!(template.render("facts", "why?"), "C: facts\nQ: why?");
    }

    #[test]
    fn render_does_not_expand_placeholders_in_inputs() {
        let template = PromptTemplate::new("{context} | {question} {other}").unwrap();
        assert_eq!(
            template.render("see {question}", "q"),
            "see {question} | q {other}"
        );
    }

    #[test]
    fn default_template_is_valid() {
        assert!(PromptTemplate::new(DEFAULT_PROMPT_TEMPLATE).is_ok());
    }
}
