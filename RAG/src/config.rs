use crate::error::{RagError, Result};
use crate::models::GenerationParams;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBED_DIM: usize = 1536;
pub const DEFAULT_TOP_K: usize = 5;

/// Wire format used for the generation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSchema {
    Titan,
    Anthropic,
}

impl PayloadSchema {
    pub fn for_model(model_id: &str) -> Self {
        // Cross-region inference profiles prefix the vendor, e.g. "us.anthropic.claude-..."
        if model_id.starts_with("anthropic.") || model_id.contains(".anthropic.") {
            PayloadSchema::Anthropic
        } else {
            PayloadSchema::Titan
        }
    }
}

impl FromStr for PayloadSchema {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "titan" => Ok(PayloadSchema::Titan),
            "anthropic" => Ok(PayloadSchema::Anthropic),
            other => Err(RagError::Configuration(format!(
                "BEDROCK_PAYLOAD_SCHEMA must be 'titan' or 'anthropic', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BedrockSettings {
    pub model_id: String,
    pub bearer_token: String,
    pub region: String,
    pub endpoint: String,
    pub control_endpoint: String,
    pub schema: PayloadSchema,
    pub timeout: Duration,
    pub throttle_retries: u32,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub index: PathBuf,
    pub chunks: PathBuf,
    pub metadata: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bedrock: BedrockSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexPaths,
    pub top_k: usize,
    pub params: GenerationParams,
    pub prompt_template_path: Option<PathBuf>,
}

impl Settings {
    /// Reads and validates the process environment. Binaries load `.env` before calling this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let top_k = vars.parse_or("TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            return Err(RagError::Configuration("TOP_K must be at least 1".into()));
        }

        let defaults = GenerationParams::default();
        let params = GenerationParams {
            max_tokens: vars.parse_or("MAX_TOKENS", defaults.max_tokens)?,
            temperature: vars.parse_or("TEMPERATURE", defaults.temperature)?,
            top_p: vars.parse_or("TOP_P", defaults.top_p)?,
        };
        validate_params(&params).map_err(|e| match e {
            RagError::Validation(msg) => RagError::Configuration(msg),
            other => other,
        })?;

        Ok(Self {
            bedrock: BedrockSettings::from_vars(&vars)?,
            embedding: EmbeddingSettings::from_vars(&vars)?,
            index: IndexPaths::from_vars(&vars),
            top_k,
            params,
            prompt_template_path: vars.optional("PROMPT_TEMPLATE_PATH").map(PathBuf::from),
        })
    }
}

impl BedrockSettings {
    fn from_vars<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<Self> {
        let model_id = vars.required("BEDROCK_MODEL_ID")?;
        let bearer_token = vars.required("AWS_BEARER_TOKEN_BEDROCK")?;
        let region = vars
            .optional("AWS_DEFAULT_REGION")
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = vars
            .optional("BEDROCK_ENDPOINT")
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", region));
        let control_endpoint = vars
            .optional("BEDROCK_CONTROL_ENDPOINT")
            .unwrap_or_else(|| format!("https://bedrock.{}.amazonaws.com", region));
        let schema = match vars.optional("BEDROCK_PAYLOAD_SCHEMA") {
            Some(raw) => raw.parse()?,
            None => PayloadSchema::for_model(&model_id),
        };

        Ok(Self {
            model_id,
            bearer_token,
            region,
            endpoint,
            control_endpoint,
            schema,
            timeout: vars.timeout()?,
            throttle_retries: vars.parse_or("THROTTLE_RETRIES", 0)?,
        })
    }
}

impl EmbeddingSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        Self::from_vars(&Vars(&lookup))
    }

    fn from_vars<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<Self> {
        let dimension = vars.parse_or("EMBED_DIM", DEFAULT_EMBED_DIM)?;
        if dimension == 0 {
            return Err(RagError::Configuration("EMBED_DIM must be at least 1".into()));
        }

        Ok(Self {
            api_key: vars.required("OPENAI_API_KEY")?,
            base_url: vars
                .optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: vars
                .optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            dimension,
            timeout: vars.timeout()?,
        })
    }
}

impl IndexPaths {
    pub fn from_env() -> Self {
        Self::from_vars(&Vars(&|key: &str| env::var(key).ok()))
    }

    fn from_vars<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Self {
        let path = |key: &str, default: &str| {
            PathBuf::from(vars.optional(key).unwrap_or_else(|| default.to_string()))
        };
        Self {
            index: path("INDEX_PATH", "data/processed/index.json"),
            chunks: path("CHUNKS_PATH", "data/processed/chunks.json"),
            metadata: path("METADATA_PATH", "data/processed/metadata.json"),
        }
    }
}

/// Checks decoding parameters against the ranges the provider accepts.
pub fn validate_params(params: &GenerationParams) -> Result<()> {
    if params.max_tokens < 1 {
        return Err(RagError::Validation("max_tokens must be at least 1".into()));
    }
    if !params.temperature.is_finite() || params.temperature < 0.0 {
        return Err(RagError::Validation(format!(
            "temperature must be >= 0, got {}",
            params.temperature
        )));
    }
    if !(0.0..=1.0).contains(&params.top_p) {
        return Err(RagError::Validation(format!(
            "top_p must be within [0, 1], got {}",
            params.top_p
        )));
    }
    Ok(())
}

struct Vars<'a, F>(&'a F);

impl<'a, F: Fn(&str) -> Option<String>> Vars<'a, F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| RagError::Configuration(format!("{} environment variable not set", key)))
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|_| {
                RagError::Configuration(format!("{} has an invalid value: '{}'", key, raw))
            }),
            None => Ok(default),
        }
    }

    fn timeout(&self) -> Result<Duration> {
        let secs: u64 = self.parse_or("REQUEST_TIMEOUT_SECS", 30)?;
        if secs == 0 {
            return Err(RagError::Configuration(
                "REQUEST_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("BEDROCK_MODEL_ID", "amazon.titan-text-express-v1"),
        ("AWS_BEARER_TOKEN_BEDROCK", "token"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn index_paths_come_from_the_process_environment() {
        env::set_var("CHUNKS_PATH", "/srv/rag/chunks.json");
        let paths = IndexPaths::from_env();
        env::remove_var("CHUNKS_PATH");

        assert_eq!(paths.chunks, PathBuf::from("/srv/rag/chunks.json"));
        assert_eq!(paths.metadata, PathBuf::from("data/processed/metadata.json"));
    }

    #[test]
    fn applies_defaults() {
        let settings = Settings::from_lookup(lookup(REQUIRED)).unwrap();

        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.params, GenerationParams::default());
        assert_eq!(settings.bedrock.region, "us-east-1");
        assert_eq!(
            settings.bedrock.endpoint,
            "https://bedrock-runtime.us-east-1.amazonaws.com"
        );
        assert_eq!(settings.bedrock.schema, PayloadSchema::Titan);
        assert_eq!(settings.bedrock.throttle_retries, 0);
        assert_eq!(settings.embedding.dimension, 1536);
        assert_eq!(settings.index.index, PathBuf::from("data/processed/index.json"));
        assert!(settings.prompt_template_path.is_none());
    }

    #[test]
    fn missing_model_id_is_named() {
        let err = Settings::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        assert!(err.to_string().contains("BEDROCK_MODEL_ID"));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[1] = ("AWS_BEARER_TOKEN_BEDROCK", "   ");
        let err = Settings::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("AWS_BEARER_TOKEN_BEDROCK"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for (key, value) in [
            ("TOP_K", "0"),
            ("TOP_P", "1.5"),
            ("TEMPERATURE", "-0.1"),
            ("MAX_TOKENS", "0"),
            ("TOP_K", "five"),
            ("BEDROCK_PAYLOAD_SCHEMA", "cohere"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            let err = Settings::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, RagError::Configuration(_)),
                "{}={} should be rejected, got {:?}",
                key,
                value,
                err
            );
        }
    }

    #[test]
    fn region_drives_default_endpoints() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("AWS_DEFAULT_REGION", "eu-west-1"));
        let settings = Settings::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            settings.bedrock.endpoint,
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            settings.bedrock.control_endpoint,
            "https://bedrock.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn schema_follows_model_family() {
        assert_eq!(
            PayloadSchema::for_model("anthropic.claude-3-haiku-20240307-v1:0"),
            PayloadSchema::Anthropic
        );
        assert_eq!(
            PayloadSchema::for_model("us.anthropic.claude-3-5-sonnet-20241022-v2:0"),
            PayloadSchema::Anthropic
        );
        assert_eq!(
            PayloadSchema::for_model("amazon.titan-text-premier-v1:0"),
            PayloadSchema::Titan
        );
    }

    #[test]
    fn params_validation() {
        assert!(validate_params(&GenerationParams::default()).is_ok());
        let bad = GenerationParams {
            temperature: f32::NAN,
            ..GenerationParams::default()
        };
        assert!(matches!(validate_params(&bad), Err(RagError::Validation(_))));
    }
}
