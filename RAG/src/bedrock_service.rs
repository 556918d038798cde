use crate::config::{BedrockSettings, PayloadSchema};
use crate::error::{ProviderError, RagError, Result};
use crate::models::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::{Duration, Instant};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Sends an assembled prompt to a text-generation model.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationResponse>;
}

/// Client for the Bedrock runtime `InvokeModel` API.
///
/// Owns its HTTP client and credential; nothing is shared through process globals.
pub struct BedrockClient {
    client: Client,
    endpoint: Url,
    control_endpoint: Url,
    bearer_token: String,
    schema: PayloadSchema,
    throttle_retries: u32,
    retry_base_delay: Duration,
}

impl BedrockClient {
    pub fn new(settings: &BedrockSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: parse_endpoint("BEDROCK_ENDPOINT", &settings.endpoint)?,
            control_endpoint: parse_endpoint(
                "BEDROCK_CONTROL_ENDPOINT",
                &settings.control_endpoint,
            )?,
            bearer_token: settings.bearer_token.clone(),
            schema: settings.schema,
            throttle_retries: settings.throttle_retries,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Lists the foundation models visible to the configured credential.
    pub async fn list_foundation_models(&self) -> Result<Vec<FoundationModel>> {
        let url = join_segments(&self.control_endpoint, &["foundation-models"])?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        let error_type = error_type_header(&response);
        let body = response.bytes().await.map_err(ProviderError::from)?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(classify_error(status, error_type.as_deref(), &text, "").into());
        }

        let list: FoundationModelList = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(list.model_summaries)
    }

    async fn invoke_once(&self, url: &Url, body: &Value, model_id: &str) -> Result<Value> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.bearer_token)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        let error_type = error_type_header(&response);
        let raw = response.bytes().await.map_err(ProviderError::from)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&raw);
            return Err(classify_error(status, error_type.as_deref(), &text, model_id).into());
        }

        serde_json::from_slice(&raw).map_err(|e| {
            ProviderError::MalformedResponse(format!("response body is not JSON: {}", e)).into()
        })
    }
}

#[async_trait]
impl GenerationClient for BedrockClient {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationResponse> {
        let request = GenerationRequest::new(model_id, prompt, params);
        request.validate()?;

        let schema = self.schema;
        let body = build_payload(schema, &request)?;
        let url = join_segments(&self.endpoint, &["model", &request.model_id, "invoke"])?;

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            match self.invoke_once(&url, &body, &request.model_id).await {
                Ok(raw) => {
                    log::info!(
                        "Generation call to {} succeeded in {} ms (prompt {} chars)",
                        request.model_id,
                        started.elapsed().as_millis(),
                        request.prompt.len()
                    );
                    return Ok(parse_response(schema, raw));
                }
                Err(RagError::Provider(ProviderError::Throttling(msg)))
                    if attempt < self.throttle_retries =>
                {
                    let delay = backoff_delay(self.retry_base_delay, attempt);
                    attempt += 1;
                    log::warn!(
                        "Throttled by provider ({}); retry {}/{} in {} ms",
                        msg,
                        attempt,
                        self.throttle_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Exponential backoff from `base`, doubling per attempt and capped at 30 s.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_RETRY_DELAY)
        .min(MAX_RETRY_DELAY)
}

fn parse_endpoint(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw)
        .map_err(|e| RagError::Configuration(format!("{} is not a valid URL ({}): {}", key, raw, e)))
}

/// Appends path segments, percent-encoding each one (model ids may contain ':' or '/').
fn join_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RagError::Configuration(format!("endpoint {} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn error_type_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(':').next().unwrap_or(v).to_string())
}

pub(crate) fn build_payload(schema: PayloadSchema, request: &GenerationRequest) -> Result<Value> {
    let prompt = request.prompt.as_str();
    let params = &request.params;
    let payload = match schema {
        PayloadSchema::Titan => serde_json::to_value(TitanRequest {
            input_text: prompt,
            text_generation_config: TitanGenerationConfig {
                max_token_count: params.max_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
            },
        }),
        PayloadSchema::Anthropic => serde_json::to_value(AnthropicRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContent {
                    kind: "text",
                    text: prompt,
                }],
            }],
        }),
    };
    payload.map_err(|e| RagError::Validation(format!("failed to serialize request: {}", e)))
}

/// Extracts candidates for the schema; any other shape is kept as `Opaque`.
pub(crate) fn parse_response(schema: PayloadSchema, raw: Value) -> GenerationResponse {
    let candidates = match schema {
        PayloadSchema::Titan => serde_json::from_value::<TitanResponse>(raw.clone())
            .ok()
            .map(|r| r.results.into_iter().map(|c| c.output_text).collect::<Vec<_>>()),
        PayloadSchema::Anthropic => serde_json::from_value::<AnthropicResponse>(raw.clone())
            .ok()
            .map(|r| {
                r.content
                    .into_iter()
                    .filter(|block| block.kind == "text")
                    .filter_map(|block| block.text)
                    .collect::<Vec<_>>()
            }),
    };

    match candidates {
        Some(candidates) if !candidates.is_empty() => GenerationResponse::Structured(candidates),
        _ => GenerationResponse::Opaque(raw),
    }
}

pub(crate) fn classify_error(
    status: StatusCode,
    error_type: Option<&str>,
    body: &str,
    model_id: &str,
) -> ProviderError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    match (status, error_type) {
        (_, Some("ThrottlingException")) | (StatusCode::TOO_MANY_REQUESTS, _) => {
            ProviderError::Throttling(message)
        }
        (_, Some("ResourceNotFoundException")) | (StatusCode::NOT_FOUND, _) => {
            ProviderError::ModelNotFound(format!("{}: {}", model_id, message))
        }
        (_, Some("AccessDeniedException" | "UnrecognizedClientException"))
        | (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            ProviderError::Authentication(message)
        }
        (StatusCode::BAD_REQUEST, _)
            if message.to_ascii_lowercase().contains("model identifier is invalid") =>
        {
            ProviderError::ModelNotFound(format!("{}: {}", model_id, message))
        }
        _ => ProviderError::Http {
            status: status.as_u16(),
            message,
        },
    }
}
