use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    errors::{EmbeddingError, LlmError},
    rag::Embedder,
};

use super::{
    models::{
        BatchEmbedContentsRequest, BatchEmbedContentsResponse, GenerateContentRequest,
        GenerateContentResponse,
    },
    LanguageModel,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Room for 2.5-series thinking tokens plus the SQL itself.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// The batch endpoint rejects more than 100 requests per call.
const EMBED_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_embedding_model(mut self, model: String, dimension: usize) -> Self {
        self.embedding_model = model;
        self.embedding_dimension = dimension;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Config(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }

        if self.base_url.is_empty() {
            return Err(LlmError::Config("Base URL cannot be empty".to_string()));
        }

        if self.model.is_empty() || self.embedding_model.is_empty() {
            return Err(LlmError::Config("Model name cannot be empty".to_string()));
        }

        if self.embedding_dimension == 0 {
            return Err(LlmError::Config(
                "Embedding dimension must be positive".to_string(),
            ));
        }

        if self.max_output_tokens == 0 {
            return Err(LlmError::Config(
                "Max output tokens must be positive".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(LlmError::Config("Timeout must be positive".to_string()));
        }

        Ok(())
    }
}

/// Thin HTTP transport shared by the generation and embedding clients.
#[derive(Clone)]
struct GeminiHttp {
    config: GeminiConfig,
    client: Client,
}

impl GeminiHttp {
    fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    async fn post<Req, Resp>(&self, model: &str, method: &str, body: &Req) -> Result<Resp, LlmError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/models/{}:{}", self.config.base_url, model, method);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Request(format!(
                        "request timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        handle_response(response).await
    }
}

async fn handle_response<Resp: DeserializeOwned>(response: Response) -> Result<Resp, LlmError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))
}

/// Maps a failed HTTP exchange to [`LlmError::Status`], preferring the API's
/// own `error.message` over the raw body.
pub(crate) fn status_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                status.canonical_reason().unwrap_or("no response body").to_string()
            } else {
                body.to_string()
            }
        });

    LlmError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: GeminiHttp,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        Ok(Self {
            http: GeminiHttp::new(config)?,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.http.config
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        info!(
            "Calling {} with a {}-character prompt",
            self.http.config.model,
            prompt.len()
        );

        let request =
            GenerateContentRequest::new(prompt.to_string(), self.http.config.max_output_tokens);
        let response: GenerateContentResponse = self
            .http
            .post(&self.http.config.model, "generateContent", &request)
            .await?;

        debug!(
            "Model finished with {:?}, {:?} tokens",
            response.finish_reason(),
            response.total_tokens()
        );
        response.extract_text().ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.http.config.model
    }
}

/// Gemini `batchEmbedContents` embedder.
#[derive(Clone)]
pub struct GeminiEmbedder {
    http: GeminiHttp,
}

impl GeminiEmbedder {
    pub fn new(config: GeminiConfig) -> Result<Self, EmbeddingError> {
        let http = GeminiHttp::new(config).map_err(|e| EmbeddingError::Config(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = &self.http.config.embedding_model;
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(EMBED_BATCH_LIMIT) {
            let request = BatchEmbedContentsRequest::new(model, chunk);
            let response: BatchEmbedContentsResponse = self
                .http
                .post(model, "batchEmbedContents", &request)
                .await
                .map_err(|e| match e {
                    LlmError::Parse(msg) => EmbeddingError::Response(msg),
                    other => EmbeddingError::Request(other.to_string()),
                })?;

            if response.embeddings.len() != chunk.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: chunk.len(),
                    got: response.embeddings.len(),
                });
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        debug!("Embedded {} texts with {model}", texts.len());
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.http.config.embedding_model
    }

    fn dimension(&self) -> usize {
        self.http.config.embedding_dimension
    }
}
