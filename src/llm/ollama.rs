//! Ollama HTTP backend.
//!
//! `POST /api/generate` with `stream: false` returns one JSON object whose
//! `response` field is the completion. `GET /api/tags` lists installed models.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::BackendError;

use super::retry::retry_with_backoff;
use super::{CompletionBackend, GenerationParams, request_timeout};

/// Used when the Ollama backend is selected without an endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
    num_thread: u32,
    num_batch: u32,
    num_gpu: i32,
}

impl From<&GenerationParams> for GenerateOptions {
    fn from(params: &GenerationParams) -> Self {
        Self {
            temperature: params.temperature,
            num_predict: params.max_tokens,
            num_ctx: params.context_length,
            num_thread: params.n_threads,
            num_batch: params.n_batch,
            num_gpu: params.n_gpu_layers,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Client for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    params: GenerationParams,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::InvalidResponse(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            base_url: normalize_endpoint(endpoint),
            model: model.into(),
            params,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);
        Self::new(
            endpoint,
            config.model.clone(),
            GenerationParams::from_config(config),
            request_timeout(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = res
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured model is installed. `llama3` matches `llama3:latest`.
    pub async fn has_model(&self) -> Result<bool, BackendError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|name| model_matches(name, &self.model)))
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions::from(&self.params),
        };

        debug!("POST {} ({} prompt chars)", url, prompt.len());
        let res = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = res
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(BackendError::EmptyCompletion);
        }
        Ok(parsed.response)
    }

    fn request_error(&self, url: &str, source: reqwest::Error) -> BackendError {
        if source.is_timeout() {
            BackendError::Timeout(self.timeout.as_secs())
        } else {
            BackendError::Unreachable {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        retry_with_backoff(
            || self.generate_once(prompt),
            BackendError::is_transient,
            |e| BackendError::RetriesExhausted(Box::new(e)),
        )
        .await
    }

    fn describe(&self) -> String {
        format!("ollama ({})", self.model)
    }
}

/// Add `http://` when no scheme is given and drop trailing slashes.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Whether an installed model name refers to `wanted`, ignoring a tag.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with(':'))
}
