//! Completion backends and model output repair.
//!
//! Every model call in the pipeline goes through [`CompletionBackend`]: given a
//! prompt, return the completion text. Two implementations exist, an Ollama
//! HTTP client and a `llama-server` process started for the run, chosen from
//! the config.

pub mod json;
pub mod local;
pub mod ollama;
pub mod retry;

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{BackendKind, Config};
use crate::error::BackendError;

pub use json::{extract_json_from_text, repair_trailing_commas};
pub use local::LlamaCppBackend;
pub use ollama::OllamaClient;

/// Environment variable overriding `request_timeout_secs`.
pub const TIMEOUT_ENV_VAR: &str = "COMMIT_BUDDY_TIMEOUT";

/// Something that turns a prompt into a completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the raw text.
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;

    /// Short human-readable name, e.g. `ollama (llama3)`.
    fn describe(&self) -> String;
}

/// Decoding parameters passed through to the backend unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_length: u32,
    pub n_threads: u32,
    pub n_batch: u32,
    pub n_gpu_layers: i32,
}

impl GenerationParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            context_length: config.context_length,
            n_threads: config.n_threads,
            n_batch: config.n_batch,
            n_gpu_layers: config.n_gpu_layers,
        }
    }
}

/// Build the backend selected by the configuration.
///
/// The local backend starts its server and loads the model here, once per
/// run, so a missing binary or model fails before any diff is sent anywhere.
pub async fn build_backend(
    config: &Config,
    verbose: bool,
) -> Result<Box<dyn CompletionBackend>, BackendError> {
    match config.resolved_backend() {
        BackendKind::Ollama => Ok(Box::new(OllamaClient::from_config(config)?)),
        BackendKind::Local => Ok(Box::new(LlamaCppBackend::load(config, verbose).await?)),
    }
}

/// Per-request timeout.
///
/// Reads `COMMIT_BUDDY_TIMEOUT` (seconds) if set, otherwise uses
/// `configured_secs`. An invalid value is warned about and ignored.
pub fn request_timeout(configured_secs: u64) -> Duration {
    match env::var(TIMEOUT_ENV_VAR) {
        Ok(v) if !v.is_empty() => match v.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(
                    "Invalid {} value '{}', using {}s",
                    TIMEOUT_ENV_VAR, v, configured_secs
                );
                Duration::from_secs(configured_secs)
            }
        },
        _ => Duration::from_secs(configured_secs),
    }
}
