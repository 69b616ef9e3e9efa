//! Local model backend on top of llama.cpp's `llama-server`.
//!
//! [`LlamaCppBackend::load`] starts the server once with the model file and
//! waits for `/health` to report ready. Every completion after that is a
//! `POST /completion` to the same process, so the model stays loaded for the
//! whole run. The server is killed when the backend is dropped.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::BackendError;

use super::retry::retry_with_backoff;
use super::{CompletionBackend, GenerationParams, request_timeout};

/// Pause between readiness checks while the model loads.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A single `/health` request never waits longer than this.
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Server stderr lines kept for error messages.
const LOG_TAIL_LINES: usize = 20;

/// How long to wait for the last stderr lines of a server that died.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// The last lines the server wrote to stderr.
#[derive(Debug, Clone, Default)]
struct ServerLog(Arc<Mutex<VecDeque<String>>>);

impl ServerLog {
    fn push(&self, line: String) {
        let mut lines = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == LOG_TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    fn text(&self) -> String {
        let lines = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// A running `llama-server` child.
#[derive(Debug)]
struct ServerProcess {
    command: String,
    child: Child,
    log: ServerLog,
    reader: Option<JoinHandle<()>>,
}

impl ServerProcess {
    fn spawn(command: &Path, args: &[String], verbose: bool) -> Result<Self, BackendError> {
        let command_name = command.display().to_string();
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::SpawnFailed {
                command: command_name.clone(),
                source,
            })?;

        let log = ServerLog::default();
        let reader = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(follow_log(stderr, log.clone(), verbose)));

        Ok(Self {
            command: command_name,
            child,
            log,
            reader,
        })
    }

    fn exit_status(&mut self) -> Result<Option<ExitStatus>, BackendError> {
        self.child
            .try_wait()
            .map_err(|source| BackendError::SpawnFailed {
                command: self.command.clone(),
                source,
            })
    }

    fn exited(&self, status: ExitStatus) -> BackendError {
        BackendError::ServerExited {
            code: status.code(),
            stderr: self.log.text(),
        }
    }

    /// Fails with [`BackendError::ServerExited`] once the process is gone.
    fn ensure_running(&mut self) -> Result<(), BackendError> {
        match self.exit_status()? {
            Some(status) => Err(self.exited(status)),
            None => Ok(()),
        }
    }

    /// Poll `/health` until the model is loaded, the process exits or
    /// `limit` passes.
    async fn wait_until_ready(
        &mut self,
        client: &ServerClient,
        limit: Duration,
    ) -> Result<(), BackendError> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = self.exit_status()? {
                if let Some(reader) = self.reader.take() {
                    let _ = timeout(LOG_DRAIN_TIMEOUT, reader).await;
                }
                return Err(self.exited(status));
            }
            if client.is_healthy().await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BackendError::Timeout(limit.as_secs()));
            }
            sleep(HEALTH_POLL_INTERVAL).await;
        }
    }
}

/// Copy server stderr into `log`, echoing it when verbose.
async fn follow_log(stderr: ChildStderr, log: ServerLog, echo: bool) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if echo {
            eprintln!("{line}");
        }
        log.push(line);
    }
}

/// HTTP side of the server.
#[derive(Debug, Clone)]
struct ServerClient {
    http: reqwest::Client,
    base_url: String,
    params: GenerationParams,
    timeout: Duration,
}

impl ServerClient {
    fn new(
        base_url: String,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::InvalidResponse(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            http,
            base_url,
            params,
            timeout,
        })
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(HEALTH_REQUEST_TIMEOUT).send().await {
            Ok(res) => res.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/completion", self.base_url);
        let request = CompletionRequest {
            prompt,
            n_predict: self.params.max_tokens,
            temperature: self.params.temperature,
            stream: false,
        };

        debug!("POST {} ({} prompt chars)", url, prompt.len());
        let res = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    BackendError::Timeout(self.timeout.as_secs())
                } else {
                    BackendError::Unreachable {
                        url: url.clone(),
                        source,
                    }
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = res
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let text = parsed.content.trim().to_string();
        debug!("Local completion: {} chars", text.len());
        if text.is_empty() {
            return Err(BackendError::EmptyCompletion);
        }
        Ok(text)
    }
}

/// The local model, loaded once into a `llama-server` child process.
#[derive(Debug)]
pub struct LlamaCppBackend {
    model_path: PathBuf,
    client: ServerClient,
    server: Mutex<ServerProcess>,
}

impl LlamaCppBackend {
    /// Resolve `llama_command` on `PATH`, check the model file, start the
    /// server and wait until the model is loaded.
    pub async fn load(config: &Config, verbose: bool) -> Result<Self, BackendError> {
        let command = which::which(&config.llama_command).map_err(|_| BackendError::NotInstalled {
            command: config.llama_command.clone(),
        })?;

        let model_path = config.expanded_model_path();
        debug!("Looking for model at {}", model_path.display());
        if !model_path.is_file() {
            return Err(BackendError::ModelNotFound { path: model_path });
        }

        let params = GenerationParams::from_config(config);
        let limit = request_timeout(config.request_timeout_secs);
        let port = free_port().map_err(|source| BackendError::SpawnFailed {
            command: command.display().to_string(),
            source,
        })?;

        info!(
            "Starting {} with {} on port {}",
            command.display(),
            model_path.display(),
            port
        );
        let args = server_args(&model_path, &params, port);
        let mut server = ServerProcess::spawn(&command, &args, verbose)?;
        let client = ServerClient::new(format!("http://127.0.0.1:{port}"), params, limit)?;
        server.wait_until_ready(&client, limit).await?;
        info!("Model loaded");

        Ok(Self {
            model_path,
            client,
            server: Mutex::new(server),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, BackendError> {
        self.server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ensure_running()?;
        self.client.complete(prompt).await
    }
}

#[async_trait]
impl CompletionBackend for LlamaCppBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        retry_with_backoff(
            || self.complete_once(prompt),
            BackendError::is_transient,
            |e| BackendError::RetriesExhausted(Box::new(e)),
        )
        .await
    }

    fn describe(&self) -> String {
        format!("llama.cpp ({})", self.model_path().display())
    }
}

/// Server flags for loading `model_path` with the configured parameters.
fn server_args(model_path: &Path, params: &GenerationParams, port: u16) -> Vec<String> {
    vec![
        "-m".to_string(),
        model_path.display().to_string(),
        "--host".to_string(),
        "127.0.0.1".to_string(),
        "--port".to_string(),
        port.to_string(),
        "-c".to_string(),
        params.context_length.to_string(),
        "-t".to_string(),
        params.n_threads.to_string(),
        "-b".to_string(),
        params.n_batch.to_string(),
        "-ngl".to_string(),
        params.n_gpu_layers.to_string(),
    ]
}

/// Ask the OS for an unused loopback port.
fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}
