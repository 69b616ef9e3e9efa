//! Error types for commit-buddy modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or writing the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write config file {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[source] serde_yaml::Error),

    #[error("Could not determine a configuration directory for this platform")]
    NoConfigDirectory,

    #[error("Config file already exists at {}. Use --force to overwrite.", .0.display())]
    AlreadyExists(PathBuf),
}

/// Errors from invoking the git command line.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("'{command}' was not found. Install git or set `git_command` in your config.")]
    NotInstalled { command: String },

    #[error("Failed to run {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {operation} failed: {stderr}")]
    CommandFailed { operation: String, stderr: String },

    #[error("{}", if *staged {
        "No staged changes found. Stage your changes with `git add` and try again, or pass --unstaged."
    } else {
        "No changes found in the working tree. Nothing to commit."
    })]
    NoChanges { staged: bool },
}

/// Errors from the completion backend (Ollama or the local `llama-server`).
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Could not reach model server at {url}: {source}. Is the server running? For Ollama, check `endpoint` in your config.")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Model server returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model returned an empty completion")]
    EmptyCompletion,

    #[error(
        "Model file not found at {}. Download a GGUF model and place it at this location, \
         or set `model_path` in your config (or pass --model).",
        path.display()
    )]
    ModelNotFound { path: PathBuf },

    #[error(
        "'{command}' was not found on PATH. Install llama.cpp, set `llama_command` in your config, \
         or configure an Ollama `endpoint` instead."
    )]
    NotInstalled { command: String },

    #[error("Failed to spawn {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model server timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model server exited ({}): {stderr}", exit_label(*code))]
    ServerExited { code: Option<i32>, stderr: String },

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<BackendError>),
}

impl BackendError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Connection failures, timeouts and server-side (5xx) errors are transient.
    /// Missing models, missing binaries, a dead local server and client
    /// errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Unreachable { .. } | BackendError::Timeout(_) => true,
            BackendError::HttpStatus { status, .. } => *status >= 500,
            BackendError::EmptyCompletion => true,
            _ => false,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "killed by a signal".to_string(),
    }
}

/// Errors from the commit workflow.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Interactive prompt failed: {0}")]
    PromptFailed(String),
}
