//! Layered YAML configuration.
//!
//! The first file found in the search order wins. Its keys overwrite the
//! defaults one by one (no deep merge); keys it does not mention keep their
//! defaults and keys we do not know are ignored.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// File name looked up in the current directory and in `$HOME`.
pub const DOTFILE_NAME: &str = ".commitbuddy.yaml";

/// Directory (under the platform config dir) holding `config.yaml`.
pub const CONFIG_DIR_NAME: &str = "commitbuddy";

/// Conventional commit types offered to the model by default.
pub const DEFAULT_COMMIT_TYPES: [&str; 11] = [
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// Which completion backend serves the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// HTTP endpoint speaking the Ollama `/api/generate` protocol.
    Ollama,
    /// A `llama-server` subprocess started once per run with a local model file.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

/// Effective configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit backend choice; inferred from `endpoint` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    /// Model name sent to the HTTP backend.
    pub model: String,
    /// Model file used by the local backend.
    pub model_path: String,
    /// Host (and optional scheme/port) of the HTTP backend.
    #[serde(alias = "ollamaIp", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub context_length: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub n_gpu_layers: i32,
    pub n_batch: u32,
    pub n_threads: u32,
    /// llama.cpp server binary the local backend starts.
    pub llama_command: String,
    pub request_timeout_secs: u64,
    pub git_command: String,
    pub auto_commit: bool,
    pub chain_verbose: bool,
    pub commit_types: Vec<String>,
    pub commit_scopes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: None,
            model: "llama3".to_string(),
            model_path: "~/.commitbuddy/models/ggml-model.bin".to_string(),
            endpoint: None,
            context_length: 4096,
            temperature: 0.2,
            max_tokens: 1024,
            n_gpu_layers: 1,
            n_batch: 512,
            n_threads: 4,
            llama_command: "llama-server".to_string(),
            request_timeout_secs: 300,
            git_command: "git".to_string(),
            auto_commit: false,
            chain_verbose: false,
            commit_types: DEFAULT_COMMIT_TYPES.iter().map(|t| t.to_string()).collect(),
            commit_scopes: Vec::new(),
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// A loaded configuration together with its origin.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
}

/// Command-line overrides applied right after loading.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub auto_commit: bool,
    pub verbose: bool,
    pub gpu_layers: Option<i32>,
}

impl Config {
    /// Load the configuration.
    ///
    /// With an explicit path, that file must exist. Otherwise the search
    /// order from [`Config::search_paths`] is walked and the first existing
    /// file wins; if none exists the defaults are returned.
    pub fn load(explicit_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        if let Some(path) = explicit_path {
            let path = expand_path(path);
            if !path.is_file() {
                return Err(ConfigError::NotFound(path));
            }
            return Self::from_file(&path).map(|config| LoadedConfig {
                config,
                source: ConfigSource::File(path),
            });
        }

        for candidate in Self::search_paths() {
            if candidate.is_file() {
                debug!("Loading config from {}", candidate.display());
                let config = Self::from_file(&candidate)?;
                return Ok(LoadedConfig {
                    config,
                    source: ConfigSource::File(candidate),
                });
            }
        }

        debug!("No config file found, using defaults");
        Ok(LoadedConfig {
            config: Config::default(),
            source: ConfigSource::Defaults,
        })
    }

    /// Candidate config files, highest priority first:
    /// `./.commitbuddy.yaml`, `~/.commitbuddy.yaml`, `<config dir>/commitbuddy/config.yaml`.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DOTFILE_NAME)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(DOTFILE_NAME));
        }
        if let Some(path) = default_config_path() {
            paths.push(path);
        }
        paths
    }

    /// Parse a single YAML file over the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML text over the defaults. An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content)
    }

    /// Apply command-line overrides.
    ///
    /// `--model` replaces whichever model setting the active backend reads.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref model) = overrides.model {
            match self.resolved_backend() {
                BackendKind::Ollama => self.model = model.clone(),
                BackendKind::Local => self.model_path = model.clone(),
            }
        }
        if overrides.auto_commit {
            self.auto_commit = true;
        }
        if overrides.verbose {
            self.chain_verbose = true;
        }
        if let Some(layers) = overrides.gpu_layers {
            self.n_gpu_layers = layers;
        }
    }

    /// The backend to use: the explicit `backend` key, else Ollama when an
    /// endpoint is configured, else the local model.
    pub fn resolved_backend(&self) -> BackendKind {
        match self.backend {
            Some(kind) => kind,
            None if self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty()) => {
                BackendKind::Ollama
            }
            None => BackendKind::Local,
        }
    }

    /// `model_path` with `~` and environment variables expanded.
    pub fn expanded_model_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::full(&self.model_path).map_or_else(
            |_| shellexpand::tilde(&self.model_path).into_owned(),
            |expanded| expanded.into_owned(),
        ))
    }

    /// Render as YAML (used by `--show-config` and `init`).
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::SerializeFailed)
    }
}

/// `<config dir>/commitbuddy/config.yaml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.yaml"))
}

/// Write the default configuration to `path`, creating parent directories.
///
/// The file is written to a temporary sibling and renamed into place so a
/// crash never leaves a half-written config behind.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }

    let write_err = |source| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let yaml = Config::default().to_yaml()?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(yaml.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}
