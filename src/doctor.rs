//! `commit-buddy doctor`: environment diagnostics.

use std::fmt;

use crate::config::{BackendKind, ConfigSource, LoadedConfig};
use crate::git::GitCli;
use crate::llm::OllamaClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "[PASS]"),
            CheckStatus::Warn => write!(f, "[WARN]"),
            CheckStatus::Fail => write!(f, "[FAIL]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            detail: detail.into(),
        }
    }

    fn warn(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status, self.name, self.detail)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    /// True when no check failed. Warnings do not count.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }
}

/// Run every check. Never fails; problems are reported as checks.
pub async fn run_doctor(loaded: &LoadedConfig, git: &GitCli) -> DoctorReport {
    let mut checks = vec![check_config(loaded), check_git(git), check_repository(git)];

    match loaded.config.resolved_backend() {
        BackendKind::Ollama => checks.extend(check_ollama(loaded).await),
        BackendKind::Local => checks.extend(check_local(loaded)),
    }

    DoctorReport { checks }
}

fn check_config(loaded: &LoadedConfig) -> Check {
    match loaded.source {
        ConfigSource::File(ref path) => Check::pass("config", format!("loaded {}", path.display())),
        ConfigSource::Defaults => Check::warn(
            "config",
            "no config file found, using defaults (run `commit-buddy init` to create one)",
        ),
    }
}

fn check_git(git: &GitCli) -> Check {
    match git.version() {
        Ok(version) => Check::pass("git", format!("{version} (`{}`)", git.command())),
        Err(e) => Check::fail("git", e.to_string()),
    }
}

fn check_repository(git: &GitCli) -> Check {
    let location = git
        .workdir()
        .map_or_else(|| "current directory".to_string(), |dir| dir.display().to_string());
    if git.is_inside_work_tree() {
        Check::pass("repository", format!("{location} is inside a git work tree"))
    } else {
        Check::fail("repository", format!("{location} is not inside a git repository"))
    }
}

async fn check_ollama(loaded: &LoadedConfig) -> Vec<Check> {
    let client = match OllamaClient::from_config(&loaded.config) {
        Ok(client) => client,
        Err(e) => return vec![Check::fail("backend", e.to_string())],
    };

    let installed = match client.has_model().await {
        Ok(installed) => installed,
        Err(e) => {
            return vec![
                Check::fail("backend", e.to_string()),
                Check::warn("model", "skipped, server unreachable"),
            ];
        }
    };

    let backend = Check::pass("backend", format!("ollama at {}", client.base_url()));
    let model = if installed {
        Check::pass("model", client.model().to_string())
    } else {
        Check::fail(
            "model",
            format!(
                "'{}' is not installed on the server (run `ollama pull {}`)",
                client.model(),
                client.model()
            ),
        )
    };

    vec![backend, model]
}

fn check_local(loaded: &LoadedConfig) -> Vec<Check> {
    let config = &loaded.config;

    let backend = match which::which(&config.llama_command) {
        Ok(path) => Check::pass("backend", format!("llama-server at {}", path.display())),
        Err(_) => Check::fail(
            "backend",
            format!("'{}' not found on PATH", config.llama_command),
        ),
    };

    let model_path = config.expanded_model_path();
    let model = match std::fs::metadata(&model_path) {
        Ok(meta) if meta.is_file() => Check::pass(
            "model",
            format!("{} ({:.2} MB)", model_path.display(), megabytes(meta.len())),
        ),
        _ => Check::fail("model", format!("not found at {}", model_path.display())),
    };

    vec![backend, model]
}

pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
