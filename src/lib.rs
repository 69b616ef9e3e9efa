//! commit-buddy - A CLI tool that writes conventional commit messages from your diff.
//!
//! # Overview
//!
//! commit-buddy reads the staged (or working tree) diff, asks a language model
//! served by Ollama or run locally through llama.cpp to describe it, and turns
//! the answer into a conventional commit message. Unstaged changes can be split
//! into logical units and committed one by one.

pub mod commit;
pub mod config;
pub mod doctor;
pub mod error;
pub mod git;
pub mod llm;
pub mod ui;

// Re-export commonly used types
pub use commit::{CommitWorkflow, GeneratedMessage, LogicalChangeUnit, RunSummary, WorkflowOptions};
pub use config::{Config, ConfigOverrides, ConfigSource, LoadedConfig};
pub use error::{BackendError, CommitError, ConfigError, GitError};
pub use git::{GitCli, GitOps};
pub use llm::{CompletionBackend, build_backend};
