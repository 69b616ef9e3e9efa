//! Git operations through the `git` command line.
//!
//! All operations shell out to the configured git binary, inheriting the
//! user's existing git config, hooks and credential setup.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::GitError;

/// The git operations the commit workflow depends on.
///
/// This abstraction allows mocking the repository in tests.
#[cfg_attr(test, mockall::automock)]
pub trait GitOps {
    /// `git diff --staged`. Fails with [`GitError::NoChanges`] when empty.
    fn staged_diff(&self) -> Result<String, GitError>;

    /// `git diff` (working tree against the index). Fails with
    /// [`GitError::NoChanges`] when empty.
    fn unstaged_diff(&self) -> Result<String, GitError>;

    /// `git reset` - unstage everything, keep working tree changes.
    fn reset(&self) -> Result<(), GitError>;

    /// `git add -- <path>`.
    fn add(&self, path: &str) -> Result<(), GitError>;

    /// `git commit -m <message>`.
    fn commit(&self, message: &str) -> Result<(), GitError>;
}

/// [`GitOps`] backed by the git binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    command: String,
    workdir: Option<PathBuf>,
}

impl GitCli {
    /// Use `command` (usually `git`) in the current directory.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            workdir: None,
        }
    }

    /// Run every command inside `dir` instead of the current directory.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// `git --version`, used by `doctor` to check the binary is usable.
    pub fn version(&self) -> Result<String, GitError> {
        self.run(&["--version"], "version").map(|out| out.trim().to_string())
    }

    /// Whether the working directory is inside a git work tree.
    pub fn is_inside_work_tree(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"], "rev-parse")
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    /// Callers pass `core.quotePath=false` so non-ASCII paths stay readable;
    /// [`DiffSummary`](super::DiffSummary) still decodes the quoting git
    /// keeps for control characters and quotes.
    fn diff(&self, args: &[&str], staged: bool) -> Result<String, GitError> {
        let diff = self.run(args, "diff")?;
        if diff.trim().is_empty() {
            return Err(GitError::NoChanges { staged });
        }
        Ok(diff)
    }

    /// Run a git command and return its stdout, or a descriptive error.
    fn run(&self, args: &[&str], operation: &str) -> Result<String, GitError> {
        debug!("Running {} {}", self.command, args.join(" "));

        let mut cmd = Command::new(&self.command);
        cmd.args(args);
        if let Some(ref dir) = self.workdir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                GitError::NotInstalled {
                    command: self.command.clone(),
                }
            } else {
                GitError::SpawnFailed {
                    command: self.command.clone(),
                    source,
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // git commit reports "nothing to commit" on stdout
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(GitError::CommandFailed {
                operation: operation.to_string(),
                stderr: detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitOps for GitCli {
    fn staged_diff(&self) -> Result<String, GitError> {
        self.diff(&["-c", "core.quotePath=false", "diff", "--staged", "--no-color"], true)
    }

    fn unstaged_diff(&self) -> Result<String, GitError> {
        self.diff(&["-c", "core.quotePath=false", "diff", "--no-color"], false)
    }

    fn reset(&self) -> Result<(), GitError> {
        self.run(&["reset", "--quiet"], "reset").map(|_| ())
    }

    fn add(&self, path: &str) -> Result<(), GitError> {
        self.run(&["add", "--", path], "add").map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<(), GitError> {
        self.run(&["commit", "-m", message], "commit").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, GitCli) {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new("git").with_workdir(dir.path());
        git.run(&["init", "--quiet"], "init").unwrap();
        git.run(&["config", "user.name", "Test User"], "config").unwrap();
        git.run(&["config", "user.email", "test@test.com"], "config").unwrap();
        git.run(&["config", "commit.gpgsign", "false"], "config").unwrap();
        (dir, git)
    }

    #[test]
    fn test_version_succeeds() {
        let version = GitCli::new("git").version().unwrap();
        assert!(version.starts_with("git version"));
    }

    #[test]
    fn test_missing_binary_is_not_installed() {
        let result = GitCli::new("definitely-not-a-git-binary").version();
        assert!(matches!(result, Err(GitError::NotInstalled { .. })));
    }

    #[test]
    fn test_invalid_command_fails() {
        let result = GitCli::new("git").run(&["not-a-real-command"], "invalid");
        assert!(matches!(result, Err(GitError::CommandFailed { .. })));
    }

    #[test]
    fn test_staged_diff_empty_is_no_changes() {
        let (_dir, git) = init_repo();
        let result = git.staged_diff();
        assert!(matches!(result, Err(GitError::NoChanges { staged: true })));
    }

    #[test]
    fn test_add_then_staged_diff_and_commit() {
        let (dir, git) = init_repo();
        std::fs::write(dir.path().join("hello.txt"), "hello\n").unwrap();

        git.add("hello.txt").unwrap();
        let diff = git.staged_diff().unwrap();
        assert!(diff.contains("hello.txt"));
        assert!(diff.contains("+hello"));

        git.commit("feat: add hello").unwrap();
        let log = git.run(&["log", "-1", "--format=%s"], "log").unwrap();
        assert_eq!(log.trim(), "feat: add hello");
        assert!(matches!(git.staged_diff(), Err(GitError::NoChanges { .. })));
    }

    #[test]
    fn test_unstaged_diff_and_reset() {
        let (dir, git) = init_repo();
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        git.add("a.txt").unwrap();
        git.commit("chore: init").unwrap();

        std::fs::write(dir.path().join("a.txt"), "two\n").unwrap();
        assert!(git.unstaged_diff().unwrap().contains("+two"));

        git.add("a.txt").unwrap();
        assert!(matches!(git.unstaged_diff(), Err(GitError::NoChanges { staged: false })));

        git.reset().unwrap();
        assert!(matches!(git.staged_diff(), Err(GitError::NoChanges { staged: true })));
        assert!(git.unstaged_diff().is_ok());
    }

    #[test]
    fn test_non_ascii_path_is_not_escaped_in_diff() {
        let (dir, git) = init_repo();
        std::fs::write(dir.path().join("café.md"), "one\n").unwrap();
        git.add("café.md").unwrap();
        git.commit("docs: add cafe").unwrap();

        std::fs::write(dir.path().join("café.md"), "two\n").unwrap();
        let diff = git.unstaged_diff().unwrap();
        assert!(diff.contains("diff --git a/café.md b/café.md"));
        assert!(!diff.contains("\\303"));
    }

    #[test]
    fn test_is_inside_work_tree() {
        let (_dir, git) = init_repo();
        assert!(git.is_inside_work_tree());

        let outside = tempfile::tempdir().unwrap();
        assert!(!GitCli::new("git").with_workdir(outside.path()).is_inside_work_tree());
    }
}
