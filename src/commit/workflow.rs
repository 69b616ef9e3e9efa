//! End-to-end commit flow.
//!
//! Staged changes (the default) get one message for the whole diff, with an
//! Accept / Regenerate / Abort loop. With `--unstaged` or `--analyze-only`
//! the diff is analysed and split into logical units, and each unit is
//! committed on its own after confirmation.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::commit::analysis::analyze_diff;
use crate::commit::message::{GeneratedMessage, generate_commit_message};
use crate::commit::split::{LogicalChangeUnit, UnitFingerprint, split_changes_with_analysis};
use crate::config::Config;
use crate::error::{CommitError, GitError};
use crate::git::{DiffSummary, GitOps, describe_changes};
use crate::llm::CompletionBackend;
use crate::ui::{Choice, Prompter, Reporter};

/// Flags for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowOptions {
    /// Use the working tree diff instead of the staged one.
    pub include_unstaged: bool,
    /// Show units and messages, commit nothing.
    pub analyze_only: bool,
    /// Commit without asking.
    pub auto_commit: bool,
    pub verbose: bool,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Subjects of the commits made, in order.
    pub committed: Vec<String>,
    /// Units declined or already processed.
    pub skipped: usize,
    /// Units whose commit failed.
    pub failed: usize,
    /// The user aborted (explicitly or by interrupting a prompt).
    pub aborted: bool,
}

/// File sets already handled in this run.
#[derive(Debug, Default)]
pub struct ProcessedUnits(HashSet<UnitFingerprint>);

impl ProcessedUnits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `unit`. Returns false if its file set was already recorded.
    pub fn insert(&mut self, unit: &LogicalChangeUnit) -> bool {
        self.0.insert(unit.fingerprint())
    }
}

/// The commit orchestrator.
pub struct CommitWorkflow<'a> {
    git: &'a dyn GitOps,
    backend: &'a dyn CompletionBackend,
    config: &'a Config,
    reporter: &'a dyn Reporter,
    prompter: &'a dyn Prompter,
}

impl<'a> CommitWorkflow<'a> {
    pub fn new(
        git: &'a dyn GitOps,
        backend: &'a dyn CompletionBackend,
        config: &'a Config,
        reporter: &'a dyn Reporter,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            git,
            backend,
            config,
            reporter,
            prompter,
        }
    }

    /// Run the flow once.
    ///
    /// An empty diff, a git failure in the single-message flow and a failed
    /// model call during analysis or splitting are errors. Everything else,
    /// including aborting, ends in a [`RunSummary`].
    pub async fn run(&self, options: &WorkflowOptions) -> Result<RunSummary, CommitError> {
        let diff = if options.include_unstaged {
            self.git.unstaged_diff()?
        } else {
            self.git.staged_diff()?
        };

        let summary = DiffSummary::parse(&diff);
        debug!(
            "Diff: {} files, {} additions, {} deletions",
            summary.changed_files.len(),
            summary.additions,
            summary.deletions
        );
        self.reporter.files(&summary.changed_files);

        if !options.include_unstaged && !options.analyze_only {
            return self.single_message_flow(&summary, options).await;
        }

        self.reporter.step("Analyzing changes...");
        let analysis = analyze_diff(&diff, self.backend).await?;
        self.reporter.analysis(&analysis, options.verbose);

        self.reporter.step("Splitting changes into logical units...");
        let outcome = split_changes_with_analysis(&diff, &analysis, self.backend).await?;
        if let Some(ref reason) = outcome.fallback_reason {
            self.reporter.notice(&format!(
                "Could not parse logical units ({reason}); grouped files by extension instead"
            ));
        }

        if outcome.units.is_empty() {
            self.reporter
                .notice("No logical units identified. Generating a single commit message instead.");
            return self.single_message_flow(&summary, options).await;
        }

        self.reporter.units(&outcome.units);
        Ok(self.multi_unit_flow(&outcome.units, options).await)
    }

    async fn single_message_flow(
        &self,
        summary: &DiffSummary,
        options: &WorkflowOptions,
    ) -> Result<RunSummary, CommitError> {
        let description = describe_changes(summary);
        let mut result = RunSummary::default();

        loop {
            self.reporter.step("Generating commit message...");
            let message = generate_commit_message(&description, self.backend, self.config).await;
            self.reporter.message(&message);

            if options.analyze_only {
                return Ok(result);
            }

            let choice = if options.auto_commit {
                Choice::Accept
            } else {
                self.prompter.choose(&message).unwrap_or_else(|e| {
                    debug!("Prompt ended: {}", e);
                    Choice::Abort
                })
            };

            match choice {
                Choice::Accept => {
                    if options.include_unstaged {
                        self.stage_files(&summary.file_paths());
                    }
                    self.git.commit(&message.text)?;
                    self.reporter
                        .success(&format!("Successfully committed: {}", message.subject()));
                    result.committed.push(message.subject().to_string());
                    return Ok(result);
                }
                Choice::Regenerate => continue,
                Choice::Abort => {
                    self.reporter.notice("Aborted. No commit was made.");
                    result.aborted = true;
                    return Ok(result);
                }
            }
        }
    }

    async fn multi_unit_flow(
        &self,
        units: &[LogicalChangeUnit],
        options: &WorkflowOptions,
    ) -> RunSummary {
        let mut result = RunSummary::default();
        let mut processed = ProcessedUnits::new();
        let total = units.len();

        for (i, unit) in units.iter().enumerate() {
            if !processed.insert(unit) {
                self.reporter.notice(&format!(
                    "Skipping unit {}/{}: {} (already processed these files)",
                    i + 1,
                    total,
                    unit.name
                ));
                result.skipped += 1;
                continue;
            }

            self.reporter
                .step(&format!("Unit {}/{}: {}", i + 1, total, unit.name));
            let message =
                generate_commit_message(&unit.description(), self.backend, self.config).await;
            self.reporter.message(&message);

            if options.analyze_only {
                continue;
            }

            let accepted = if options.auto_commit {
                true
            } else {
                match self.prompter.confirm_unit(unit, &message) {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        debug!("Prompt ended: {}", e);
                        self.reporter.notice("Aborted. No further commits will be made.");
                        result.aborted = true;
                        break;
                    }
                }
            };

            if !accepted {
                self.reporter.notice(&format!("Skipped '{}'", unit.name));
                result.skipped += 1;
                continue;
            }

            match self.commit_unit(unit, &message) {
                Ok(()) => {
                    self.reporter
                        .success(&format!("Successfully committed: {}", message.subject()));
                    result.committed.push(message.subject().to_string());
                }
                Err(e) => {
                    self.reporter
                        .error(&format!("Failed to commit '{}': {}", unit.name, e));
                    result.failed += 1;
                }
            }
        }

        result
    }

    /// Reset the index, stage the unit's files and commit.
    fn commit_unit(
        &self,
        unit: &LogicalChangeUnit,
        message: &GeneratedMessage,
    ) -> Result<(), GitError> {
        self.git.reset()?;
        if self.stage_files(&unit.files) == 0 {
            return Err(GitError::CommandFailed {
                operation: "add".to_string(),
                stderr: "none of the unit's files could be staged".to_string(),
            });
        }
        self.git.commit(&message.text)
    }

    /// Stage each file, warning about the ones that fail. Returns how many
    /// were staged.
    fn stage_files(&self, files: &[String]) -> usize {
        let mut staged = 0;
        for file in files {
            match self.git.add(file) {
                Ok(()) => staged += 1,
                Err(e) => {
                    warn!("Failed to stage {}: {}", file, e);
                    self.reporter
                        .notice(&format!("Could not stage {file}, skipping it: {e}"));
                }
            }
        }
        staged
    }
}
