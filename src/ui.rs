//! Terminal output and interactive prompts.
//!
//! The workflow never prints directly. It reports through a [`Reporter`] and
//! asks questions through a [`Prompter`], so it can run headless in tests.

use colored::Colorize;
use dialoguer::{Confirm, Select};

use crate::commit::message::GeneratedMessage;
use crate::commit::split::LogicalChangeUnit;
use crate::error::CommitError;
use crate::git::ChangedFile;

/// Lines of analysis shown when not verbose.
pub const ANALYSIS_PREVIEW_LINES: usize = 5;

/// Unit explanations are cut to this many characters in the unit list.
pub const MAX_EXPLANATION_CHARS: usize = 100;

/// Where progress and results go.
pub trait Reporter {
    /// A progress step, e.g. "Analyzing changes...".
    fn step(&self, message: &str);

    /// Something recovered from or skipped.
    fn notice(&self, message: &str);

    fn success(&self, message: &str);

    fn error(&self, message: &str);

    fn files(&self, files: &[ChangedFile]);

    fn analysis(&self, analysis: &str, verbose: bool);

    fn units(&self, units: &[LogicalChangeUnit]);

    fn message(&self, message: &GeneratedMessage);
}

/// Answer to the single-message prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Accept,
    Regenerate,
    Abort,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Accept, Choice::Regenerate, Choice::Abort];

    pub fn label(self) -> &'static str {
        match self {
            Choice::Accept => "Accept and commit",
            Choice::Regenerate => "Regenerate",
            Choice::Abort => "Abort",
        }
    }
}

/// Interactive questions asked by the workflow.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Accept, regenerate or abort a single commit message.
    fn choose(&self, message: &GeneratedMessage) -> Result<Choice, CommitError>;

    /// Whether to commit one logical unit with `message`.
    fn confirm_unit(
        &self,
        unit: &LogicalChangeUnit,
        message: &GeneratedMessage,
    ) -> Result<bool, CommitError>;
}

/// [`Reporter`] writing coloured text to stdout, problems to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn step(&self, message: &str) {
        println!("{}", message.bold().blue());
    }

    fn notice(&self, message: &str) {
        eprintln!("{}", format!("⚠ {message}").yellow());
    }

    fn success(&self, message: &str) {
        println!("{}", format!("✓ {message}").green());
    }

    fn error(&self, message: &str) {
        eprintln!("{}", format!("✗ {message}").red());
    }

    fn files(&self, files: &[ChangedFile]) {
        println!();
        println!("{}", "Files Changed".bold());
        for line in render_files(files) {
            println!("  {line}");
        }
        println!();
    }

    fn analysis(&self, analysis: &str, verbose: bool) {
        let title = if verbose { "Diff Analysis" } else { "Analysis Summary" };
        println!();
        println!("{}", title.bold().blue());
        println!("{}", render_analysis(analysis, verbose));
        println!();
    }

    fn units(&self, units: &[LogicalChangeUnit]) {
        println!("{}", "Logical Change Units".bold());
        for line in render_units(units) {
            println!("{line}");
        }
        println!();
    }

    fn message(&self, message: &GeneratedMessage) {
        let mut lines = message.text.lines();
        let subject = lines.next().unwrap_or_default();
        println!();
        println!("{} {}", "Commit message:".bold(), subject.green().bold());
        for line in lines {
            println!("  {line}");
        }
        println!("{}", format!("({})", message.source).dimmed());
        println!();
    }
}

/// [`Prompter`] backed by `dialoguer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn choose(&self, _message: &GeneratedMessage) -> Result<Choice, CommitError> {
        let labels: Vec<&str> = Choice::ALL.iter().map(|c| c.label()).collect();
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| CommitError::PromptFailed(e.to_string()))?;
        Ok(Choice::ALL[idx])
    }

    fn confirm_unit(
        &self,
        unit: &LogicalChangeUnit,
        _message: &GeneratedMessage,
    ) -> Result<bool, CommitError> {
        Confirm::new()
            .with_prompt(format!("Commit '{}'?", unit.name))
            .default(true)
            .interact()
            .map_err(|e| CommitError::PromptFailed(e.to_string()))
    }
}

/// `path  (extension, status)` rows for the changed-files table.
pub fn render_files(files: &[ChangedFile]) -> Vec<String> {
    let width = files.iter().map(|f| f.path.len()).max().unwrap_or(0);
    files
        .iter()
        .map(|f| {
            format!(
                "{:<width$}  {:<14}  {}",
                f.path,
                f.extension().unwrap_or("(no extension)"),
                f.status
            )
        })
        .collect()
}

/// The full analysis when verbose, else its first lines and `...`.
pub fn render_analysis(analysis: &str, verbose: bool) -> String {
    if verbose {
        return analysis.to_string();
    }
    let lines: Vec<&str> = analysis.lines().collect();
    let mut preview = lines
        .iter()
        .take(ANALYSIS_PREVIEW_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if lines.len() > ANALYSIS_PREVIEW_LINES {
        preview.push_str("\n...");
    }
    preview
}

/// Numbered unit list with files, shortened explanation and split marker.
pub fn render_units(units: &[LogicalChangeUnit]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, unit) in units.iter().enumerate() {
        let marker = if unit.should_split { "✓" } else { "✗" };
        lines.push(format!("{:>3}. {} [split: {}]", i + 1, unit.name, marker));
        lines.push(format!("     files: {}", unit.files.join(", ")));
        if !unit.explanation.is_empty() {
            lines.push(format!("     {}", shorten(&unit.explanation, MAX_EXPLANATION_CHARS)));
        }
    }
    lines
}

fn shorten(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}...")
}
