//! Commit message generation, validation and repair.
//!
//! The model's answer is cleaned, checked against the conventional commit
//! pattern and, when it does not match, repaired. If repair fails too, or the
//! model call itself fails, a deterministic message is built from the changed
//! file names. Whatever comes out of [`generate_commit_message`] is a valid
//! conventional commit.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::{debug, warn};

use crate::commit::prompt::build_message_prompt;
use crate::config::Config;
use crate::llm::CompletionBackend;

/// Types recognised by validation and repair, in matching order.
pub const COMMIT_TYPES: [&str; 11] = [
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// Message used when nothing is known about the change.
pub const GENERIC_FALLBACK: &str = "chore: update repository files";

static CONVENTIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(feat|fix|docs|style|refactor|perf|test|build|ci|chore|revert)(\([a-z0-9_-]+\))?:\s+.+")
        .expect("conventional commit regex is valid")
});

static SEPARATOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{3,}").expect("separator regex is valid"));

static DASH_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{3,}").expect("dash run regex is valid"));

static NOW_GENERATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Now,\s+generate.*?changes\s+above\.").expect("instruction regex is valid")
});

static LEADING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Commit message:|\s*message:\s*)").expect("label regex is valid")
});

static TRAILING_EXAMPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Example(\s+format)?:.*$").expect("example regex is valid")
});

/// Where a generated message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// The model's answer was valid after cleaning.
    Model,
    /// The model's answer needed format repair.
    Repaired,
    /// Built from file names without the model.
    Fallback,
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSource::Model => write!(f, "model"),
            MessageSource::Repaired => write!(f, "repaired"),
            MessageSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMessage {
    pub text: String,
    pub source: MessageSource,
}

impl GeneratedMessage {
    fn fallback(files: &[String]) -> Self {
        Self {
            text: generate_fallback_message(files),
            source: MessageSource::Fallback,
        }
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.text.lines().next().unwrap_or_default()
    }
}

/// Generate a commit message for `change_description`.
///
/// Never fails: a backend error is logged and turned into the fallback.
pub async fn generate_commit_message(
    change_description: &str,
    backend: &dyn CompletionBackend,
    config: &Config,
) -> GeneratedMessage {
    let files = extract_changed_files(change_description);

    let prompt = build_message_prompt(
        change_description,
        &config.commit_types,
        &config.commit_scopes,
    );
    debug!("Message prompt length: {} chars", prompt.len());

    let raw = match backend.complete(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Error generating commit message: {}", e);
            return GeneratedMessage::fallback(&files);
        }
    };
    debug!("Raw message response: {}", raw);

    let message = clean_commit_message(&raw);
    if message.is_empty() {
        return GeneratedMessage::fallback(&files);
    }

    if is_conventional_commit_format(&message) {
        return GeneratedMessage {
            text: message,
            source: MessageSource::Model,
        };
    }

    let fixed = fix_commit_format(&message, &files);
    if is_conventional_commit_format(&fixed) {
        debug!("Repaired commit message format");
        return GeneratedMessage {
            text: fixed,
            source: MessageSource::Repaired,
        };
    }

    warn!("Could not repair commit message, using fallback: {:?}", message);
    GeneratedMessage::fallback(&files)
}

/// `type[(scope)]: description` with a known type, case-insensitive.
pub fn is_conventional_commit_format(message: &str) -> bool {
    CONVENTIONAL.is_match(message)
}

/// Files named on the first `Files changed:` or `Files:` line.
pub fn extract_changed_files(change_description: &str) -> Vec<String> {
    for line in change_description.lines() {
        let rest = ["Files changed:", "Files:"]
            .iter()
            .find_map(|marker| line.find(marker).map(|idx| &line[idx + marker.len()..]));

        if let Some(rest) = rest {
            return rest
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

/// Strip formatting and prompt leakage from a model answer.
///
/// Removes code fences and backticks, separator and `IMPORTANT:` lines, an
/// `Example ... format` block up to the next blank line, copied
/// `Now, generate ... changes above.` instructions, a leading
/// `Commit message:` label and everything from a trailing `Example:`.
/// May return an empty string.
pub fn clean_commit_message(raw: &str) -> String {
    let text = raw.replace("```", "").replace('`', "");

    let mut kept: Vec<&str> = Vec::new();
    let mut in_example = false;
    for line in text.lines() {
        if SEPARATOR_LINE.is_match(line.trim()) || line.contains("IMPORTANT:") {
            continue;
        }
        if line.contains("Example") && (line.contains("format") || line.contains("not related")) {
            in_example = true;
            continue;
        }
        if in_example {
            if line.trim().is_empty() {
                in_example = false;
            }
            continue;
        }
        kept.push(line);
    }

    let text = kept.join("\n");
    let text = NOW_GENERATE.replace_all(&text, "");
    let text = LEADING_LABEL.replace(text.trim_start(), "");
    let text = TRAILING_EXAMPLE.replace(text.trim(), "");
    text.trim().to_string()
}

/// Try to coerce `message` into conventional commit format.
///
/// The result is not guaranteed to be valid; callers re-check it.
pub fn fix_commit_format(message: &str, files: &[String]) -> String {
    let message = DASH_RUN.replace_all(message, "");
    let message = message.trim();
    let lower = message.to_lowercase();

    if let Some(commit_type) = leading_type(&lower) {
        let after = message[commit_type.len()..].trim_start();

        if after.starts_with(':') {
            return message.to_string();
        }
        if after.starts_with('(') {
            if let Some(close) = after.find(')') {
                let scope = &after[..=close];
                let rest = after[close + 1..].trim_start_matches(':').trim();
                return format!("{commit_type}{scope}: {rest}");
            }
        }
        return format!("{commit_type}: {after}");
    }

    if let Some((before, after)) = message.split_once(':') {
        let before = before.to_lowercase();
        if let Some(commit_type) = COMMIT_TYPES.iter().find(|t| before.contains(*t)) {
            return format!("{commit_type}: {}", after.trim());
        }
        if !after.trim().is_empty() {
            return format!("chore: {}", after.trim());
        }
    }

    format!("{}: {}", get_file_type_prefix(files), message)
}

/// A commit type `lower` starts with as a whole word.
fn leading_type(lower: &str) -> Option<&'static str> {
    COMMIT_TYPES.iter().copied().find(|t| {
        lower.strip_prefix(t).is_some_and(|rest| {
            rest.is_empty() || rest.starts_with(|c: char| c == '(' || c == ':' || c.is_whitespace())
        })
    })
}

/// Commit type suggested by the most common extension among `files`.
///
/// Ties go to the extension seen first. Files without an extension do not
/// count.
pub fn get_file_type_prefix(files: &[String]) -> &'static str {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for key in files.iter().filter_map(|f| type_key(f)) {
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key, 1)),
        }
    }

    let mut best: Option<&(String, usize)> = None;
    for entry in &counts {
        if best.is_none_or(|b| entry.1 > b.1) {
            best = Some(entry);
        }
    }

    match best.map(|(k, _)| k.as_str()) {
        Some(".py" | ".js" | ".ts") => "feat",
        Some(".md" | ".txt") => "docs",
        Some(".css" | ".scss") => "style",
        Some(k) if k.starts_with(".test.") || k.starts_with(".spec.") => "test",
        _ => "chore",
    }
}

/// Lowercased extension key: `.test.js` / `.spec.ts` style compound
/// extensions are kept whole, otherwise the last extension.
fn type_key(path: &str) -> Option<String> {
    let name = basename(path).to_lowercase();
    for marker in [".test.", ".spec."] {
        if let Some(idx) = name.find(marker).filter(|&i| i > 0) {
            return Some(name[idx..].to_string());
        }
    }
    extension(&name).map(str::to_string)
}

/// Deterministic message built only from file names.
pub fn generate_fallback_message(files: &[String]) -> String {
    if files.is_empty() {
        return GENERIC_FALLBACK.to_string();
    }

    let prefix = get_file_type_prefix(files);

    if files.len() <= 3 {
        let names: Vec<&str> = files.iter().map(|f| basename(f)).collect();
        return format!("{prefix}: update {}", names.join(", "));
    }

    let mut extensions: Vec<&str> = Vec::new();
    for file in files {
        let ext = extension(basename(file)).unwrap_or("(no extension)");
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }

    match extensions.as_slice() {
        [only] => {
            let ext = only.strip_prefix('.').unwrap_or(only);
            format!("{prefix}: update {} {ext} files", files.len())
        }
        _ => format!("{prefix}: update files across multiple components"),
    }
}

fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Extension with its dot; `None` for dotfiles and extensionless names.
fn extension(name: &str) -> Option<&str> {
    name.rfind('.').filter(|&idx| idx > 0).map(|idx| &name[idx..])
}
